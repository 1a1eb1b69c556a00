// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Button line backed by an `embedded-hal` input pin.

use embedded_hal::digital::InputPin;

use crate::error::HardwareError;
use crate::types::InputLevel;

/// A push button on a GPIO input.
///
/// The pin must already be configured as an input with pull-up; this type
/// only reads it.
///
/// Read errors never propagate as failures of the controller. Use
/// [`Button::sample`] to get the last known level when a read fails.
#[derive(Debug)]
pub struct Button<P> {
    pin: P,
    last_level: InputLevel,
    failing: bool,
}

impl<P> Button<P>
where
    P: InputPin,
{
    /// Wraps an input pin. The line is assumed idle (high) until first read.
    #[must_use]
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            last_level: InputLevel::High,
            failing: false,
        }
    }

    /// Reads the current raw level.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Read`] if the pin cannot be read.
    pub fn read_level(&mut self) -> Result<InputLevel, HardwareError> {
        self.pin
            .is_high()
            .map(InputLevel::from)
            .map_err(|e| HardwareError::Read(format!("{e:?}")))
    }

    /// Reads the line, falling back to the last known level on error.
    ///
    /// A failed read behaves like "no level change". Only the first failure
    /// and the recovery are logged, so a dead line does not flood the log.
    pub fn sample(&mut self) -> InputLevel {
        match self.read_level() {
            Ok(level) => {
                if self.failing {
                    tracing::info!(level = %level, "Button line readable again");
                    self.failing = false;
                }
                self.last_level = level;
            }
            Err(e) => {
                if !self.failing {
                    tracing::warn!(
                        error = %e,
                        level = %self.last_level,
                        "Button read failed, holding last known level"
                    );
                    self.failing = true;
                }
            }
        }
        self.last_level
    }

    /// Returns the last level successfully read.
    #[must_use]
    pub fn last_level(&self) -> InputLevel {
        self.last_level
    }

    /// Returns `true` while reads are failing.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.failing
    }

    /// Releases the underlying pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::convert::Infallible;

    use embedded_hal::digital::{ErrorKind, ErrorType};

    use super::*;

    #[derive(Debug)]
    struct PinFault;

    impl embedded_hal::digital::Error for PinFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Replays scripted reads; `None` is a read error.
    struct ScriptedPin(VecDeque<Option<bool>>);

    impl ErrorType for ScriptedPin {
        type Error = PinFault;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.0.pop_front().flatten().ok_or(PinFault)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    struct IdlePin;

    impl ErrorType for IdlePin {
        type Error = Infallible;
    }

    impl InputPin for IdlePin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }
    }

    #[test]
    fn reads_level() {
        let mut button = Button::new(IdlePin);
        assert_eq!(button.read_level(), Ok(InputLevel::High));
    }

    #[test]
    fn read_error_holds_last_level() {
        let pin = ScriptedPin(VecDeque::from([Some(false), None, None, Some(true)]));
        let mut button = Button::new(pin);

        assert_eq!(button.sample(), InputLevel::Low);
        assert_eq!(button.sample(), InputLevel::Low);
        assert!(button.is_degraded());
        assert_eq!(button.sample(), InputLevel::Low);
        assert_eq!(button.sample(), InputLevel::High);
        assert!(!button.is_degraded());
    }

    #[test]
    fn read_error_is_reported_by_read_level() {
        let mut button = Button::new(ScriptedPin(VecDeque::new()));
        assert!(matches!(button.read_level(), Err(HardwareError::Read(_))));
        assert_eq!(button.last_level(), InputLevel::High);
    }
}
