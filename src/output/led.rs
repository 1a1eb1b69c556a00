// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LED on an `embedded-hal` output pin.

use embedded_hal::digital::{OutputPin, PinState};

use crate::error::HardwareError;
use crate::types::ActuatorState;

use super::ActuatorSink;

/// Which line level lights the LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedPolarity {
    /// Driving the line high lights the LED.
    #[default]
    ActiveHigh,
    /// Driving the line low lights the LED (LED wired to VCC).
    ActiveLow,
}

impl LedPolarity {
    /// Returns the pin level that represents `state`.
    #[must_use]
    pub const fn level_for(self, state: ActuatorState) -> PinState {
        match (self, state) {
            (Self::ActiveHigh, ActuatorState::On) | (Self::ActiveLow, ActuatorState::Off) => {
                PinState::High
            }
            (Self::ActiveHigh, ActuatorState::Off) | (Self::ActiveLow, ActuatorState::On) => {
                PinState::Low
            }
        }
    }
}

/// An LED driven by a GPIO output.
///
/// Every [`apply`](ActuatorSink::apply) writes the line, even when the state
/// is unchanged, so a glitched output is corrected by the next command.
#[derive(Debug)]
pub struct Led<P> {
    pin: P,
    polarity: LedPolarity,
}

impl<P> Led<P>
where
    P: OutputPin,
{
    /// Wraps an output pin with the given polarity.
    #[must_use]
    pub fn new(pin: P, polarity: LedPolarity) -> Self {
        Self { pin, polarity }
    }

    /// Returns the configured polarity.
    #[must_use]
    pub fn polarity(&self) -> LedPolarity {
        self.polarity
    }

    /// Releases the underlying pin.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> ActuatorSink for Led<P>
where
    P: OutputPin + Send,
{
    fn apply(&mut self, state: ActuatorState) -> Result<(), HardwareError> {
        self.pin
            .set_state(self.polarity.level_for(state))
            .map_err(|e| HardwareError::Write(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use embedded_hal::digital::ErrorType;

    use super::*;

    #[derive(Default)]
    struct RecordingPin {
        writes: Vec<bool>,
    }

    impl ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.writes.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.writes.push(true);
            Ok(())
        }
    }

    #[test]
    fn active_high_levels() {
        let mut led = Led::new(RecordingPin::default(), LedPolarity::ActiveHigh);
        led.apply(ActuatorState::On).unwrap();
        led.apply(ActuatorState::Off).unwrap();
        assert_eq!(led.into_inner().writes, vec![true, false]);
    }

    #[test]
    fn active_low_levels() {
        let mut led = Led::new(RecordingPin::default(), LedPolarity::ActiveLow);
        led.apply(ActuatorState::On).unwrap();
        led.apply(ActuatorState::Off).unwrap();
        assert_eq!(led.into_inner().writes, vec![false, true]);
    }

    #[test]
    fn repeated_apply_keeps_level() {
        let mut led = Led::new(RecordingPin::default(), LedPolarity::ActiveHigh);
        for _ in 0..3 {
            led.apply(ActuatorState::On).unwrap();
        }
        let writes = led.into_inner().writes;
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|&high| high));
    }
}
