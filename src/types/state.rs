// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The authoritative LED state.

use std::fmt;

/// ON/OFF state of the actuator.
///
/// There is exactly one of these per controller and only the
/// [`Reconciler`](crate::Reconciler) changes it.
///
/// # Examples
///
/// ```
/// use ledsync::types::ActuatorState;
///
/// let state = ActuatorState::default();
/// assert_eq!(state, ActuatorState::Off);
/// assert_eq!(state.toggled(), ActuatorState::On);
/// assert_eq!(ActuatorState::On.as_str(), "on");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorState {
    /// The LED is off.
    #[default]
    Off,
    /// The LED is on.
    On,
}

impl ActuatorState {
    /// Returns the status-channel token for this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Returns the opposite state.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    /// Returns `true` if the LED is on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<bool> for ActuatorState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}
