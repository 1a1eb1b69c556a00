// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Digital line levels and debounced button edges.

use std::fmt;

/// Raw logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputLevel {
    /// Logic high. An idle active-low button with pull-up reads high.
    High,
    /// Logic low. A pressed active-low button reads low.
    Low,
}

impl InputLevel {
    /// Returns `true` for [`InputLevel::High`].
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl From<bool> for InputLevel {
    /// `true` maps to [`InputLevel::High`].
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl fmt::Display for InputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// A debounced transition of the button between two stable levels.
///
/// The button is wired active-low, so a HIGH→LOW transition is a press and
/// LOW→HIGH is a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// The button went down (HIGH → LOW).
    Pressed,
    /// The button came back up (LOW → HIGH).
    Released,
}

impl Edge {
    /// Returns the edge produced by settling on `level`.
    #[must_use]
    pub const fn settled_at(level: InputLevel) -> Self {
        match level {
            InputLevel::Low => Self::Pressed,
            InputLevel::High => Self::Released,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pressed => write!(f, "pressed"),
            Self::Released => write!(f, "released"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_low_edges() {
        assert_eq!(Edge::settled_at(InputLevel::Low), Edge::Pressed);
        assert_eq!(Edge::settled_at(InputLevel::High), Edge::Released);
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(InputLevel::from(true), InputLevel::High);
        assert_eq!(InputLevel::from(false), InputLevel::Low);
        assert!(InputLevel::High.is_high());
    }
}
