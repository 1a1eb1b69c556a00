// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outcome records for reconciler operations.

use std::fmt;

use crate::command::{Channel, RemoteCommand};
use crate::types::{ActuatorState, Edge};

/// Why the reconciler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// A decoded inbound command.
    Remote(RemoteCommand),
    /// A debounced local button edge.
    Local(Edge),
    /// A pending intent passed its confirmation delay.
    PendingConfirmed,
    /// A resolver tick with nothing to confirm.
    PendingIdle,
}

impl Cause {
    /// Returns `true` for causes that must be reported to remote observers.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local(_) | Self::PendingConfirmed)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(command) => write!(f, "remote:{command}"),
            Self::Local(edge) => write!(f, "button:{edge}"),
            Self::PendingConfirmed => f.write_str("pending:confirmed"),
            Self::PendingIdle => f.write_str("pending:idle"),
        }
    }
}

/// An outbound message queued for the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Notification {
    /// Channel to publish on.
    pub channel: Channel,
    /// State being reported.
    pub state: ActuatorState,
}

impl Notification {
    /// A state report on the status channel.
    #[must_use]
    pub const fn status(state: ActuatorState) -> Self {
        Self {
            channel: Channel::Status,
            state,
        }
    }

    /// A mirrored button action on the button channel.
    #[must_use]
    pub const fn button(state: ActuatorState) -> Self {
        Self {
            channel: Channel::Button,
            state,
        }
    }

    /// Returns the payload token for this notification.
    #[must_use]
    pub const fn payload(&self) -> &'static str {
        self.channel.token(self.state)
    }
}

/// What a single reconciler operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    previous: ActuatorState,
    current: ActuatorState,
    cause: Cause,
    applied: bool,
    notifications: Vec<Notification>,
}

impl Transition {
    pub(crate) fn new(
        previous: ActuatorState,
        current: ActuatorState,
        cause: Cause,
        notifications: Vec<Notification>,
    ) -> Self {
        Self {
            previous,
            current,
            cause,
            applied: true,
            notifications,
        }
    }

    /// An input that left the state and the output untouched.
    pub(crate) fn ignored(state: ActuatorState, cause: Cause) -> Self {
        Self {
            previous: state,
            current: state,
            cause,
            applied: false,
            notifications: Vec::new(),
        }
    }

    /// State before the operation.
    #[must_use]
    pub fn previous(&self) -> ActuatorState {
        self.previous
    }

    /// State after the operation.
    #[must_use]
    pub fn current(&self) -> ActuatorState {
        self.current
    }

    /// Input that drove the operation.
    #[must_use]
    pub fn cause(&self) -> Cause {
        self.cause
    }

    /// Returns `true` if the state changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// Returns `true` if the actuator was written.
    #[must_use]
    pub fn applied(&self) -> bool {
        self.applied
    }

    /// Messages queued for publishing, in order.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_payloads() {
        assert_eq!(Notification::status(ActuatorState::On).payload(), "on");
        assert_eq!(Notification::button(ActuatorState::Off).payload(), "led_off");
    }

    #[test]
    fn ignored_transition_is_inert() {
        let t = Transition::ignored(ActuatorState::Off, Cause::Local(Edge::Released));
        assert!(!t.changed());
        assert!(!t.applied());
        assert!(t.notifications().is_empty());
    }

    #[test]
    fn local_causes() {
        assert!(Cause::Local(Edge::Pressed).is_local());
        assert!(Cause::PendingConfirmed.is_local());
        assert!(!Cause::Remote(RemoteCommand::SetOn).is_local());
        assert!(!Cause::PendingIdle.is_local());
    }

    #[test]
    fn cause_display() {
        assert_eq!(Cause::Remote(RemoteCommand::SetOff).to_string(), "remote:set_off");
        assert_eq!(Cause::Local(Edge::Pressed).to_string(), "button:pressed");
    }
}
