// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote commands and the channels they arrive on.
//!
//! # Channels
//!
//! | Channel | Default topic | Payloads |
//! |---|---|---|
//! | [`Channel::Status`] | `<device>/status` | `on`, `off` |
//! | [`Channel::Button`] | `<device>/button` | `led_on`, `led_off` |
//!
//! The status channel carries direct "set state" commands and is also where
//! the controller reports state changes. The button channel is a proxy for a
//! button that lives on another device.
//!
//! # Examples
//!
//! ```
//! use ledsync::command::{RemoteCommand, TopicBindings};
//!
//! let bindings = TopicBindings::for_device("lamp");
//! assert_eq!(bindings.decode("lamp/status", b"on"), Some(RemoteCommand::SetOn));
//! assert_eq!(bindings.decode("lamp/button", b"led_on"), Some(RemoteCommand::RequestOnPending));
//! assert_eq!(bindings.decode("lamp/status", b"on1"), None);
//! ```

mod decoder;

pub use decoder::TopicBindings;

use std::fmt;

use crate::types::ActuatorState;

/// Logical message channel a topic is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Direct commands in, state reports out.
    Status,
    /// Remote button proxy.
    Button,
}

impl Channel {
    /// Returns the payload token that represents `state` on this channel.
    #[must_use]
    pub const fn token(self, state: ActuatorState) -> &'static str {
        match (self, state) {
            (Self::Status, ActuatorState::On) => "on",
            (Self::Status, ActuatorState::Off) => "off",
            (Self::Button, ActuatorState::On) => "led_on",
            (Self::Button, ActuatorState::Off) => "led_off",
        }
    }

    /// Returns a short name for logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Button => "button",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    /// `on` on the status channel.
    SetOn,
    /// `off` on the status channel.
    SetOff,
    /// `led_on` on the button channel: turn on once confirmed.
    RequestOnPending,
    /// `led_off` on the button channel: turn off and drop any pending request.
    RequestOff,
}

impl RemoteCommand {
    /// Returns the channel this command arrives on.
    #[must_use]
    pub const fn channel(self) -> Channel {
        match self {
            Self::SetOn | Self::SetOff => Channel::Status,
            Self::RequestOnPending | Self::RequestOff => Channel::Button,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetOn => "set_on",
            Self::SetOff => "set_off",
            Self::RequestOnPending => "request_on_pending",
            Self::RequestOff => "request_off",
        };
        f.write_str(name)
    }
}
