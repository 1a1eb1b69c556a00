// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic bindings and inbound message decoding.
//!
//! ```text
//! MQTT Message: lamp/button → led_on
//!                    ↓
//!        TopicBindings.channel_for("lamp/button")
//!                    ↓
//!             Channel::Button
//!                    ↓
//!        match payload == b"led_on"
//!                    ↓
//!      RemoteCommand::RequestOnPending
//! ```

use super::{Channel, RemoteCommand};

/// Static mapping between topics and channels.
///
/// Built once at startup and never mutated. Matching is by full string
/// equality, both for the topic and for the payload token, so a payload of
/// `on1` or `o` never decodes as `on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBindings {
    status: String,
    button: String,
}

impl TopicBindings {
    /// Creates bindings from explicit topics.
    #[must_use]
    pub fn new(status_topic: impl Into<String>, button_topic: impl Into<String>) -> Self {
        Self {
            status: status_topic.into(),
            button: button_topic.into(),
        }
    }

    /// Creates the default `<device>/status` and `<device>/button` bindings.
    #[must_use]
    pub fn for_device(device: &str) -> Self {
        Self::new(format!("{device}/status"), format!("{device}/button"))
    }

    /// Returns the topic bound to `channel`.
    #[must_use]
    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Status => &self.status,
            Channel::Button => &self.button,
        }
    }

    /// Returns the channel bound to `topic`, if any.
    #[must_use]
    pub fn channel_for(&self, topic: &str) -> Option<Channel> {
        if topic == self.status {
            Some(Channel::Status)
        } else if topic == self.button {
            Some(Channel::Button)
        } else {
            None
        }
    }

    /// Returns every bound topic, for subscribing.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        [self.status.as_str(), self.button.as_str()].into_iter()
    }

    /// Decodes an inbound message.
    ///
    /// Returns `None` for unbound topics and unknown payloads. Decoding is
    /// pure: it never fails and has no side effects.
    #[must_use]
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Option<RemoteCommand> {
        match (self.channel_for(topic)?, payload) {
            (Channel::Status, b"on") => Some(RemoteCommand::SetOn),
            (Channel::Status, b"off") => Some(RemoteCommand::SetOff),
            (Channel::Button, b"led_on") => Some(RemoteCommand::RequestOnPending),
            (Channel::Button, b"led_off") => Some(RemoteCommand::RequestOff),
            _ => None,
        }
    }
}
