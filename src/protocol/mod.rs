// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message-bus plumbing between the reconciler and the broker.
//!
//! The controller needs very little from its transport: a way to publish a
//! short text payload, and a stream of inbound `(topic, payload)` messages.
//! [`Publisher`] captures the first; the second is a plain
//! `mpsc::Receiver<InboundMessage>`. [`MqttLink`] provides both on top of
//! `rumqttc`, and tests can provide either with a few lines of code.
//!
//! - [`Notifier`]: drains the reconciler's outbound queue
//! - [`EchoFilter`]: drops our own publishes when the broker delivers them back

mod echo;
#[cfg(feature = "mqtt")]
mod mqtt_link;
mod notifier;

pub use echo::EchoFilter;
#[cfg(feature = "mqtt")]
pub use mqtt_link::{MqttLink, MqttLinkBuilder, MqttLinkConfig};
pub use notifier::{Notifier, PublishStats};

use std::future::Future;

use tokio::sync::watch;

use crate::error::ProtocolError;

/// A message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Creates a new inbound message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Delivery guarantee requested from the broker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered at least once.
    #[default]
    AtLeastOnce,
    /// Delivered exactly once.
    ExactlyOnce,
}

#[cfg(feature = "mqtt")]
impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => Self::AtMostOnce,
            Qos::AtLeastOnce => Self::AtLeastOnce,
            Qos::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

/// Options applied to every outbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    /// Delivery guarantee.
    pub qos: Qos,
    /// Ask the broker to keep the message for late subscribers.
    pub retain: bool,
}

/// Outbound half of a message-bus transport.
pub trait Publisher: Send + Sync + 'static {
    /// Publishes `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message could not be handed to the
    /// broker.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Returns a receiver that changes every time the transport restores a
    /// lost broker session.
    ///
    /// Transports that cannot tell return `None`.
    fn reconnects(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_publish_options() {
        let options = PublishOptions::default();
        assert_eq!(options.qos, Qos::AtLeastOnce);
        assert!(!options.retain);
    }

    #[test]
    fn qos_serde_names() {
        let json = serde_json::to_string(&Qos::ExactlyOnce).unwrap();
        assert_eq!(json, "\"exactly_once\"");
        let qos: Qos = serde_json::from_str("\"at_most_once\"").unwrap();
        assert_eq!(qos, Qos::AtMostOnce);
    }

    #[cfg(feature = "mqtt")]
    #[test]
    fn qos_maps_to_rumqttc() {
        assert_eq!(rumqttc::QoS::from(Qos::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
    }
}
