// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for `ledsync`.
//!
//! Nothing in the reconciliation core is fatal. Decoding never fails (an
//! unknown message is simply not relevant), hardware errors degrade to "no
//! change", and transport errors are reported without touching the LED
//! state. The types below exist so those conditions can be surfaced to the
//! caller and logged with context.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The message-bus transport failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The controller configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A GPIO line could not be read or written.
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),
}

/// Errors related to the message-bus transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The MQTT client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker did not acknowledge the connection in time.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors raised while validating a [`ControllerConfig`](crate::ControllerConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The device name is empty or contains MQTT wildcard characters.
    #[error("invalid device name: {0:?}")]
    InvalidDeviceName(String),

    /// A topic is empty or contains MQTT wildcard characters.
    #[error("invalid topic for {channel}: {topic:?}")]
    InvalidTopic {
        /// The logical channel the topic is bound to.
        channel: &'static str,
        /// The offending topic string.
        topic: String,
    },

    /// Two channels are bound to the same topic.
    #[error("status and button channels share topic {0:?}")]
    DuplicateTopic(String),

    /// A polling interval is zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors raised by GPIO lines.
///
/// Pin errors from `embedded-hal` implementations are opaque, so only their
/// debug text is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// Reading the button line failed.
    #[error("failed to read input line: {0}")]
    Read(String),

    /// Writing the LED line failed.
    #[error("failed to write output line: {0}")]
    Write(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
