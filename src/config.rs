// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller configuration.

use std::time::Duration;

use embedded_hal::digital::OutputPin;
use serde::{Deserialize, Serialize};

use crate::command::{Channel, TopicBindings};
use crate::error::ConfigError;
use crate::output::{Led, LedPolarity};
use crate::protocol::{PublishOptions, Qos};
use crate::reconciler::{ButtonMode, ReconcilerSettings};

/// Configuration for a [`Controller`](crate::Controller).
///
/// Durations are (de)serialized as whole milliseconds, and every field is
/// optional in JSON.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ledsync::ControllerConfig;
///
/// // Topics derived from the device name: "lamp/status" and "lamp/button"
/// let config = ControllerConfig::new("lamp")
///     .with_debounce_window(Duration::from_millis(50))
///     .with_confirm_delay(Duration::from_millis(300));
/// assert!(config.validate().is_ok());
///
/// // Loaded from JSON
/// let config = ControllerConfig::from_json(r#"{
///     "device": "esp32",
///     "status_topic": "esp32/tp1",
///     "button_topic": "esp32/tp2",
///     "debounce_ms": 200
/// }"#)?;
/// assert_eq!(config.bindings().topic(ledsync::command::Channel::Button), "esp32/tp2");
/// # Ok::<(), ledsync::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Device name; default topics are `<device>/status` and `<device>/button`.
    pub device: String,
    /// Topic of the direct command channel (overrides the default).
    pub status_topic: Option<String>,
    /// Topic of the button proxy channel (overrides the default).
    pub button_topic: Option<String>,
    /// How long a button level must hold before it counts.
    #[serde(rename = "debounce_ms", with = "duration_ms")]
    pub debounce_window: Duration,
    /// Button sampling cadence.
    #[serde(rename = "poll_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Pending-request resolver cadence.
    #[serde(rename = "resolve_ms", with = "duration_ms")]
    pub resolve_interval: Duration,
    /// How long a pending request waits before it is committed.
    #[serde(rename = "confirm_delay_ms", with = "duration_ms")]
    pub confirm_delay: Duration,
    /// How long an outbound publish is remembered for echo suppression.
    #[serde(rename = "echo_window_ms", with = "duration_ms")]
    pub echo_window: Duration,
    /// How often an undelivered status report is retried.
    #[serde(rename = "report_retry_ms", with = "duration_ms")]
    pub report_retry_interval: Duration,
    /// How button edges map to state.
    pub button_mode: ButtonMode,
    /// Also report local changes on the button channel.
    pub mirror_button: bool,
    /// Electrical polarity of the LED output.
    pub led_polarity: LedPolarity,
    /// QoS for subscriptions and outbound publishes.
    pub qos: Qos,
    /// Retain flag for outbound publishes.
    pub retain: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device: "esp32".to_string(),
            status_topic: None,
            button_topic: None,
            debounce_window: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            resolve_interval: Duration::from_millis(50),
            confirm_delay: Duration::ZERO,
            echo_window: Duration::from_secs(2),
            report_retry_interval: Duration::from_secs(1),
            button_mode: ButtonMode::Toggle,
            mirror_button: false,
            led_polarity: LedPolarity::ActiveHigh,
            qos: Qos::AtLeastOnce,
            retain: false,
        }
    }
}

impl ControllerConfig {
    /// Creates a configuration for `device` with default settings.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, or the first
    /// validation failure.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the direct command topic.
    #[must_use]
    pub fn with_status_topic(mut self, topic: impl Into<String>) -> Self {
        self.status_topic = Some(topic.into());
        self
    }

    /// Overrides the button proxy topic.
    #[must_use]
    pub fn with_button_topic(mut self, topic: impl Into<String>) -> Self {
        self.button_topic = Some(topic.into());
        self
    }

    /// Sets the debounce window (zero commits on the first differing sample).
    #[must_use]
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the button sampling cadence.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the pending-request resolver cadence.
    #[must_use]
    pub fn with_resolve_interval(mut self, interval: Duration) -> Self {
        self.resolve_interval = interval;
        self
    }

    /// Sets the confirmation delay for pending requests.
    #[must_use]
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    /// Sets the echo suppression window (zero disables suppression).
    #[must_use]
    pub fn with_echo_window(mut self, window: Duration) -> Self {
        self.echo_window = window;
        self
    }

    /// Sets how often an undelivered status report is retried.
    #[must_use]
    pub fn with_report_retry_interval(mut self, interval: Duration) -> Self {
        self.report_retry_interval = interval;
        self
    }

    /// Sets the button mode.
    #[must_use]
    pub fn with_button_mode(mut self, mode: ButtonMode) -> Self {
        self.button_mode = mode;
        self
    }

    /// Also reports local changes on the button channel.
    #[must_use]
    pub fn with_mirror_button(mut self, mirror: bool) -> Self {
        self.mirror_button = mirror;
        self
    }

    /// Sets the LED polarity.
    #[must_use]
    pub fn with_led_polarity(mut self, polarity: LedPolarity) -> Self {
        self.led_polarity = polarity;
        self
    }

    /// Sets the QoS for subscriptions and publishes.
    #[must_use]
    pub fn with_qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    /// Sets the retain flag for publishes.
    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Checks the configuration for values the controller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_topic(&self.device) {
            return Err(ConfigError::InvalidDeviceName(self.device.clone()));
        }

        let bindings = self.bindings();
        for channel in [Channel::Status, Channel::Button] {
            let topic = bindings.topic(channel);
            if !is_valid_topic(topic) {
                return Err(ConfigError::InvalidTopic {
                    channel: channel.name(),
                    topic: topic.to_string(),
                });
            }
        }
        if bindings.topic(Channel::Status) == bindings.topic(Channel::Button) {
            return Err(ConfigError::DuplicateTopic(
                bindings.topic(Channel::Status).to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("poll_interval"));
        }
        if self.resolve_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("resolve_interval"));
        }
        if self.report_retry_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("report_retry_interval"));
        }

        Ok(())
    }

    /// Builds the topic bindings, applying overrides to the device defaults.
    #[must_use]
    pub fn bindings(&self) -> TopicBindings {
        let defaults = TopicBindings::for_device(&self.device);
        TopicBindings::new(
            self.status_topic
                .clone()
                .unwrap_or_else(|| defaults.topic(Channel::Status).to_string()),
            self.button_topic
                .clone()
                .unwrap_or_else(|| defaults.topic(Channel::Button).to_string()),
        )
    }

    /// Returns the reconciler settings.
    #[must_use]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            button_mode: self.button_mode,
            confirm_delay: self.confirm_delay,
            mirror_button: self.mirror_button,
        }
    }

    /// Returns the options for outbound publishes.
    #[must_use]
    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            qos: self.qos,
            retain: self.retain,
        }
    }

    /// Wraps `pin` in an LED sink with the configured polarity.
    #[must_use]
    pub fn led<P>(&self, pin: P) -> Led<P>
    where
        P: OutputPin,
    {
        Led::new(pin, self.led_polarity)
    }
}

/// Topics are compared for exact equality, so wildcards are meaningless.
fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#', '\0'])
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.device, "esp32");
        assert_eq!(config.debounce_window, Duration::from_millis(200));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.resolve_interval, Duration::from_millis(50));
        assert_eq!(config.confirm_delay, Duration::ZERO);
        assert_eq!(config.report_retry_interval, Duration::from_secs(1));
        assert_eq!(config.qos, Qos::AtLeastOnce);
        assert!(!config.retain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_bindings_follow_device() {
        let bindings = ControllerConfig::new("lamp").bindings();
        assert_eq!(bindings.topic(Channel::Status), "lamp/status");
        assert_eq!(bindings.topic(Channel::Button), "lamp/button");
    }

    #[test]
    fn topic_overrides() {
        let bindings = ControllerConfig::new("lamp")
            .with_button_topic("esp32/tp2")
            .bindings();
        assert_eq!(bindings.topic(Channel::Status), "lamp/status");
        assert_eq!(bindings.topic(Channel::Button), "esp32/tp2");
    }

    #[test]
    fn rejects_bad_device() {
        assert_eq!(
            ControllerConfig::new("").validate(),
            Err(ConfigError::InvalidDeviceName(String::new()))
        );
        assert!(matches!(
            ControllerConfig::new("lamp/#").validate(),
            Err(ConfigError::InvalidDeviceName(_))
        ));
    }

    #[test]
    fn rejects_wildcard_topic() {
        let err = ControllerConfig::new("lamp")
            .with_status_topic("lamp/+")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidTopic {
                channel: "status",
                topic: "lamp/+".to_string()
            }
        );
    }

    #[test]
    fn rejects_shared_topic() {
        let err = ControllerConfig::new("lamp")
            .with_status_topic("lamp/led")
            .with_button_topic("lamp/led")
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateTopic("lamp/led".to_string()));
    }

    #[test]
    fn rejects_zero_intervals() {
        assert_eq!(
            ControllerConfig::default()
                .with_poll_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval("poll_interval"))
        );
        assert_eq!(
            ControllerConfig::default()
                .with_resolve_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval("resolve_interval"))
        );
        assert_eq!(
            ControllerConfig::default()
                .with_report_retry_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval("report_retry_interval"))
        );
    }

    #[test]
    fn zero_debounce_and_confirm_are_valid() {
        let config = ControllerConfig::default()
            .with_debounce_window(Duration::ZERO)
            .with_confirm_delay(Duration::ZERO)
            .with_echo_window(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_json_partial() {
        let config = ControllerConfig::from_json(
            r#"{"device": "hall", "confirm_delay_ms": 750, "button_mode": "momentary",
                "led_polarity": "active_low", "retain": true}"#,
        )
        .unwrap();
        assert_eq!(config.device, "hall");
        assert_eq!(config.confirm_delay, Duration::from_millis(750));
        assert_eq!(config.button_mode, ButtonMode::Momentary);
        assert_eq!(config.led_polarity, LedPolarity::ActiveLow);
        assert!(config.retain);
        assert_eq!(config.debounce_window, Duration::from_millis(200));
    }

    #[test]
    fn from_json_errors() {
        assert!(matches!(
            ControllerConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(
            ControllerConfig::from_json(r#"{"poll_ms": 0}"#),
            Err(ConfigError::ZeroInterval("poll_interval"))
        );
    }

    #[test]
    fn json_uses_milliseconds() {
        let json = serde_json::to_value(ControllerConfig::default()).unwrap();
        assert_eq!(json["debounce_ms"], 200);
        assert_eq!(json["echo_window_ms"], 2000);
        assert_eq!(json["report_retry_ms"], 1000);
        assert_eq!(json["qos"], "at_least_once");
    }

    #[test]
    fn derived_settings() {
        let config = ControllerConfig::default()
            .with_mirror_button(true)
            .with_qos(Qos::ExactlyOnce)
            .with_retain(true);
        assert!(config.reconciler_settings().mirror_button);
        assert_eq!(
            config.publish_options(),
            PublishOptions {
                qos: Qos::ExactlyOnce,
                retain: true
            }
        );
    }
}
