// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT link using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::convert::Infallible;
use std::time::Duration;

use embedded_hal::digital::{ErrorType, InputPin};
use ledsync::protocol::{MqttLink, PublishOptions, Publisher, Qos};
use ledsync::{ActuatorSink, ActuatorState, Button, Controller, ControllerConfig, HardwareError};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

struct IdlePin;

impl ErrorType for IdlePin {
    type Error = Infallible;
}

impl InputPin for IdlePin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

struct NullSink;

impl ActuatorSink for NullSink {
    fn apply(&mut self, _: ActuatorState) -> Result<(), HardwareError> {
        Ok(())
    }
}

// ============================================================================
// MqttLink Connection Tests
// ============================================================================

mod link_connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = MqttLink::builder()
            .url(format!("mqtt://127.0.0.1:{port}"))
            .build()
            .await;
        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());

        let (link, _inbound) = result.unwrap();
        assert!(link.is_connected());
        assert_eq!(link.host(), "127.0.0.1");
        assert_eq!(link.port(), port);
        assert!(link.client_id().starts_with("ledsync_"));
    }

    #[tokio::test]
    async fn connect_with_tcp_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = MqttLink::builder()
            .url(format!("tcp://127.0.0.1:{port}"))
            .build()
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn connect_with_host_and_port() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = MqttLink::builder()
            .host("127.0.0.1")
            .port(port)
            .client_id("lamp_controller")
            .build()
            .await;

        let (link, _inbound) = result.unwrap();
        assert_eq!(link.client_id(), "lamp_controller");
    }

    #[tokio::test]
    async fn connect_refused_fails() {
        // Nothing listens on this port.
        let port = get_test_port();

        let result = MqttLink::builder()
            .host("127.0.0.1")
            .port(port)
            .connection_timeout(Duration::from_secs(2))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn subscribe_and_publish() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (link, _inbound) = MqttLink::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await
            .unwrap();

        link.subscribe("esp32/status", Qos::AtLeastOnce).await.unwrap();
        link.subscribe("esp32/button", Qos::AtLeastOnce).await.unwrap();
        link.subscribe("esp32/status", Qos::AtLeastOnce).await.unwrap();
        assert_eq!(link.subscriptions(), vec!["esp32/status", "esp32/button"]);

        let result = link
            .publish("esp32/status", "on", PublishOptions::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn disconnect_marks_link_down() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (link, _inbound) = MqttLink::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await
            .unwrap();

        link.disconnect().await;
        assert!(!link.is_connected());

        let result = link
            .publish("esp32/status", "on", PublishOptions::default())
            .await;
        assert!(result.is_err());
    }
}

// ============================================================================
// Controller over MQTT
// ============================================================================
//
// The mock broker does not forward publishes between clients, so command
// handling is covered by tests/controller.rs with an in-memory transport.

mod controller_mqtt {
    use super::*;

    #[tokio::test]
    async fn start_and_shutdown() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = ControllerConfig::new("esp32");
        let controller = Controller::connect_mqtt(
            &config,
            MqttLink::builder().host("127.0.0.1").port(port),
            Button::new(IdlePin),
            NullSink,
        )
        .await
        .unwrap();

        let link = controller.link().unwrap().clone();
        assert!(link.is_connected());
        assert_eq!(link.subscriptions(), vec!["esp32/status", "esp32/button"]);
        assert_eq!(controller.state(), ActuatorState::Off);

        controller.shutdown().await;
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_connecting() {
        // No broker needed: validation runs first.
        let config = ControllerConfig::new("").with_poll_interval(Duration::from_millis(10));

        let result = Controller::connect_mqtt(
            &config,
            MqttLink::builder().host("127.0.0.1").port(1),
            Button::new(IdlePin),
            NullSink,
        )
        .await;

        assert!(matches!(result, Err(ledsync::Error::Config(_))));
    }

    #[tokio::test]
    async fn shutdown_after_link_dropped_is_clean() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = ControllerConfig::new("esp32");
        let controller = Controller::connect_mqtt(
            &config,
            MqttLink::builder().host("127.0.0.1").port(port),
            Button::new(IdlePin),
            NullSink,
        )
        .await
        .unwrap();

        // Someone else already closed the link; stopping must still succeed.
        let link = controller.link().unwrap().clone();
        link.disconnect().await;
        sleep(Duration::from_millis(100)).await;

        controller.shutdown().await;
        assert!(!link.is_connected());
    }
}
