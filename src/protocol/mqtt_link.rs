// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection for the controller.
//!
//! [`MqttLink`] owns one `rumqttc` client and the task driving its event
//! loop. Inbound publishes are forwarded, undecoded, to the receiver
//! returned by [`MqttLinkBuilder::build`]. Subscriptions are remembered and
//! replayed after every reconnect, since the session is clean.
//!
//! When the connection drops, the event loop keeps retrying for as long as
//! the link lives, waiting twice as long after each failed attempt.
//!
//! # Examples
//!
//! ```no_run
//! use ledsync::protocol::{MqttLink, Qos};
//!
//! # async fn example() -> ledsync::Result<()> {
//! let (link, mut inbound) = MqttLink::builder()
//!     .url("mqtt://192.168.1.50:1883")
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! link.subscribe("esp32/status", Qos::AtLeastOnce).await?;
//!
//! while let Some(message) = inbound.recv().await {
//!     println!("{}: {:?}", message.topic, message.payload);
//! }
//!
//! link.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::{mpsc, oneshot, watch};

use super::{InboundMessage, PublishOptions, Publisher, Qos};
use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
pub struct MqttLinkConfig {
    host: String,
    port: u16,
    url: Option<String>,
    credentials: Option<(String, String)>,
    client_id: Option<String>,
    keep_alive: Duration,
    connection_timeout: Duration,
    retry_delay: Duration,
    max_retry_delay: Duration,
    inbound_capacity: usize,
}

impl Default for MqttLinkConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            url: None,
            credentials: None,
            client_id: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(60),
            inbound_capacity: 64,
        }
    }
}

impl MqttLinkConfig {
    /// Resolves the broker address, preferring an explicit URL.
    fn address(&self) -> Result<(String, u16), ProtocolError> {
        let (host, port) = match &self.url {
            Some(url) => parse_mqtt_url(url)?,
            None => (self.host.clone(), self.port),
        };
        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }
        Ok((host, port))
    }

    /// Delay before reconnect attempt `attempt` (0-based).
    fn retry_delay(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.retry_delay.checked_mul(factor))
            .map_or(self.max_retry_delay, |delay| delay.min(self.max_retry_delay))
    }
}

/// A live connection to an MQTT broker.
///
/// Cheaply cloneable; clones share the same client and event loop.
#[derive(Clone)]
pub struct MqttLink {
    inner: Arc<MqttLinkInner>,
}

struct MqttLinkInner {
    client: AsyncClient,
    host: String,
    port: u16,
    client_id: String,
    /// Topics to replay after a reconnect.
    subscriptions: Mutex<Vec<(String, Qos)>>,
    connected: AtomicBool,
    closing: AtomicBool,
    /// Bumped on every restored session.
    reconnects: watch::Sender<u64>,
}

impl MqttLink {
    /// Creates a new builder for configuring a broker connection.
    #[must_use]
    pub fn builder() -> MqttLinkBuilder {
        MqttLinkBuilder::default()
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Returns the MQTT client identifier in use.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Subscribes to `topic` now and after every reconnect.
    ///
    /// Subscribing to the same topic twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns error if the subscribe request cannot be queued.
    pub async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), ProtocolError> {
        {
            let mut subscriptions = self.inner.subscriptions.lock();
            if !subscriptions.iter().any(|(t, _)| t == topic) {
                subscriptions.push((topic.to_string(), qos));
            }
        }

        self.inner
            .client
            .subscribe(topic, qos.into())
            .await
            .map_err(ProtocolError::Mqtt)?;

        tracing::debug!(topic = %topic, ?qos, "Subscribed to topic");
        Ok(())
    }

    /// Returns the topics that are replayed after a reconnect.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner
            .subscriptions
            .lock()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Returns a receiver that changes every time a lost session is
    /// restored. The value counts reconnects since the link was built.
    #[must_use]
    pub fn reconnects(&self) -> watch::Receiver<u64> {
        self.inner.reconnects.subscribe()
    }

    /// Marks the link up after a ConnAck.
    ///
    /// After a reconnect the remembered subscriptions are re-issued and
    /// reconnect watchers are woken. Runs on the event-loop task, so
    /// requests are queued without waiting.
    fn on_connected(&self, reconnect: bool) {
        self.inner.connected.store(true, Ordering::Release);
        if !reconnect {
            return;
        }

        let subscriptions = self.inner.subscriptions.lock().clone();
        for (topic, qos) in subscriptions {
            if let Err(e) = self.inner.client.try_subscribe(&topic, qos.into()) {
                tracing::warn!(topic = %topic, error = %e, "Failed to resubscribe");
            } else {
                tracing::debug!(topic = %topic, "Resubscribed to topic");
            }
        }

        self.inner.reconnects.send_modify(|count| *count += 1);
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// A link whose event loop has already stopped counts as disconnected.
    pub async fn disconnect(&self) {
        tracing::info!(
            host = %self.inner.host,
            port = %self.inner.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.closing.store(true, Ordering::Release);
        if let Err(e) = self.inner.client.disconnect().await {
            tracing::debug!(error = %e, "MQTT event loop already stopped");
        }

        self.inner.connected.store(false, Ordering::Release);
    }
}

impl Publisher for MqttLink {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::ConnectionFailed(
                "MQTT broker not connected".to_string(),
            ));
        }

        self.inner
            .client
            .publish(topic, options.qos.into(), options.retain, payload.as_bytes().to_vec())
            .await
            .map_err(ProtocolError::Mqtt)
    }

    fn reconnects(&self) -> Option<watch::Receiver<u64>> {
        Some(MqttLink::reconnects(self))
    }
}

impl std::fmt::Debug for MqttLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttLink")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("client_id", &self.inner.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for creating an [`MqttLink`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ledsync::protocol::MqttLink;
///
/// # async fn example() -> ledsync::Result<()> {
/// let (link, inbound) = MqttLink::builder()
///     .host("192.168.1.50")
///     .port(1883)
///     .client_id("esp32_lamp")
///     .keep_alive(Duration::from_secs(60))
///     .retry_delays(Duration::from_millis(500), Duration::from_secs(30))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttLinkBuilder {
    config: MqttLinkConfig,
}

impl MqttLinkBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets host and port from a URL such as `mqtt://broker:1883`.
    ///
    /// Takes precedence over [`host`](Self::host) and [`port`](Self::port).
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets a fixed client identifier (default: generated per process).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the timeout for the first connection (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the delay before the first reconnect attempt and the cap the
    /// doubling delay never exceeds (default: 1 second and 60 seconds).
    #[must_use]
    pub fn retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry_delay = initial;
        self.config.max_retry_delay = max.max(initial);
        self
    }

    /// Sets the capacity of the inbound message channel (default: 64).
    #[must_use]
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity.max(1);
        self
    }

    /// Connects to the broker.
    ///
    /// Returns the link together with the receiver for inbound messages.
    /// The first connection is not retried: if the broker cannot be reached
    /// within the connection timeout, building fails.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set or the URL is invalid
    /// - Connection fails
    /// - Connection times out
    pub async fn build(self) -> Result<(MqttLink, mpsc::Receiver<InboundMessage>), ProtocolError> {
        let (host, port) = self.config.address()?;

        let client_id = self.config.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("ledsync_{}_{}", std::process::id(), counter)
        });

        let mut mqtt_options = MqttOptions::new(&client_id, &host, port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_capacity);

        let link = MqttLink {
            inner: Arc::new(MqttLinkInner {
                client,
                host: host.clone(),
                port,
                client_id,
                subscriptions: Mutex::new(Vec::new()),
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                reconnects: watch::Sender::new(0),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(drive_event_loop(
            event_loop,
            link.clone(),
            inbound_tx,
            self.config.clone(),
            connack_tx,
        ));

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %host,
                    port = %port,
                    client_id = %link.client_id(),
                    "Connected to MQTT broker"
                );
                Ok((link, inbound_rx))
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => {
                // Stop the event loop from retrying on its own.
                link.inner.closing.store(true, Ordering::Release);
                let _ = link.inner.client.try_disconnect();
                Err(ProtocolError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

/// Drives the `rumqttc` event loop until the link is closed or gives up.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    link: MqttLink,
    inbound_tx: mpsc::Sender<InboundMessage>,
    config: MqttLinkConfig,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);
    let mut attempt: u32 = 0;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                if let Some(tx) = connack_tx.take() {
                    link.on_connected(false);
                    let _ = tx.send(());
                } else {
                    tracing::info!(attempts = attempt, "Reconnected to MQTT broker");
                    link.on_connected(true);
                }
                attempt = 0;
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "MQTT message received"
                );
                let message = InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(message).await.is_err() {
                    tracing::debug!("Inbound receiver dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker sent disconnect");
                link.inner.connected.store(false, Ordering::Release);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                link.inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                link.inner.connected.store(false, Ordering::Release);

                if link.inner.closing.load(Ordering::Acquire) {
                    tracing::debug!(error = %e, "MQTT event loop closed");
                    break;
                }
                if connack_tx.is_some() {
                    tracing::error!(error = %e, "MQTT connection failed");
                    break;
                }
                let delay = config.retry_delay(attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "MQTT connection lost, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    Ok((host, port))
}
