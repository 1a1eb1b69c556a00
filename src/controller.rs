// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The running controller: one task per input loop around a shared
//! [`Reconciler`].
//!
//! ```text
//!   button loop ──── Edge ─────────┐
//!   resolver loop ── tick ─────────┤
//!   inbound loop ─── echo filter ──┼──▶ Reconciler ──▶ ActuatorSink
//!                    → decode      │        │
//!                                  │        └── Notification ──▶ notifier loop ──▶ Publisher
//! ```
//!
//! Every loop watches the same shutdown flag, and [`Controller::shutdown`]
//! waits for all of them before returning.

use std::sync::Arc;

use embedded_hal::digital::InputPin;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::command::{Channel, TopicBindings};
use crate::config::ControllerConfig;
use crate::error::ConfigError;
use crate::input::{Button, Debouncer};
use crate::output::ActuatorSink;
#[cfg(feature = "mqtt")]
use crate::protocol::{MqttLink, MqttLinkBuilder};
use crate::protocol::{EchoFilter, InboundMessage, Notifier, PublishStats, Publisher};
use crate::reconciler::Reconciler;
use crate::types::{ActuatorState, InputLevel};

/// Resolves once `shutdown` turns true or its sender is dropped.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which also ends the wait.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Handle to a running controller.
///
/// # Examples
///
/// ```no_run
/// use ledsync::{Controller, ControllerConfig};
/// use ledsync::input::Button;
/// use ledsync::protocol::MqttLink;
/// # use std::convert::Infallible;
/// # use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
/// # struct Gpio;
/// # impl ErrorType for Gpio { type Error = Infallible; }
/// # impl InputPin for Gpio {
/// #     fn is_high(&mut self) -> Result<bool, Infallible> { Ok(true) }
/// #     fn is_low(&mut self) -> Result<bool, Infallible> { Ok(false) }
/// # }
/// # impl OutputPin for Gpio {
/// #     fn set_low(&mut self) -> Result<(), Infallible> { Ok(()) }
/// #     fn set_high(&mut self) -> Result<(), Infallible> { Ok(()) }
/// # }
///
/// # async fn example(button_pin: Gpio, led_pin: Gpio) -> ledsync::Result<()> {
/// let config = ControllerConfig::new("esp32");
/// let controller = Controller::connect_mqtt(
///     &config,
///     MqttLink::builder().url("mqtt://192.168.1.50:1883"),
///     Button::new(button_pin),
///     config.led(led_pin),
/// )
/// .await?;
///
/// let mut state = controller.subscribe();
/// while state.changed().await.is_ok() {
///     println!("LED is now {}", *state.borrow_and_update());
/// }
///
/// controller.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Controller<S> {
    reconciler: Arc<Reconciler<S>>,
    bindings: Arc<TopicBindings>,
    echo: Arc<EchoFilter>,
    stats: Arc<PublishStats>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    #[cfg(feature = "mqtt")]
    link: Option<MqttLink>,
}

impl<S> Controller<S>
where
    S: ActuatorSink + 'static,
{
    /// Starts the controller loops on the current tokio runtime.
    ///
    /// `inbound` carries every message delivered by the transport;
    /// `publisher` receives every notification. The sink is driven OFF
    /// before any loop starts.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem; nothing is started then.
    pub fn spawn<P, I>(
        config: &ControllerConfig,
        publisher: P,
        inbound: mpsc::Receiver<InboundMessage>,
        button: Button<I>,
        sink: S,
    ) -> Result<Self, ConfigError>
    where
        P: Publisher,
        I: InputPin + Send + 'static,
    {
        config.validate()?;

        let bindings = Arc::new(config.bindings());
        let echo = Arc::new(EchoFilter::new(config.echo_window));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let reconciler = Arc::new(Reconciler::new(
            sink,
            config.reconciler_settings(),
            outbound_tx,
        ));
        let notifier = Notifier::new(
            publisher,
            Arc::clone(&bindings),
            Arc::clone(&echo),
            config.publish_options(),
        )
        .with_retry_interval(config.report_retry_interval);
        let stats = notifier.stats();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            (
                "button",
                tokio::spawn(button_loop(
                    button,
                    Debouncer::new(config.debounce_window, InputLevel::High),
                    Arc::clone(&reconciler),
                    config.poll_interval,
                    shutdown_rx.clone(),
                )),
            ),
            (
                "resolver",
                tokio::spawn(resolver_loop(
                    Arc::clone(&reconciler),
                    config.resolve_interval,
                    shutdown_rx.clone(),
                )),
            ),
            (
                "inbound",
                tokio::spawn(inbound_loop(
                    inbound,
                    Arc::clone(&bindings),
                    Arc::clone(&echo),
                    Arc::clone(&reconciler),
                    shutdown_rx.clone(),
                )),
            ),
            (
                "notifier",
                tokio::spawn(notifier.run(outbound_rx, reconciler.subscribe(), shutdown_rx)),
            ),
        ];

        tracing::info!(
            status = %bindings.topic(Channel::Status),
            button = %bindings.topic(Channel::Button),
            mode = ?config.button_mode,
            "Controller started"
        );

        Ok(Self {
            reconciler,
            bindings,
            echo,
            stats,
            shutdown_tx,
            tasks,
            #[cfg(feature = "mqtt")]
            link: None,
        })
    }

    /// Connects to an MQTT broker, subscribes both bound topics and starts
    /// the controller on the connection.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, the broker cannot be
    /// reached, or the subscriptions cannot be made.
    #[cfg(feature = "mqtt")]
    pub async fn connect_mqtt<I>(
        config: &ControllerConfig,
        link: MqttLinkBuilder,
        button: Button<I>,
        sink: S,
    ) -> crate::Result<Self>
    where
        I: InputPin + Send + 'static,
    {
        config.validate()?;

        let (link, inbound) = link.build().await?;
        for topic in config.bindings().topics() {
            if let Err(e) = link.subscribe(topic, config.qos).await {
                link.disconnect().await;
                return Err(e.into());
            }
        }

        let mut controller = Self::spawn(config, link.clone(), inbound, button, sink)?;
        controller.link = Some(link);
        Ok(controller)
    }

    /// Returns the current LED state.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        self.reconciler.state()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ActuatorState> {
        self.reconciler.subscribe()
    }

    /// Returns the shared reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Arc<Reconciler<S>> {
        &self.reconciler
    }

    /// Returns the topic bindings in use.
    #[must_use]
    pub fn bindings(&self) -> &TopicBindings {
        &self.bindings
    }

    /// Returns the notifier counters.
    #[must_use]
    pub fn publish_stats(&self) -> &PublishStats {
        &self.stats
    }

    /// Returns the broker link, when started with
    /// [`connect_mqtt`](Self::connect_mqtt).
    #[cfg(feature = "mqtt")]
    #[must_use]
    pub fn link(&self) -> Option<&MqttLink> {
        self.link.as_ref()
    }

    /// Disconnects from the broker, then stops every loop and waits for
    /// them.
    ///
    /// Notifications not yet published are dropped.
    pub async fn shutdown(self) {
        tracing::info!("Stopping controller");
        self.shutdown_tx.send_replace(true);

        #[cfg(feature = "mqtt")]
        if let Some(link) = &self.link {
            link.disconnect().await;
        }

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(task = name, error = %e, "Controller task ended abnormally");
            }
        }

        tracing::info!(
            published = self.stats.published(),
            failed = self.stats.failed(),
            "Controller stopped"
        );
    }
}

impl<S> std::fmt::Debug for Controller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("reconciler", &self.reconciler)
            .field("bindings", &self.bindings)
            .field("echo", &self.echo)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

async fn button_loop<I, S>(
    mut button: Button<I>,
    mut debouncer: Debouncer,
    reconciler: Arc<Reconciler<S>>,
    poll_interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    I: InputPin,
    S: ActuatorSink,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break,
            _ = ticker.tick() => {
                let level = button.sample();
                if let Some(edge) = debouncer.sample(level) {
                    let transition = reconciler.handle_edge(edge);
                    tracing::debug!(
                        edge = %edge,
                        changed = transition.changed(),
                        "Button edge"
                    );
                }
            }
        }
    }

    tracing::debug!("Button loop stopped");
}

async fn resolver_loop<S>(
    reconciler: Arc<Reconciler<S>>,
    resolve_interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: ActuatorSink,
{
    let mut ticker = tokio::time::interval(resolve_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break,
            _ = ticker.tick() => {
                let _ = reconciler.resolve_pending();
            }
        }
    }

    tracing::debug!("Pending resolver stopped");
}

async fn inbound_loop<S>(
    mut inbound: mpsc::Receiver<InboundMessage>,
    bindings: Arc<TopicBindings>,
    echo: Arc<EchoFilter>,
    reconciler: Arc<Reconciler<S>>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: ActuatorSink,
{
    loop {
        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break,
            next = inbound.recv() => {
                let Some(message) = next else {
                    tracing::debug!("Inbound stream closed");
                    break;
                };
                dispatch(&message, &bindings, &echo, &reconciler);
            }
        }
    }

    tracing::debug!("Inbound loop stopped");
}

/// Runs one inbound message through echo suppression and decoding.
fn dispatch<S>(
    message: &InboundMessage,
    bindings: &TopicBindings,
    echo: &EchoFilter,
    reconciler: &Reconciler<S>,
) where
    S: ActuatorSink,
{
    if echo.take_echo(&message.topic, &message.payload) {
        tracing::debug!(topic = %message.topic, "Dropped echo of own publish");
        return;
    }

    match bindings.decode(&message.topic, &message.payload) {
        Some(command) => {
            let transition = reconciler.handle_command(command);
            tracing::debug!(
                topic = %message.topic,
                command = %command,
                changed = transition.changed(),
                "Remote command"
            );
        }
        None => {
            tracing::trace!(topic = %message.topic, "Ignoring message");
        }
    }
}
