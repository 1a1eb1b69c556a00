// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound publishing of reconciler notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::{EchoFilter, PublishOptions, Publisher};
use crate::command::{Channel, TopicBindings};
use crate::error::ProtocolError;
use crate::reconciler::Notification;
use crate::types::ActuatorState;

/// Counters of notifier activity.
#[derive(Debug, Default)]
pub struct PublishStats {
    published: AtomicU64,
    failed: AtomicU64,
}

impl PublishStats {
    /// Number of notifications handed to the broker.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of notifications that could not be published.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Publishes notifications on their bound topics.
///
/// Each publish is recorded in the [`EchoFilter`] before it is sent, so the
/// copy the broker delivers back is not mistaken for a remote command.
///
/// [`Notifier::run`] also keeps the last status report owed to remote
/// observers. It is published again every retry interval while publishing
/// fails, and once more whenever the transport restores a lost session,
/// since a report accepted before the outage may never have arrived. A
/// report is only owed while the LED still holds the reported state: any
/// later change either queued its own report or came from a remote command.
pub struct Notifier<P> {
    publisher: P,
    bindings: Arc<TopicBindings>,
    echo: Arc<EchoFilter>,
    options: PublishOptions,
    stats: Arc<PublishStats>,
    retry_interval: Duration,
}

impl<P> Notifier<P>
where
    P: Publisher,
{
    /// Creates a notifier publishing through `publisher`.
    #[must_use]
    pub fn new(
        publisher: P,
        bindings: Arc<TopicBindings>,
        echo: Arc<EchoFilter>,
        options: PublishOptions,
    ) -> Self {
        Self {
            publisher,
            bindings,
            echo,
            options,
            stats: Arc::new(PublishStats::default()),
            retry_interval: Duration::from_secs(1),
        }
    }

    /// Sets how often a failed status report is retried (default: 1 second).
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Returns the shared activity counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PublishStats> {
        Arc::clone(&self.stats)
    }

    /// Publishes a single notification.
    ///
    /// # Errors
    ///
    /// Returns the publisher's `ProtocolError` unchanged.
    pub async fn publish(&self, notification: Notification) -> Result<(), ProtocolError> {
        let topic = self.bindings.topic(notification.channel);
        let payload = notification.payload();

        self.echo.remember(topic, payload.as_bytes());

        match self.publisher.publish(topic, payload, self.options).await {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(topic = %topic, payload = %payload, "Published notification");
                Ok(())
            }
            Err(e) => {
                self.echo.forget(topic, payload.as_bytes());
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Drains `queue` until it closes or `shutdown` turns true.
    ///
    /// `state` follows the LED; it decides whether an owed status report
    /// still describes it. Notifications still queued at shutdown are
    /// dropped.
    pub async fn run(
        self,
        mut queue: mpsc::UnboundedReceiver<Notification>,
        state: watch::Receiver<ActuatorState>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut reconnects = self.publisher.reconnects();
        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Last status report and whether it has to be sent again.
        let mut owed: Option<ActuatorState> = None;
        let mut failing = false;

        loop {
            tokio::select! {
                biased;
                () = crate::controller::shutdown_requested(&mut shutdown) => break,
                next = queue.recv() => {
                    let Some(notification) = next else {
                        break;
                    };
                    let result = self.publish(notification).await;
                    if let Err(e) = &result {
                        tracing::warn!(
                            topic = %self.bindings.topic(notification.channel),
                            payload = %notification.payload(),
                            error = %e,
                            "Failed to publish notification"
                        );
                    }
                    if notification.channel == Channel::Status {
                        owed = Some(notification.state);
                        failing = result.is_err();
                        if failing {
                            retry.reset();
                        }
                    }
                }
                () = next_reconnect(&mut reconnects) => {
                    tracing::debug!("Transport reconnected");
                    let current = *state.borrow();
                    failing = self.republish(&mut owed, current).await;
                    retry.reset();
                }
                _ = retry.tick(), if failing => {
                    let current = *state.borrow();
                    failing = self.republish(&mut owed, current).await;
                }
            }
        }

        tracing::debug!(
            published = self.stats.published(),
            failed = self.stats.failed(),
            "Notifier stopped"
        );
    }

    /// Publishes the owed status report again if the LED still holds it.
    ///
    /// Returns `true` while the report remains undelivered.
    async fn republish(&self, owed: &mut Option<ActuatorState>, current: ActuatorState) -> bool {
        let Some(reported) = *owed else {
            return false;
        };
        if reported != current {
            *owed = None;
            return false;
        }

        match self.publish(Notification::status(reported)).await {
            Ok(()) => {
                tracing::info!(state = %reported, "Status re-reported");
                false
            }
            Err(e) => {
                tracing::debug!(state = %reported, error = %e, "Status re-report failed");
                true
            }
        }
    }
}

/// Resolves on the next restored session; never, for transports that
/// cannot report one.
async fn next_reconnect(reconnects: &mut Option<watch::Receiver<u64>>) {
    if let Some(rx) = reconnects
        && rx.changed().await.is_ok()
    {
        return;
    }
    *reconnects = None;
    std::future::pending::<()>().await;
}

impl<P> std::fmt::Debug for Notifier<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("bindings", &self.bindings)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
