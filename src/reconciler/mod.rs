// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The authoritative LED state machine.
//!
//! The [`Reconciler`] owns the [`ActuatorState`], the optional
//! [`PendingIntent`] and the [`ActuatorSink`]. All three sit behind one
//! lock, and every public operation is a single read-modify-write under it:
//! the button loop, the pending resolver and the inbound message handler can
//! call in concurrently without ever observing a half-applied transition.
//!
//! # Transition table
//!
//! | Current | Input | Next | Published |
//! |---|---|---|---|
//! | any | `SetOn` | ON | nothing |
//! | any | `SetOff` | OFF | nothing |
//! | any | `Pressed` (toggle mode) | toggled | status |
//! | OFF | `RequestOnPending` | OFF, intent recorded | nothing |
//! | any | `RequestOff` | OFF, intent dropped | nothing |
//! | OFF + intent | resolver tick after the confirmation delay | ON | status `on` |
//!
//! Changes caused by remote commands are never published back, so the
//! controller cannot feed its own commands to itself. Changes caused by the
//! local button always are, so remote observers stay in sync.
//!
//! # Examples
//!
//! ```
//! use ledsync::command::RemoteCommand;
//! use ledsync::reconciler::{Reconciler, ReconcilerSettings};
//! use ledsync::types::{ActuatorState, Edge};
//! # use ledsync::error::HardwareError;
//! # use ledsync::output::ActuatorSink;
//! # struct NullSink;
//! # impl ActuatorSink for NullSink {
//! #     fn apply(&mut self, _: ActuatorState) -> Result<(), HardwareError> { Ok(()) }
//! # }
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let reconciler = Reconciler::new(NullSink, ReconcilerSettings::default(), tx);
//!
//! // Remote commands change state silently.
//! let transition = reconciler.handle_command(RemoteCommand::SetOn);
//! assert!(transition.changed());
//! assert!(transition.notifications().is_empty());
//! assert!(rx.try_recv().is_err());
//!
//! // Local presses are reported.
//! let transition = reconciler.handle_edge(Edge::Pressed);
//! assert_eq!(transition.current(), ActuatorState::Off);
//! assert_eq!(rx.try_recv().unwrap().payload(), "off");
//! ```

mod pending;
mod transition;

pub use pending::PendingIntent;
pub use transition::{Cause, Notification, Transition};

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::command::RemoteCommand;
use crate::output::ActuatorSink;
use crate::types::{ActuatorState, Edge};

/// How button edges map to state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonMode {
    /// Each press flips the LED; releases are ignored.
    #[default]
    Toggle,
    /// The LED follows the button: on while held, off when released.
    Momentary,
}

/// Behavioural settings of a [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilerSettings {
    /// How button edges map to state.
    pub button_mode: ButtonMode,
    /// How long a pending request must wait before the resolver commits it.
    pub confirm_delay: Duration,
    /// Also report local changes on the button channel.
    pub mirror_button: bool,
}

struct Inner<S> {
    state: ActuatorState,
    pending: Option<PendingIntent>,
    sink: S,
}

/// Single owner of the LED state.
pub struct Reconciler<S> {
    inner: Mutex<Inner<S>>,
    settings: ReconcilerSettings,
    outbound: mpsc::UnboundedSender<Notification>,
    state_tx: watch::Sender<ActuatorState>,
}

impl<S> Reconciler<S>
where
    S: ActuatorSink,
{
    /// Creates a reconciler in the OFF state and drives the sink to OFF.
    ///
    /// Notifications are queued on `outbound`; sending never blocks.
    #[must_use]
    pub fn new(
        mut sink: S,
        settings: ReconcilerSettings,
        outbound: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let initial = ActuatorState::Off;
        if let Err(e) = sink.apply(initial) {
            tracing::warn!(error = %e, "Failed to drive initial LED state");
        }
        let (state_tx, _) = watch::channel(initial);

        Self {
            inner: Mutex::new(Inner {
                state: initial,
                pending: None,
                sink,
            }),
            settings,
            outbound,
            state_tx,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        self.inner.lock().state
    }

    /// Returns the pending intent, if one is waiting.
    #[must_use]
    pub fn pending(&self) -> Option<PendingIntent> {
        self.inner.lock().pending
    }

    /// Returns the settings this reconciler was built with.
    #[must_use]
    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ActuatorState> {
        self.state_tx.subscribe()
    }

    /// Applies a remote command received now.
    #[must_use]
    pub fn handle_command(&self, command: RemoteCommand) -> Transition {
        self.handle_command_at(command, Instant::now())
    }

    /// Applies a remote command received at `now`.
    ///
    /// Remote commands never queue a notification.
    #[must_use]
    pub fn handle_command_at(&self, command: RemoteCommand, now: Instant) -> Transition {
        let cause = Cause::Remote(command);
        let mut inner = self.inner.lock();

        match command {
            RemoteCommand::SetOn => self.commit(&mut inner, ActuatorState::On, cause),
            RemoteCommand::SetOff | RemoteCommand::RequestOff => {
                self.commit(&mut inner, ActuatorState::Off, cause)
            }
            RemoteCommand::RequestOnPending => {
                if inner.state.is_on() {
                    tracing::debug!("Already on, ignoring pending request");
                    return Transition::ignored(inner.state, cause);
                }
                if inner.pending.replace(PendingIntent::on(now)).is_some() {
                    tracing::debug!("Pending request refreshed");
                } else {
                    tracing::debug!("Pending request recorded");
                }
                Transition::ignored(inner.state, cause)
            }
        }
    }

    /// Applies a debounced button edge.
    #[must_use]
    pub fn handle_edge(&self, edge: Edge) -> Transition {
        let cause = Cause::Local(edge);
        let mut inner = self.inner.lock();

        let next = match (self.settings.button_mode, edge) {
            (ButtonMode::Toggle, Edge::Pressed) => inner.state.toggled(),
            (ButtonMode::Toggle, Edge::Released) => {
                return Transition::ignored(inner.state, cause);
            }
            (ButtonMode::Momentary, Edge::Pressed) => ActuatorState::On,
            (ButtonMode::Momentary, Edge::Released) => ActuatorState::Off,
        };

        self.commit(&mut inner, next, cause)
    }

    /// Commits the pending intent if it is due now.
    #[must_use]
    pub fn resolve_pending(&self) -> Transition {
        self.resolve_pending_at(Instant::now())
    }

    /// Commits the pending intent if it has waited the confirmation delay
    /// by `now`.
    #[must_use]
    pub fn resolve_pending_at(&self, now: Instant) -> Transition {
        let mut inner = self.inner.lock();

        match inner.pending {
            Some(intent) if intent.is_due(now, self.settings.confirm_delay) => {
                tracing::debug!(
                    age = ?intent.age(now),
                    "Confirming pending request"
                );
                self.commit(&mut inner, intent.target(), Cause::PendingConfirmed)
            }
            _ => Transition::ignored(inner.state, Cause::PendingIdle),
        }
    }

    /// Writes `next`, drops any pending intent and queues notifications.
    ///
    /// Must be called with the lock held; the sink write and the queueing
    /// happen under it so outputs and reports follow acceptance order.
    fn commit(&self, inner: &mut Inner<S>, next: ActuatorState, cause: Cause) -> Transition {
        let previous = inner.state;
        inner.state = next;

        if inner.pending.take().is_some() && cause != Cause::PendingConfirmed {
            tracing::debug!(cause = %cause, "Pending request dropped");
        }

        if let Err(e) = inner.sink.apply(next) {
            tracing::warn!(error = %e, state = %next, "Failed to drive LED");
        }

        self.state_tx.send_if_modified(|current| {
            let modified = *current != next;
            *current = next;
            modified
        });

        let mut notifications = Vec::new();
        if cause.is_local() && previous != next {
            notifications.push(Notification::status(next));
            if self.settings.mirror_button && matches!(cause, Cause::Local(_)) {
                notifications.push(Notification::button(next));
            }
        }

        for notification in &notifications {
            if self.outbound.send(*notification).is_err() {
                tracing::warn!(
                    channel = %notification.channel,
                    "Notifier stopped, state change not reported"
                );
            }
        }

        if previous == next {
            tracing::debug!(cause = %cause, state = %next, "State reaffirmed");
        } else {
            tracing::info!(cause = %cause, from = %previous, to = %next, "State changed");
        }

        Transition::new(previous, next, cause, notifications)
    }
}

impl<S> std::fmt::Debug for Reconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Reconciler")
            .field("state", &inner.state)
            .field("pending", &inner.pending)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
