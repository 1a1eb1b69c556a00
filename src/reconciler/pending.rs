// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Requests waiting for confirmation before they are committed.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::ActuatorState;

/// A recorded, not yet committed, request to change the actuator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingIntent {
    target: ActuatorState,
    created: Instant,
}

impl PendingIntent {
    /// A request to turn on, recorded at `created`.
    #[must_use]
    pub const fn on(created: Instant) -> Self {
        Self {
            target: ActuatorState::On,
            created,
        }
    }

    /// The state this intent asks for.
    #[must_use]
    pub const fn target(&self) -> ActuatorState {
        self.target
    }

    /// When the intent was recorded.
    #[must_use]
    pub const fn created(&self) -> Instant {
        self.created
    }

    /// Time elapsed since the intent was recorded.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    /// Returns `true` once the intent has waited at least `delay`.
    #[must_use]
    pub fn is_due(&self, now: Instant, delay: Duration) -> bool {
        self.age(now) >= delay
    }
}
