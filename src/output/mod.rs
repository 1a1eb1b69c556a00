// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Actuator output.
//!
//! The [`Reconciler`](crate::Reconciler) is the only caller of
//! [`ActuatorSink::apply`], and it calls it while holding its state lock, so
//! the physical output never lags the accepted state by more than one write.

mod led;

pub use led::{Led, LedPolarity};

use crate::error::HardwareError;
use crate::types::ActuatorState;

/// Write-side port for the physical actuator.
pub trait ActuatorSink: Send {
    /// Drives the output to `state`.
    ///
    /// Must be idempotent: applying the same state twice leaves the output
    /// exactly as applying it once.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Write`] if the line cannot be driven.
    fn apply(&mut self, state: ActuatorState) -> Result<(), HardwareError>;
}

impl<S> ActuatorSink for Box<S>
where
    S: ActuatorSink + ?Sized,
{
    fn apply(&mut self, state: ActuatorState) -> Result<(), HardwareError> {
        (**self).apply(state)
    }
}
