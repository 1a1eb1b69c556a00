// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by every stage of the controller.
//!
//! # Types
//!
//! - [`ActuatorState`] - The authoritative ON/OFF state of the LED
//! - [`InputLevel`] - A raw, possibly bouncing, button line level
//! - [`Edge`] - A debounced press or release

mod level;
mod state;

pub use level::{Edge, InputLevel};
pub use state::ActuatorState;
