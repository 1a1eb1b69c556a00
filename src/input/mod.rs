// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local button input.
//!
//! ```text
//!   InputPin ──▶ Button::sample() ──▶ Debouncer::sample() ──▶ Edge
//! ```
//!
//! [`Button`] turns pin reads into [`InputLevel`](crate::types::InputLevel)s
//! (holding the last level when a read fails) and [`Debouncer`] turns those
//! into press/release [`Edge`](crate::types::Edge)s.

mod button;
mod debouncer;

pub use button::Button;
pub use debouncer::Debouncer;
