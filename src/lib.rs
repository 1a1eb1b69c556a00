// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ledsync` - One LED, two masters.
//!
//! This library keeps a single LED consistent between a local push button
//! and remote MQTT commands. Both sources feed one [`Reconciler`], which is
//! the only owner of the LED state and the only writer of the output pin.
//!
//! # Behaviour
//!
//! - **Button**: debounced, each press toggles the LED (or, in momentary
//!   mode, the LED follows the button). Every local change is published on
//!   the status topic.
//! - **`<device>/status`**: `on` / `off` set the LED directly. These changes
//!   are never published back.
//! - **`<device>/button`**: `led_on` records a pending request that the
//!   resolver confirms after a configurable delay; `led_off` turns the LED
//!   off and drops any pending request.
//!
//! Publishes made by the controller are remembered for a short window, so
//! when the broker delivers them back they are dropped instead of being
//! decoded as commands.
//!
//! # Quick Start
//!
//! ```no_run
//! use ledsync::{Controller, ControllerConfig};
//! use ledsync::input::Button;
//! use ledsync::output::LedPolarity;
//! use ledsync::protocol::MqttLink;
//! # use std::convert::Infallible;
//! # use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
//! # struct Gpio;
//! # impl ErrorType for Gpio { type Error = Infallible; }
//! # impl InputPin for Gpio {
//! #     fn is_high(&mut self) -> Result<bool, Infallible> { Ok(true) }
//! #     fn is_low(&mut self) -> Result<bool, Infallible> { Ok(false) }
//! # }
//! # impl OutputPin for Gpio {
//! #     fn set_low(&mut self) -> Result<(), Infallible> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Infallible> { Ok(()) }
//! # }
//! # fn gpio(_: u8) -> Gpio { Gpio }
//!
//! #[tokio::main]
//! async fn main() -> ledsync::Result<()> {
//!     let config = ControllerConfig::new("esp32")
//!         .with_led_polarity(LedPolarity::ActiveLow);
//!
//!     let controller = Controller::connect_mqtt(
//!         &config,
//!         MqttLink::builder().url("mqtt://192.168.1.50:1883"),
//!         Button::new(gpio(13)),
//!         config.led(gpio(2)),
//!     )
//!     .await?;
//!
//!     let mut state = controller.subscribe();
//!     while state.changed().await.is_ok() {
//!         println!("LED {}", *state.borrow_and_update());
//!     }
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Without a broker
//!
//! [`Controller::spawn`] accepts any [`Publisher`](protocol::Publisher) and
//! a channel of [`InboundMessage`](protocol::InboundMessage)s, which is how
//! the integration tests drive it.

pub mod command;
mod config;
mod controller;
pub mod error;
pub mod input;
pub mod output;
pub mod protocol;
pub mod reconciler;
pub mod types;

pub use command::{Channel, RemoteCommand, TopicBindings};
pub use config::ControllerConfig;
pub use controller::Controller;
pub use error::{ConfigError, Error, HardwareError, ProtocolError, Result};
pub use input::{Button, Debouncer};
pub use output::{ActuatorSink, Led, LedPolarity};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttLink, MqttLinkBuilder};
pub use protocol::{Publisher, Qos};
pub use reconciler::{ButtonMode, Reconciler, ReconcilerSettings, Transition};
pub use types::{ActuatorState, Edge, InputLevel};
