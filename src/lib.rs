// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `devrep` - live representations of MQTT devices.
//!
//! A device representation subscribes to a device's topic tree, keeps the
//! latest payload of every topic, and sends named messages or structured
//! commands back to the device.
//!
//! # Supported Features
//!
//! - **Topic cache**: last value per topic, readable at any time
//! - **Side-subscriptions**: extra callbacks on their own connections, each
//!   one pausable and removable without touching the others
//! - **Saved messages**: register a topic and payload once, send by name
//! - **Homey devices**: capability-keyed cache and JSON commands on the
//!   hub's `<device>/$command` topic
//! - **Managers**: named registries of representations, senders and receivers
//!
//! # Quick Start
//!
//! ## Homey Device over MQTT
//!
//! ```no_run
//! use devrep::protocol::MqttConnector;
//! use devrep::DeviceRepresentation;
//!
//! #[tokio::main]
//! async fn main() -> devrep::Result<()> {
//!     let connector = MqttConnector::new("mqtt://192.168.1.50:1883")?;
//!     let lamp = DeviceRepresentation::homey(connector, "Living Room Lamp", "homey/livingroom-lamp")
//!         .await?;
//!
//!     lamp.register_command("on", "setOn", "onoff", "true")?;
//!     lamp.send_command("on").await?;
//!
//!     if let Some(state) = lamp.get_device_value("onoff")? {
//!         println!("lamp is {state}");
//!     }
//!
//!     lamp.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Side-Subscriptions
//!
//! ```no_run
//! use devrep::protocol::{MqttConnector, handler};
//! use devrep::DeviceRepresentation;
//!
//! #[tokio::main]
//! async fn main() -> devrep::Result<()> {
//!     let connector = MqttConnector::new("tcp://192.168.1.50:1883")?;
//!     let sensor = DeviceRepresentation::new(connector, "Door", "zigbee/door").await?;
//!
//!     sensor
//!         .add_callback("zigbee/door/contact", handler(|topic, payload, _| {
//!             println!("{topic}: {payload}");
//!         }))
//!         .await?;
//!
//!     // Pause and resume without affecting the cache
//!     sensor.disable_callback("zigbee/door/contact").await?;
//!     sensor.enable_callback("zigbee/door/contact").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Without a Broker
//!
//! With the `loopback` feature, `protocol::LoopbackBroker` runs the same code
//! against an in-process broker, for tests and simulations:
//!
//! ```
//! # #[cfg(feature = "loopback")]
//! # #[tokio::main]
//! # async fn main() -> devrep::Result<()> {
//! use devrep::protocol::LoopbackBroker;
//! use devrep::DeviceRepresentation;
//!
//! let broker = LoopbackBroker::new();
//! let sensor = DeviceRepresentation::new(broker.clone(), "Sensor", "home/sensor").await?;
//!
//! broker.inject("home/sensor/temp", "21.5");
//! assert_eq!(sensor.get_device_value("home/sensor/temp")?.as_deref(), Some("21.5"));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "loopback"))]
//! # fn main() {}
//! ```

pub mod error;
pub mod manager;
mod outcome;
pub mod protocol;
pub mod representation;
pub mod types;

pub use error::{EntryKind, Error, ParseError, ProtocolError, Result, ValueError};
pub use manager::{DeviceRepresentationManager, ReceiverManager, SenderManager};
pub use outcome::Outcome;
pub use protocol::{BrokerClient, ConnectionOptions, Connector, MessageHandler};
pub use representation::{
    DeviceRepresentation, DeviceRepresentationBuilder, HomeyCommand, RepresentationKind,
    RepresentationState, SavedMessage,
};
pub use types::QoS;
