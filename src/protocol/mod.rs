// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker client seam.
//!
//! Representations never talk to a broker directly. They open connections
//! through a [`Connector`] and drive them through the [`BrokerClient`] trait.
//!
//! # Implementations
//!
//! - [`MqttConnector`] / [`MqttClient`]: real MQTT connections built on `rumqttc`
//! - `LoopbackBroker` / `LoopbackClient`: an in-process broker for tests
//!   and broker-free simulations (`loopback` feature)
//!
//! Every connection is exclusively owned by whoever opened it. Lifecycle
//! calls are idempotent: repeating `connect`, `disconnect` or `close`
//! succeeds with a qualified [`Outcome`].

mod handlers;
#[cfg(any(test, feature = "loopback"))]
mod loopback;
#[cfg(feature = "mqtt")]
mod mqtt;
mod options;

pub use handlers::HandlerTable;
#[cfg(any(test, feature = "loopback"))]
pub use loopback::{LoopbackBroker, LoopbackClient, PublishedMessage};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttClient, MqttConnector};
pub use options::{ConnectionOptions, Credentials, LastWill};

use std::sync::Arc;

use crate::error::ProtocolError;
use crate::outcome::Outcome;
use crate::types::QoS;

/// Callback invoked for every inbound message on a subscribed filter.
///
/// Receives the concrete topic, the payload decoded as UTF-8 and the
/// message id assigned by the broker (0 for QoS 0 deliveries).
pub type MessageHandler = Arc<dyn Fn(&str, &str, u16) + Send + Sync>;

/// Wraps a closure as a [`MessageHandler`].
pub fn handler<F>(f: F) -> MessageHandler
where
    F: Fn(&str, &str, u16) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A single connection to a broker.
///
/// Handlers are invoked on the client's own delivery task, concurrently
/// with the caller. They must not block.
#[allow(async_fn_in_trait)]
pub trait BrokerClient: Send + Sync {
    /// Returns the client id presented to the broker. Unique per connection.
    fn client_id(&self) -> &str;

    /// Returns whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Returns the quality of service used when a send does not override it.
    fn default_qos(&self) -> QoS;

    /// Connects to the broker and replays stored subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the broker cannot be reached or the client
    /// was closed.
    async fn connect(&self) -> Result<Outcome, ProtocolError>;

    /// Disconnects from the broker. Stored subscriptions are kept so a later
    /// [`connect`](Self::connect) resumes them.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the disconnect request cannot be sent.
    async fn disconnect(&self) -> Result<Outcome, ProtocolError>;

    /// Disconnects and releases the client permanently.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the disconnect request cannot be sent.
    async fn close(&self) -> Result<Outcome, ProtocolError>;

    /// Publishes a payload, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the client is closed, cannot connect, or
    /// the publish is rejected.
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retained: bool,
    ) -> Result<Outcome, ProtocolError>;

    /// Subscribes `handler` to `filter`, connecting first if needed.
    ///
    /// The handler is only stored when the subscription succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the client is closed, cannot connect, or
    /// the subscription is rejected.
    async fn subscribe(&self, filter: &str, handler: MessageHandler)
    -> Result<Outcome, ProtocolError>;
}

/// Opens new broker connections.
///
/// A connector is chosen once and cloned into everything that needs to
/// open connections, so every connection of a representation goes to the
/// same broker.
#[allow(async_fn_in_trait)]
pub trait Connector: Clone + Send + Sync + 'static {
    /// The client type this connector produces.
    type Client: BrokerClient + 'static;

    /// Creates a new, not yet connected client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`](crate::Error::Value) if the options are
    /// invalid and [`Error::Protocol`](crate::Error::Protocol) if the broker
    /// address is invalid.
    async fn open(&self, options: &ConnectionOptions) -> crate::Result<Self::Client>;
}
