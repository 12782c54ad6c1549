// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live representations of remote devices.
//!
//! A [`DeviceRepresentation`] subscribes to a device's topic tree and keeps
//! the latest payload of every topic it sees. On top of that cache it offers
//! named outgoing messages, side-subscriptions that each run on their own
//! connection, and for Homey devices a structured command channel.
//!
//! ```text
//!                 ┌──────────────────────── DeviceRepresentation ─┐
//!  broker ──root/#──▶ primary connection ──▶ TopicCache          │
//!                 │         ▲                                     │
//!                 │         └── send_message / send_command       │
//!  broker ──filter──▶ side connection ──▶ user callback           │
//!                 └───────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```
//! # #[cfg(feature = "loopback")]
//! # async fn example() -> devrep::Result<()> {
//! use devrep::protocol::LoopbackBroker;
//! use devrep::representation::DeviceRepresentation;
//!
//! let broker = LoopbackBroker::new();
//! let lamp = DeviceRepresentation::homey(broker.clone(), "Lamp", "homey/lamp").await?;
//!
//! broker.inject("homey/lamp/onoff", "true");
//! assert_eq!(lamp.get_device_value("onoff")?.as_deref(), Some("true"));
//! assert_eq!(lamp.get_device_value("homey/lamp/onoff")?.as_deref(), Some("true"));
//!
//! lamp.register_command("off", "setOn", "onoff", "false")?;
//! lamp.send_command("off").await?;
//! lamp.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod homey;
mod message_registry;
mod side_subscriptions;
mod topic_cache;

pub use homey::HomeyCommand;
pub use message_registry::{MessageRegistry, SavedMessage};
pub use side_subscriptions::SideSubscriptions;
pub use topic_cache::TopicCache;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{EntryKind, Error};
use crate::outcome::Outcome;
use crate::protocol::{BrokerClient, ConnectionOptions, Connector, MessageHandler, handler};
use crate::types::{QoS, topic};

use homey::HomeyChannel;

/// Which message-shaping policy a representation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RepresentationKind {
    /// Caches payloads by full topic. No command channel.
    #[default]
    Generic,
    /// Also caches payloads by capability and sends structured commands
    /// through the Homey command topic.
    Homey,
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            Self::Homey => f.write_str("homey"),
        }
    }
}

/// Lifecycle of a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationState {
    /// The root subscription is not installed yet. Sends still work, but
    /// the cache stays empty until [`DeviceRepresentation::retry_subscription`]
    /// succeeds.
    Constructing,
    /// The root subscription is installed.
    Active,
    /// The representation was closed. Terminal.
    Closed,
}

enum Variant {
    Generic,
    Homey(HomeyChannel),
}

impl Variant {
    fn kind(&self) -> RepresentationKind {
        match self {
            Self::Generic => RepresentationKind::Generic,
            Self::Homey(_) => RepresentationKind::Homey,
        }
    }
}

/// A live, cached view of one device's topic tree.
///
/// All methods take `&self`; wrap the representation in an `Arc` to share
/// it between tasks. Inbound messages update the cache from the broker
/// client's delivery task while callers read it.
pub struct DeviceRepresentation<K: Connector> {
    name: String,
    root_topic: String,
    connector: K,
    options: ConnectionOptions,
    client: K::Client,
    cache: Arc<TopicCache>,
    callbacks: SideSubscriptions<K::Client>,
    messages: MessageRegistry,
    variant: Variant,
    state: Mutex<RepresentationState>,
    /// Number of root handlers already subscribed. Held for a whole install.
    installed_handlers: tokio::sync::Mutex<usize>,
}

impl<K: Connector> DeviceRepresentation<K> {
    /// Starts building a representation of the device at `root_topic`.
    pub fn builder(
        connector: K,
        name: impl Into<String>,
        root_topic: impl Into<String>,
    ) -> DeviceRepresentationBuilder<K> {
        DeviceRepresentationBuilder {
            connector,
            name: name.into(),
            root_topic: root_topic.into(),
            options: ConnectionOptions::default(),
            kind: RepresentationKind::Generic,
        }
    }

    /// Creates a generic representation with default connection options.
    ///
    /// # Errors
    ///
    /// See [`DeviceRepresentationBuilder::build`].
    pub async fn new(
        connector: K,
        name: impl Into<String>,
        root_topic: impl Into<String>,
    ) -> crate::Result<Self> {
        Self::builder(connector, name, root_topic).build().await
    }

    /// Creates a Homey representation with default connection options.
    ///
    /// # Errors
    ///
    /// See [`DeviceRepresentationBuilder::build`].
    pub async fn homey(
        connector: K,
        name: impl Into<String>,
        root_topic: impl Into<String>,
    ) -> crate::Result<Self> {
        Self::builder(connector, name, root_topic)
            .homey()
            .build()
            .await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the representation's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the normalized root topic.
    #[must_use]
    pub fn root_topic(&self) -> &str {
        &self.root_topic
    }

    /// Returns the representation kind.
    #[must_use]
    pub fn kind(&self) -> RepresentationKind {
        self.variant.kind()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> RepresentationState {
        *self.state.lock()
    }

    /// Returns the client id of the primary connection.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    /// Returns whether the primary connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Returns the Homey command topic, or `None` for generic representations.
    #[must_use]
    pub fn command_topic(&self) -> Option<&str> {
        match &self.variant {
            Variant::Homey(channel) => Some(channel.command_topic()),
            Variant::Generic => None,
        }
    }

    /// Returns every cache key that has received a value, sorted.
    #[must_use]
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    fn ensure_open(&self) -> crate::Result<()> {
        if self.state() == RepresentationState::Closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn homey_channel(&self) -> crate::Result<&HomeyChannel> {
        match &self.variant {
            Variant::Homey(channel) => Ok(channel),
            Variant::Generic => Err(Error::CommandsNotSupported),
        }
    }

    // =========================================================================
    // Root subscription
    // =========================================================================

    /// Handlers installed on `<root>/#`, in installation order.
    fn root_handlers(&self) -> Vec<MessageHandler> {
        let cache = Arc::clone(&self.cache);
        let full_topic = handler(move |topic, payload, _| {
            tracing::debug!(topic = %topic, "Cached device value");
            cache.update(topic, payload);
        });

        match &self.variant {
            Variant::Generic => vec![full_topic],
            Variant::Homey(_) => {
                let cache = Arc::clone(&self.cache);
                let root = self.root_topic.clone();
                let by_capability = handler(move |topic, payload, _| {
                    cache.update(&homey::capability(&root, topic), payload);
                });
                vec![full_topic, by_capability]
            }
        }
    }

    /// Installs the root handlers that are still missing.
    ///
    /// Installs never overlap; one that waited for another to finish
    /// returns [`Outcome::AlreadyConnected`].
    async fn install_subscriptions(&self) -> crate::Result<Outcome> {
        let mut installed = self.installed_handlers.lock().await;
        match self.state() {
            RepresentationState::Closed => return Err(Error::Closed),
            RepresentationState::Active => return Ok(Outcome::AlreadyConnected),
            RepresentationState::Constructing => {}
        }

        let filter = topic::wildcard(&self.root_topic);
        let handlers = self.root_handlers();
        while let Some(next) = handlers.get(*installed) {
            self.client
                .subscribe(&filter, MessageHandler::clone(next))
                .await?;
            *installed += 1;
        }

        let mut state = self.state.lock();
        if *state == RepresentationState::Constructing {
            *state = RepresentationState::Active;
        }
        Ok(Outcome::Done)
    }

    /// Retries the root subscription after a failure during construction.
    ///
    /// Returns [`Outcome::AlreadyConnected`] if the representation is
    /// already active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close), or the
    /// transport error if subscribing fails again.
    pub async fn retry_subscription(&self) -> crate::Result<Outcome> {
        match self.state() {
            RepresentationState::Closed => Err(Error::Closed),
            RepresentationState::Active => Ok(Outcome::AlreadyConnected),
            RepresentationState::Constructing => {
                let outcome = self.install_subscriptions().await?;
                if outcome == Outcome::Done {
                    tracing::info!(name = %self.name, "Root subscription installed");
                }
                Ok(outcome)
            }
        }
    }

    /// Returns the latest payload seen for `key`.
    ///
    /// `key` is a full topic, or for Homey representations also a
    /// capability name. `None` means nothing was received for it yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close).
    pub fn get_device_value(&self, key: &str) -> crate::Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.cache.read(key))
    }

    // =========================================================================
    // Saved messages
    // =========================================================================

    /// Saves a message under `name` for later sends. Replaces any message
    /// already saved under that name. Nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close).
    pub fn register_message(
        &self,
        name: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> crate::Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let message = SavedMessage::new(topic, payload);
        tracing::debug!(name = %name, topic = %message.topic, "Registered message");
        self.messages.register(name, message);
        Ok(())
    }

    /// Returns the message saved under `name`.
    #[must_use]
    pub fn message(&self, name: &str) -> Option<SavedMessage> {
        self.messages.get(name)
    }

    /// Returns the saved message names, sorted.
    #[must_use]
    pub fn message_names(&self) -> Vec<String> {
        self.messages.names()
    }

    /// Sends a saved message at the connection's default QoS, not retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no message is saved under `name`,
    /// [`Error::Closed`] after [`close`](Self::close), or the transport error.
    pub async fn send_message(&self, name: &str) -> crate::Result<Outcome> {
        self.send_message_with(name, self.client.default_qos(), false)
            .await
    }

    /// Sends a saved message with explicit QoS and retained flag.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub async fn send_message_with(
        &self,
        name: &str,
        qos: QoS,
        retained: bool,
    ) -> crate::Result<Outcome> {
        self.ensure_open()?;
        let message = self
            .messages
            .get(name)
            .ok_or_else(|| Error::not_found(EntryKind::Message, name))?;

        let outcome = self
            .client
            .publish(&message.topic, message.payload.as_bytes(), qos, retained)
            .await?;
        tracing::debug!(name = %name, topic = %message.topic, qos = %qos, retained, "Sent message");
        Ok(outcome)
    }

    // =========================================================================
    // Side-subscriptions
    // =========================================================================

    /// Subscribes `callback` to `topic` on a new dedicated connection.
    ///
    /// If `topic` already has a callback, its connection is closed and
    /// replaced once the new subscription is in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the representation is closed before the
    /// callback is stored, in which case the new connection is released. Also
    /// returns the error from opening or subscribing the new connection. The
    /// previous callback, if any, stays in place on error.
    pub async fn add_callback(
        &self,
        topic: &str,
        callback: MessageHandler,
    ) -> crate::Result<Outcome> {
        self.ensure_open()?;

        let client = self.connector.open(&self.options).await?;
        if let Err(e) = client.subscribe(topic, callback).await {
            if let Err(close_error) = client.close().await {
                tracing::warn!(topic = %topic, error = %close_error, "Failed to close unused connection");
            }
            return Err(e.into());
        }

        // close() may have run while opening; it drains under the same lock
        let inserted = {
            let state = self.state.lock();
            if *state == RepresentationState::Closed {
                Err(client)
            } else {
                let client_id = client.client_id().to_string();
                Ok((client_id, self.callbacks.insert(topic, client)))
            }
        };

        match inserted {
            Err(client) => {
                if let Err(e) = client.close().await {
                    tracing::warn!(topic = %topic, error = %e, "Failed to close unused connection");
                }
                Err(Error::Closed)
            }
            Ok((client_id, previous)) => {
                tracing::debug!(name = %self.name, topic = %topic, client_id = %client_id, "Added callback");
                if let Some(previous) = previous
                    && let Err(e) = previous.close().await
                {
                    tracing::warn!(topic = %topic, error = %e, "Failed to close replaced callback connection");
                }
                Ok(Outcome::Done)
            }
        }
    }

    /// Pauses the callback for `topic` by disconnecting its connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `topic` has no callback,
    /// [`Error::Closed`] after [`close`](Self::close), or the transport error.
    pub async fn disable_callback(&self, topic: &str) -> crate::Result<Outcome> {
        self.ensure_open()?;
        let client = self.callback_client(topic)?;
        let outcome = client.disconnect().await?;
        tracing::debug!(topic = %topic, outcome = %outcome, "Disabled callback");
        Ok(outcome)
    }

    /// Resumes a paused callback by reconnecting its connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `topic` has no callback,
    /// [`Error::Closed`] after [`close`](Self::close), or the transport error.
    pub async fn enable_callback(&self, topic: &str) -> crate::Result<Outcome> {
        self.ensure_open()?;
        let client = self.callback_client(topic)?;
        let outcome = client.connect().await?;
        tracing::debug!(topic = %topic, outcome = %outcome, "Enabled callback");
        Ok(outcome)
    }

    /// Closes and forgets the callback for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `topic` has no callback,
    /// [`Error::Closed`] after [`close`](Self::close), or the transport error.
    pub async fn remove_callback(&self, topic: &str) -> crate::Result<Outcome> {
        self.ensure_open()?;
        let client = self
            .callbacks
            .remove(topic)
            .ok_or_else(|| Error::not_found(EntryKind::Callback, topic))?;
        let outcome = client.close().await?;
        tracing::debug!(topic = %topic, "Removed callback");
        Ok(outcome)
    }

    fn callback_client(&self, topic: &str) -> crate::Result<Arc<K::Client>> {
        self.callbacks
            .get(topic)
            .ok_or_else(|| Error::not_found(EntryKind::Callback, topic))
    }

    /// Returns the topics that have a callback, sorted.
    #[must_use]
    pub fn callback_topics(&self) -> Vec<String> {
        self.callbacks.topics()
    }

    /// Returns whether the callback for `topic` is connected, or `None` if
    /// `topic` has no callback.
    #[must_use]
    pub fn is_callback_enabled(&self, topic: &str) -> Option<bool> {
        self.callbacks.get(topic).map(|client| client.is_connected())
    }

    // =========================================================================
    // Homey commands
    // =========================================================================

    /// Saves a structured command under `id`. Replaces any command already
    /// saved under that id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandsNotSupported`] for generic representations
    /// and [`Error::Closed`] after [`close`](Self::close).
    pub fn register_command(
        &self,
        id: impl Into<String>,
        command: impl Into<String>,
        capability: impl Into<String>,
        value: impl Into<String>,
    ) -> crate::Result<()> {
        self.ensure_open()?;
        let channel = self.homey_channel()?;
        let payload = HomeyCommand::new(command, self.name.as_str(), capability, value)
            .to_payload()?;
        channel.save(id, payload);
        Ok(())
    }

    /// Returns the saved command ids, sorted. Empty for generic representations.
    #[must_use]
    pub fn command_ids(&self) -> Vec<String> {
        match &self.variant {
            Variant::Homey(channel) => channel.ids(),
            Variant::Generic => Vec::new(),
        }
    }

    /// Publishes the command saved under `id` to the command topic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandsNotSupported`] for generic representations,
    /// [`Error::NotFound`] if no command is saved under `id`,
    /// [`Error::Closed`] after [`close`](Self::close), or the transport error.
    pub async fn send_command(&self, id: &str) -> crate::Result<Outcome> {
        self.ensure_open()?;
        let channel = self.homey_channel()?;
        let payload = channel
            .payload(id)
            .ok_or_else(|| Error::not_found(EntryKind::Command, id))?;

        let outcome = self
            .client
            .publish(
                channel.command_topic(),
                payload.as_bytes(),
                self.client.default_qos(),
                false,
            )
            .await?;
        tracing::debug!(id = %id, topic = %channel.command_topic(), "Sent command");
        Ok(outcome)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Closes every side-subscription and then the primary connection.
    ///
    /// Closing twice is not an error; the second call returns
    /// [`Outcome::AlreadyClosed`]. Every other operation fails with
    /// [`Error::Closed`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the primary connection fails to close.
    /// Side-subscription close failures are logged.
    pub async fn close(&self) -> crate::Result<Outcome> {
        let callbacks = {
            let mut state = self.state.lock();
            if *state == RepresentationState::Closed {
                return Ok(Outcome::AlreadyClosed);
            }
            *state = RepresentationState::Closed;
            self.callbacks.drain()
        };

        for (topic, client) in callbacks {
            if let Err(e) = client.close().await {
                tracing::warn!(topic = %topic, error = %e, "Failed to close callback connection");
            }
        }

        self.client.close().await?;
        tracing::info!(name = %self.name, root_topic = %self.root_topic, "Closed device representation");
        Ok(Outcome::Done)
    }
}

impl<K: Connector> fmt::Debug for DeviceRepresentation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRepresentation")
            .field("name", &self.name)
            .field("root_topic", &self.root_topic)
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("cached", &self.cache.len())
            .field("callbacks", &self.callbacks.topics())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DeviceRepresentation`].
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "loopback")]
/// # async fn example() -> devrep::Result<()> {
/// use devrep::protocol::{ConnectionOptions, LoopbackBroker};
/// use devrep::representation::{DeviceRepresentation, RepresentationKind};
///
/// let lamp = DeviceRepresentation::builder(LoopbackBroker::new(), "Lamp", "homey/lamp/#")
///     .options(ConnectionOptions::unstable_network())
///     .kind(RepresentationKind::Homey)
///     .build()
///     .await?;
///
/// assert_eq!(lamp.root_topic(), "homey/lamp");
/// assert_eq!(lamp.command_topic(), Some("lamp/$command"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceRepresentationBuilder<K> {
    connector: K,
    name: String,
    root_topic: String,
    options: ConnectionOptions,
    kind: RepresentationKind,
}

impl<K: Connector> DeviceRepresentationBuilder<K> {
    /// Sets the options for the primary connection and every side-subscription.
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the representation kind.
    #[must_use]
    pub fn kind(mut self, kind: RepresentationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for `kind(RepresentationKind::Homey)`.
    #[must_use]
    pub fn homey(self) -> Self {
        self.kind(RepresentationKind::Homey)
    }

    /// Opens the primary connection and installs the root subscription.
    ///
    /// A failing root subscription does not fail the build. The
    /// representation is returned in [`RepresentationState::Constructing`]
    /// and [`DeviceRepresentation::retry_subscription`] can be used later.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`] if the root topic is empty, contains
    /// wildcards, or (for Homey) has fewer than two levels, and any error
    /// from opening the primary connection.
    pub async fn build(self) -> crate::Result<DeviceRepresentation<K>> {
        let root_topic = topic::normalize_root(&self.root_topic)?;
        let variant = match self.kind {
            RepresentationKind::Generic => Variant::Generic,
            RepresentationKind::Homey => {
                Variant::Homey(HomeyChannel::new(homey::command_topic(&root_topic)?))
            }
        };
        let client = self.connector.open(&self.options).await?;

        let representation = DeviceRepresentation {
            name: self.name,
            root_topic,
            connector: self.connector,
            options: self.options,
            client,
            cache: Arc::new(TopicCache::new()),
            callbacks: SideSubscriptions::new(),
            messages: MessageRegistry::new(),
            variant,
            state: Mutex::new(RepresentationState::Constructing),
            installed_handlers: tokio::sync::Mutex::new(0),
        };

        match representation.install_subscriptions().await {
            Ok(_) => tracing::info!(
                name = %representation.name,
                root_topic = %representation.root_topic,
                kind = %representation.kind(),
                "Created device representation"
            ),
            Err(e) => tracing::warn!(
                name = %representation.name,
                root_topic = %representation.root_topic,
                error = %e,
                "Root subscription failed, cache will stay empty until retried"
            ),
        }

        Ok(representation)
    }
}
