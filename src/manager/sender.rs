// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publishing clients and saved messages.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{ClientMap, lookup};
use crate::error::{EntryKind, Error};
use crate::outcome::Outcome;
use crate::protocol::{BrokerClient, ConnectionOptions, Connector};
use crate::representation::SavedMessage;
use crate::types::QoS;

/// A saved message bound to the client that sends it.
#[derive(Debug, Clone)]
struct BoundMessage {
    client_id: String,
    message: SavedMessage,
}

/// Manages long-lived publishing clients and messages saved for them.
///
/// Clients are keyed by their client id, as returned by
/// [`add_client`](Self::add_client).
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "loopback")]
/// # async fn example() -> devrep::Result<()> {
/// use devrep::manager::SenderManager;
/// use devrep::protocol::{ConnectionOptions, LoopbackBroker};
///
/// let broker = LoopbackBroker::new();
/// let sender = SenderManager::new(broker.clone());
///
/// let client_id = sender.add_client(ConnectionOptions::default()).await?;
/// sender.save_message("lamp_on", &client_id, "lamp/set", "on").await?;
/// sender.send_saved("lamp_on").await?;
///
/// assert_eq!(broker.published_to("lamp/set").len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SenderManager<K: Connector> {
    connector: K,
    clients: ClientMap<K::Client>,
    messages: RwLock<HashMap<String, BoundMessage>>,
}

impl<K: Connector> SenderManager<K> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            clients: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// Publishes one message through a throwaway client.
    ///
    /// The client is opened, used at its default QoS, and closed again.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the client or publishing.
    pub async fn send_once(
        &self,
        topic: &str,
        payload: &str,
        options: &ConnectionOptions,
    ) -> crate::Result<Outcome> {
        let client = self.connector.open(options).await?;
        let result = client
            .publish(topic, payload.as_bytes(), client.default_qos(), false)
            .await;

        if let Err(e) = client.close().await {
            tracing::warn!(client_id = %client.client_id(), error = %e, "Failed to close single-use client");
        }
        Ok(result?)
    }

    /// Opens a client and keeps it for later sends. Returns its client id.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the client.
    pub async fn add_client(&self, options: ConnectionOptions) -> crate::Result<String> {
        let client = self.connector.open(&options).await?;
        let client_id = client.client_id().to_string();

        self.clients
            .write()
            .await
            .insert(client_id.clone(), Arc::new(client));
        tracing::debug!(client_id = %client_id, "Added sender client");
        Ok(client_id)
    }

    /// Publishes through a stored client at its default QoS, not retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn send(&self, client_id: &str, topic: &str, payload: &str) -> crate::Result<Outcome> {
        let client = lookup(&self.clients, EntryKind::Client, client_id).await?;
        let qos = client.default_qos();
        Ok(client.publish(topic, payload.as_bytes(), qos, false).await?)
    }

    /// Publishes through a stored client with explicit QoS and retained flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn send_with(
        &self,
        client_id: &str,
        topic: &str,
        payload: &str,
        qos: QoS,
        retained: bool,
    ) -> crate::Result<Outcome> {
        let client = lookup(&self.clients, EntryKind::Client, client_id).await?;
        Ok(client
            .publish(topic, payload.as_bytes(), qos, retained)
            .await?)
    }

    /// Saves a message under `name`, bound to a stored client.
    ///
    /// Replaces any message already saved under that name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown.
    pub async fn save_message(
        &self,
        name: &str,
        client_id: &str,
        topic: &str,
        payload: &str,
    ) -> crate::Result<()> {
        if !self.clients.read().await.contains_key(client_id) {
            return Err(Error::not_found(EntryKind::Client, client_id));
        }

        self.messages.write().await.insert(
            name.to_string(),
            BoundMessage {
                client_id: client_id.to_string(),
                message: SavedMessage::new(topic, payload),
            },
        );
        Ok(())
    }

    /// Sends a saved message at its client's default QoS, not retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the message or its client is unknown,
    /// or the transport error.
    pub async fn send_saved(&self, name: &str) -> crate::Result<Outcome> {
        let (client, message) = self.resolve(name).await?;
        let qos = client.default_qos();
        Ok(client
            .publish(&message.topic, message.payload.as_bytes(), qos, false)
            .await?)
    }

    /// Sends a saved message with explicit QoS and retained flag.
    ///
    /// # Errors
    ///
    /// Same as [`send_saved`](Self::send_saved).
    pub async fn send_saved_with(
        &self,
        name: &str,
        qos: QoS,
        retained: bool,
    ) -> crate::Result<Outcome> {
        let (client, message) = self.resolve(name).await?;
        Ok(client
            .publish(&message.topic, message.payload.as_bytes(), qos, retained)
            .await?)
    }

    async fn resolve(&self, name: &str) -> crate::Result<(Arc<K::Client>, SavedMessage)> {
        let bound = self
            .messages
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(EntryKind::Message, name))?;
        let client = lookup(&self.clients, EntryKind::Client, &bound.client_id).await?;
        Ok((client, bound.message))
    }

    /// Forgets the message saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is unknown.
    pub async fn remove_message(&self, name: &str) -> crate::Result<()> {
        self.messages
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(EntryKind::Message, name))
    }

    /// Connects a stored client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn connect_client(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = lookup(&self.clients, EntryKind::Client, client_id).await?;
        Ok(client.connect().await?)
    }

    /// Disconnects a stored client. It stays stored and can be reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn disconnect_client(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = lookup(&self.clients, EntryKind::Client, client_id).await?;
        Ok(client.disconnect().await?)
    }

    /// Closes and forgets a stored client.
    ///
    /// Messages saved for it stay saved but fail to send until a client
    /// with the same id is added again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn close_client(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = self
            .clients
            .write()
            .await
            .remove(client_id)
            .ok_or_else(|| Error::not_found(EntryKind::Client, client_id))?;
        tracing::debug!(client_id = %client_id, "Closing sender client");
        Ok(client.close().await?)
    }

    /// Returns the stored client ids, sorted.
    pub async fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.read().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the saved message names, sorted.
    pub async fn message_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.messages.read().await.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl<K: Connector + std::fmt::Debug> std::fmt::Debug for SenderManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderManager")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}
