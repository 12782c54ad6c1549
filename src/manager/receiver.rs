// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standalone subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{ClientMap, lookup};
use crate::error::{EntryKind, Error};
use crate::outcome::Outcome;
use crate::protocol::{BrokerClient, ConnectionOptions, Connector, MessageHandler};

/// Manages subscribers that each own one connection and one handler.
pub struct ReceiverManager<K: Connector> {
    connector: K,
    subscribers: ClientMap<K::Client>,
}

impl<K: Connector> ReceiverManager<K> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a client, subscribes `handler` to `topic` and stores the
    /// client. Returns its client id.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the client or subscribing. Nothing is
    /// stored on error.
    pub async fn new_subscriber(
        &self,
        topic: &str,
        options: &ConnectionOptions,
        handler: MessageHandler,
    ) -> crate::Result<String> {
        let client = self.connector.open(options).await?;
        if let Err(e) = client.subscribe(topic, handler).await {
            if let Err(close_error) = client.close().await {
                tracing::warn!(topic = %topic, error = %close_error, "Failed to close unused subscriber");
            }
            return Err(e.into());
        }

        let client_id = client.client_id().to_string();
        self.subscribers
            .write()
            .await
            .insert(client_id.clone(), Arc::new(client));
        tracing::debug!(client_id = %client_id, topic = %topic, "Added subscriber");
        Ok(client_id)
    }

    /// Reconnects a subscriber, resuming its subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn connect_subscriber(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = lookup(&self.subscribers, EntryKind::Client, client_id).await?;
        Ok(client.connect().await?)
    }

    /// Disconnects a subscriber without forgetting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn disconnect_subscriber(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = lookup(&self.subscribers, EntryKind::Client, client_id).await?;
        Ok(client.disconnect().await?)
    }

    /// Closes and forgets a subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `client_id` is unknown, or the
    /// transport error.
    pub async fn remove_subscriber(&self, client_id: &str) -> crate::Result<Outcome> {
        let client = self
            .subscribers
            .write()
            .await
            .remove(client_id)
            .ok_or_else(|| Error::not_found(EntryKind::Client, client_id))?;
        Ok(client.close().await?)
    }

    /// Closes and forgets every subscriber.
    ///
    /// # Errors
    ///
    /// Returns the first close error. Every subscriber is closed regardless.
    pub async fn remove_all_subscribers(&self) -> crate::Result<()> {
        let drained: Vec<_> = self.subscribers.write().await.drain().collect();

        let mut first_error = None;
        for (client_id, client) in drained {
            if let Err(e) = client.close().await {
                tracing::warn!(client_id = %client_id, error = %e, "Failed to close subscriber");
                first_error.get_or_insert(Error::from(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Returns the subscriber client ids, sorted.
    pub async fn subscriber_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscribers.read().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

impl<K: Connector + std::fmt::Debug> std::fmt::Debug for ReceiverManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverManager")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}
