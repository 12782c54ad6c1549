// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of device representations.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{EntryKind, Error};
use crate::outcome::Outcome;
use crate::protocol::{ConnectionOptions, Connector};
use crate::representation::{DeviceRepresentation, RepresentationKind};

/// Holds device representations by name, all connected through one connector.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "loopback")]
/// # async fn example() -> devrep::Result<()> {
/// use devrep::manager::DeviceRepresentationManager;
/// use devrep::protocol::{ConnectionOptions, LoopbackBroker};
///
/// let broker = LoopbackBroker::new();
/// let manager = DeviceRepresentationManager::new(broker.clone());
///
/// manager
///     .add_homey_device_representation("Lamp", ConnectionOptions::default(), "homey/lamp")
///     .await?;
///
/// broker.inject("homey/lamp/onoff", "true");
/// let lamp = manager.get("Lamp").await.unwrap();
/// assert_eq!(lamp.get_device_value("onoff")?.as_deref(), Some("true"));
///
/// manager.remove_all().await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceRepresentationManager<K: Connector> {
    connector: K,
    devices: RwLock<HashMap<String, Arc<DeviceRepresentation<K>>>>,
}

impl<K: Connector> DeviceRepresentationManager<K> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Creates and stores a generic representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if `name` is taken, or any error from
    /// building the representation.
    pub async fn add_device_representation(
        &self,
        name: &str,
        options: ConnectionOptions,
        root_topic: &str,
    ) -> crate::Result<Arc<DeviceRepresentation<K>>> {
        self.add(name, options, root_topic, RepresentationKind::Generic)
            .await
    }

    /// Creates and stores a Homey representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if `name` is taken, or any error from
    /// building the representation.
    pub async fn add_homey_device_representation(
        &self,
        name: &str,
        options: ConnectionOptions,
        root_topic: &str,
    ) -> crate::Result<Arc<DeviceRepresentation<K>>> {
        self.add(name, options, root_topic, RepresentationKind::Homey)
            .await
    }

    async fn add(
        &self,
        name: &str,
        options: ConnectionOptions,
        root_topic: &str,
        kind: RepresentationKind,
    ) -> crate::Result<Arc<DeviceRepresentation<K>>> {
        if self.devices.read().await.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let representation = Arc::new(
            DeviceRepresentation::builder(self.connector.clone(), name, root_topic)
                .options(options)
                .kind(kind)
                .build()
                .await?,
        );

        // Another task may have taken the name while we were building
        let raced = {
            let mut devices = self.devices.write().await;
            if devices.contains_key(name) {
                true
            } else {
                devices.insert(name.to_string(), Arc::clone(&representation));
                false
            }
        };
        if raced {
            if let Err(e) = representation.close().await {
                tracing::warn!(name = %name, error = %e, "Failed to close duplicate representation");
            }
            return Err(Error::DuplicateName(name.to_string()));
        }

        tracing::debug!(name = %name, kind = %kind, "Added device representation");
        Ok(representation)
    }

    /// Returns the representation stored under `name`.
    pub async fn get(&self, name: &str) -> Option<Arc<DeviceRepresentation<K>>> {
        self.devices.read().await.get(name).map(Arc::clone)
    }

    /// Closes and forgets the representation stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is unknown, or the error from
    /// closing the representation.
    pub async fn remove(&self, name: &str) -> crate::Result<Outcome> {
        let representation = self
            .devices
            .write()
            .await
            .remove(name)
            .ok_or_else(|| Error::not_found(EntryKind::Device, name))?;

        tracing::debug!(name = %name, "Removed device representation");
        representation.close().await
    }

    /// Closes and forgets every representation.
    ///
    /// Every representation is closed even if some fail.
    ///
    /// # Errors
    ///
    /// Returns the first close error.
    pub async fn remove_all(&self) -> crate::Result<()> {
        let drained: Vec<_> = self.devices.write().await.drain().collect();

        let mut first_error = None;
        for (name, representation) in drained {
            if let Err(e) = representation.close().await {
                tracing::warn!(name = %name, error = %e, "Failed to close device representation");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Returns the stored names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.read().await.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of stored representations.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns `true` if no representation is stored.
    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

impl<K: Connector + std::fmt::Debug> std::fmt::Debug for DeviceRepresentationManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRepresentationManager")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}
