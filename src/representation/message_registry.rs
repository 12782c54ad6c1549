// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named outgoing messages.

use std::collections::HashMap;

use parking_lot::RwLock;

/// A topic and payload saved under a name for later sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMessage {
    /// Destination topic.
    pub topic: String,
    /// Payload sent verbatim.
    pub payload: String,
}

impl SavedMessage {
    /// Creates a saved message.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Name to message table. Re-registering a name replaces its message.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    messages: RwLock<HashMap<String, SavedMessage>>,
}

impl MessageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `message` under `name`, returning the message it replaced.
    pub fn register(&self, name: impl Into<String>, message: SavedMessage) -> Option<SavedMessage> {
        self.messages.write().insert(name.into(), message)
    }

    /// Returns the message saved under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SavedMessage> {
        self.messages.read().get(name).cloned()
    }

    /// Removes and returns the message saved under `name`.
    pub fn remove(&self, name: &str) -> Option<SavedMessage> {
        self.messages.write().remove(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.messages.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of saved messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Returns `true` if nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}
