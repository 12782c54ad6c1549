// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dedicated connections hosting one callback each.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Topic filter to connection table.
///
/// Each entry owns its own connection, so pausing or dropping one callback
/// never touches the others. Connections are handed out as `Arc` clones so
/// callers can await on them without holding the table lock.
#[derive(Debug)]
pub struct SideSubscriptions<C> {
    entries: RwLock<HashMap<String, Arc<C>>>,
}

impl<C> Default for SideSubscriptions<C> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<C> SideSubscriptions<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `client` under `topic`, returning the connection it replaced.
    pub fn insert(&self, topic: impl Into<String>, client: C) -> Option<Arc<C>> {
        self.entries.write().insert(topic.into(), Arc::new(client))
    }

    /// Returns the connection stored under `topic`.
    #[must_use]
    pub fn get(&self, topic: &str) -> Option<Arc<C>> {
        self.entries.read().get(topic).map(Arc::clone)
    }

    /// Removes the entry for `topic`.
    pub fn remove(&self, topic: &str) -> Option<Arc<C>> {
        self.entries.write().remove(topic)
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(String, Arc<C>)> {
        self.entries.write().drain().collect()
    }

    /// Returns the stored topics, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.read().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Returns `true` if `topic` has an entry.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.read().contains_key(topic)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
