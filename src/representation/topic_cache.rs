// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last-value cache keyed by topic or capability.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Most recent payload per key.
///
/// Writes always overwrite; no history is kept. A key that never received a
/// message is absent, which is distinct from a key holding an empty payload.
#[derive(Debug, Default)]
pub struct TopicCache {
    values: RwLock<HashMap<String, String>>,
}

impl TopicCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `payload` under `key`, replacing any previous value.
    pub fn update(&self, key: &str, payload: &str) {
        let mut values = self.values.write();
        match values.get_mut(key) {
            Some(existing) => {
                existing.clear();
                existing.push_str(payload);
            }
            None => {
                values.insert(key.to_string(), payload.to_string());
            }
        }
    }

    /// Returns the latest payload for `key`.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Returns every key that has received a value, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
