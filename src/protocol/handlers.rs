// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filter-to-handler table shared by broker client implementations.
//!
//! ```text
//! Inbound publish: homey/lamp/onoff → true
//!                     ↓
//!           HandlerTable.dispatch()
//!                     ↓
//!   every (filter, handler) whose filter matches
//!                     ↓
//!        handler("homey/lamp/onoff", "true", id)
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::MessageHandler;
use crate::types::topic;

/// Stored subscriptions of one connection.
///
/// Several handlers may share the same filter; each of them is invoked for
/// a matching message, in registration order.
#[derive(Default)]
pub struct HandlerTable {
    entries: RwLock<Vec<(String, MessageHandler)>>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a handler for `filter`.
    pub fn insert(&self, filter: impl Into<String>, handler: MessageHandler) {
        self.entries.write().push((filter.into(), handler));
    }

    /// Removes one stored `handler` for `filter`. Returns whether it was present.
    pub fn remove(&self, filter: &str, handler: &MessageHandler) -> bool {
        let mut entries = self.entries.write();
        let position = entries
            .iter()
            .position(|(f, h)| f == filter && Arc::ptr_eq(h, handler));
        position.map(|i| entries.remove(i)).is_some()
    }

    /// Returns the distinct filters, in first-registration order.
    #[must_use]
    pub fn filters(&self) -> Vec<String> {
        let mut filters: Vec<String> = Vec::new();
        for (filter, _) in self.entries.read().iter() {
            if !filters.contains(filter) {
                filters.push(filter.clone());
            }
        }
        filters
    }

    /// Returns whether any stored filter matches `topic`.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|(filter, _)| topic::matches(filter, topic))
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the number of stored handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no handler is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Invokes every handler whose filter matches `topic`.
    ///
    /// Handlers are called after the table lock is released, so they may
    /// subscribe or publish themselves. Returns the number of handlers called.
    pub fn dispatch(&self, topic: &str, payload: &str, message_id: u16) -> usize {
        let matching: Vec<MessageHandler> = self
            .entries
            .read()
            .iter()
            .filter(|(filter, _)| topic::matches(filter, topic))
            .map(|(_, handler)| MessageHandler::clone(handler))
            .collect();

        for handler in &matching {
            handler(topic, payload, message_id);
        }
        matching.len()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("filters", &self.filters())
            .field("handlers", &self.len())
            .finish()
    }
}
