// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named registries of representations and clients.
//!
//! Each manager is bound to one [`Connector`](crate::protocol::Connector)
//! and keeps its entries in a lookup table:
//!
//! - [`DeviceRepresentationManager`]: device representations by name
//! - [`SenderManager`]: publishing clients by client id, plus saved messages
//! - [`ReceiverManager`]: single-handler subscribers by client id
//!
//! Unknown names fail with [`Error::NotFound`](crate::Error::NotFound).

mod device_manager;
mod receiver;
mod sender;

pub use device_manager::DeviceRepresentationManager;
pub use receiver::ReceiverManager;
pub use sender::SenderManager;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{EntryKind, Error};

type ClientMap<C> = RwLock<HashMap<String, Arc<C>>>;

/// Clones the entry for `id` out of `map` so the lock is not held across awaits.
async fn lookup<C>(map: &ClientMap<C>, kind: EntryKind, id: &str) -> crate::Result<Arc<C>> {
    map.read()
        .await
        .get(id)
        .map(Arc::clone)
        .ok_or_else(|| Error::not_found(kind, id))
}
