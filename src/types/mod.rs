// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by broker clients and representations.
//!
//! # Types
//!
//! - [`QoS`] - Delivery guarantee for published messages (0-2)
//! - [`topic`] - Topic filter validation and wildcard matching

mod qos;
pub mod topic;

pub use qos::QoS;
