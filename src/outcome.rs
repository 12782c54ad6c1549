// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Successful results of lifecycle and send operations.

use std::fmt;

/// The successful result of a broker client or representation operation.
///
/// Calls that find the connection already in the requested state are not
/// failures; they report one of the `Already*` qualifiers instead of
/// [`Outcome::Done`].
///
/// # Examples
///
/// ```
/// use devrep::Outcome;
///
/// assert_eq!(Outcome::Done.to_string(), "success");
/// assert!(Outcome::AlreadyClosed.is_redundant());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The operation was performed.
    Done,
    /// The client was already connected.
    AlreadyConnected,
    /// The client was already disconnected.
    AlreadyDisconnected,
    /// The client or representation was already closed.
    AlreadyClosed,
}

impl Outcome {
    /// Returns `true` if nothing had to be done.
    #[must_use]
    pub fn is_redundant(self) -> bool {
        !matches!(self, Self::Done)
    }

    /// Returns the informational note attached to a redundant outcome.
    #[must_use]
    pub fn note(self) -> Option<&'static str> {
        match self {
            Self::Done => None,
            Self::AlreadyConnected => Some("the client was already connected"),
            Self::AlreadyDisconnected => Some("the client was already disconnected"),
            Self::AlreadyClosed => Some("the client was already closed"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note() {
            Some(note) => write!(f, "success but {note}"),
            None => f.write_str("success"),
        }
    }
}
