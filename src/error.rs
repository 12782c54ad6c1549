// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `devrep` library.
//!
//! Failures fall into three groups:
//!
//! - **not found**: a message, command, callback, device or client name was
//!   never registered ([`Error::NotFound`])
//! - **transport**: the broker client reported a failure ([`Error::Protocol`])
//! - **usage**: invalid values, closed representations, unsupported variants
//!
//! Redundant lifecycle calls (connecting twice, closing twice) are not errors.
//! They succeed with a qualified [`Outcome`](crate::Outcome).

use std::fmt;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The broker client reported a failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while encoding or decoding a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The referenced entry was never registered.
    #[error("no {kind} named '{name}' exists")]
    NotFound {
        /// Which registry was searched.
        kind: EntryKind,
        /// The name that was looked up.
        name: String,
    },

    /// The representation has been closed and cannot be used anymore.
    #[error("device representation is already closed")]
    Closed,

    /// Structured commands were used on a representation without a command channel.
    #[error("device representation does not support structured commands")]
    CommandsNotSupported,

    /// A manager already holds an entry with this name.
    #[error("an entry named '{0}' already exists")]
    DuplicateName(String),
}

impl Error {
    pub(crate) fn not_found(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns `true` if the error is a lookup of an unregistered name.
    ///
    /// These indicate a usage error and retrying will not help.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error was reported by the broker client.
    ///
    /// Transport failures are usually transient and may be retried.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// The registries a name can be looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A saved outgoing message.
    Message,
    /// A saved structured command.
    Command,
    /// A side-subscription callback.
    Callback,
    /// A device representation held by a manager.
    Device,
    /// A broker client held by a manager.
    Client,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::Command => "command",
            Self::Callback => "callback",
            Self::Device => "device",
            Self::Client => "client",
        };
        f.write_str(name)
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A quality of service level other than 0, 1 or 2.
    #[error("invalid quality of service: {0}")]
    InvalidQos(u8),

    /// A topic or topic filter was empty.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// A topic filter uses wildcards incorrectly.
    #[error("invalid topic filter: {0}")]
    InvalidTopicFilter(String),

    /// A root topic cannot be used for the requested representation kind.
    #[error("invalid root topic '{topic}': {reason}")]
    InvalidRootTopic {
        /// The offending root topic.
        topic: String,
        /// Why the topic was rejected.
        reason: &'static str,
    },
}

/// Errors reported by broker clients.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker did not answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The client was closed and cannot be used anymore.
    #[error("client is closed")]
    ClientClosed,

    /// The broker refused a subscription.
    #[error("subscription to '{0}' was rejected")]
    SubscriptionRejected(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to encoding and decoding payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON encoding or decoding failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 1,
            max: 100,
            actual: 0,
        };
        assert_eq!(err.to_string(), "value 0 is out of range [1, 100]");
    }

    #[test]
    fn not_found_display_names_the_registry() {
        let err = Error::not_found(EntryKind::Message, "lamp_on");
        assert_eq!(err.to_string(), "no message named 'lamp_on' exists");
        assert!(err.is_not_found());
        assert!(!err.is_transport());
    }

    #[test]
    fn protocol_errors_are_transport() {
        let err: Error = ProtocolError::ConnectionFailed("refused".to_string()).into();
        assert!(err.is_transport());
        assert!(!err.is_not_found());
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::InvalidQos(3).into();
        assert!(matches!(err, Error::Value(ValueError::InvalidQos(3))));
    }

    #[test]
    fn root_topic_error_display() {
        let err = ValueError::InvalidRootTopic {
            topic: "homey".to_string(),
            reason: "expected at least two levels",
        };
        assert_eq!(
            err.to_string(),
            "invalid root topic 'homey': expected at least two levels"
        );
    }
}
