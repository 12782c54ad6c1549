// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection options for broker clients.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValueError};
use crate::types::QoS;

/// Options applied to every connection a client opens.
///
/// All fields have defaults, so partial JSON documents are accepted by
/// [`ConnectionOptions::from_json`].
///
/// # Examples
///
/// ```
/// use devrep::protocol::ConnectionOptions;
/// use devrep::types::QoS;
///
/// let options = ConnectionOptions::stable_network()
///     .with_credentials("mqtt_user", "secret")
///     .with_qos(QoS::AtLeastOnce);
///
/// assert_eq!(options.keep_alive_secs, 15);
/// assert_eq!(options.qos, QoS::AtLeastOnce);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Re-establish the connection automatically when it drops.
    pub auto_reconnect: bool,
    /// Start every connection without a persisted broker session.
    pub clean_session: bool,
    /// Maximum idle time before the client pings the broker.
    pub keep_alive_secs: u64,
    /// How long to wait for the broker to accept a connection.
    pub connection_timeout_secs: u64,
    /// Maximum number of unacknowledged outgoing messages.
    pub max_in_flight: u16,
    /// Username and password for the broker.
    pub credentials: Option<Credentials>,
    /// Message the broker publishes if the client disconnects ungracefully.
    pub last_will: Option<LastWill>,
    /// Quality of service for subscriptions and for sends without an override.
    pub qos: QoS,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            clean_session: true,
            keep_alive_secs: 30,
            connection_timeout_secs: 60,
            max_in_flight: 10,
            credentials: None,
            last_will: None,
            qos: QoS::ExactlyOnce,
        }
    }
}

impl ConnectionOptions {
    /// Options tuned for a reliable network (keep-alive 15s, timeout 30s, 15 in flight).
    #[must_use]
    pub fn stable_network() -> Self {
        Self {
            keep_alive_secs: 15,
            connection_timeout_secs: 30,
            max_in_flight: 15,
            ..Self::default()
        }
    }

    /// Options tuned for a lossy network (keep-alive 45s, timeout 90s, 7 in flight).
    #[must_use]
    pub fn unstable_network() -> Self {
        Self {
            keep_alive_secs: 45,
            connection_timeout_secs: 90,
            max_in_flight: 7,
            ..Self::default()
        }
    }

    /// Parses options from a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Sets whether dropped connections are re-established.
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets whether connections start with a clean session.
    #[must_use]
    pub fn with_clean_session(mut self, enabled: bool) -> Self {
        self.clean_session = enabled;
        self
    }

    /// Sets the keep-alive interval in seconds.
    #[must_use]
    pub fn with_keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Sets the connection timeout in seconds.
    #[must_use]
    pub fn with_connection_timeout_secs(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Sets the maximum number of in-flight messages.
    #[must_use]
    pub fn with_max_in_flight(mut self, max: u16) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the last-will message.
    #[must_use]
    pub fn with_last_will(mut self, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        self.last_will = Some(LastWill {
            topic: topic.into(),
            payload: payload.into(),
        });
        self
    }

    /// Sets the default quality of service.
    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the credentials if both username and password are non-empty.
    #[must_use]
    pub fn usable_credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.is_empty() && !c.password.is_empty())
    }

    /// Checks that the options can be used to open a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::OutOfRange`] if `max_in_flight` is zero.
    pub fn validate(&self) -> Result<(), ValueError> {
        if self.max_in_flight == 0 {
            return Err(ValueError::OutOfRange {
                min: 1,
                max: u16::MAX,
                actual: 0,
            });
        }
        Ok(())
    }
}

/// Broker authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Broker username.
    pub username: String,
    /// Broker password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Message published by the broker on the client's behalf after an
/// ungraceful disconnect. Always sent at QoS 2 and retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastWill {
    /// Topic the will is published to.
    pub topic: String,
    /// Will payload.
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let options = ConnectionOptions::default();
        assert!(options.auto_reconnect);
        assert!(options.clean_session);
        assert_eq!(options.keep_alive_secs, 30);
        assert_eq!(options.connection_timeout_secs, 60);
        assert_eq!(options.max_in_flight, 10);
        assert_eq!(options.qos, QoS::ExactlyOnce);
        assert!(options.credentials.is_none());
        assert!(options.last_will.is_none());
    }

    #[test]
    fn network_presets() {
        let stable = ConnectionOptions::stable_network();
        assert_eq!(
            (stable.keep_alive_secs, stable.connection_timeout_secs, stable.max_in_flight),
            (15, 30, 15)
        );

        let unstable = ConnectionOptions::unstable_network();
        assert_eq!(
            (unstable.keep_alive_secs, unstable.connection_timeout_secs, unstable.max_in_flight),
            (45, 90, 7)
        );
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let options =
            ConnectionOptions::from_json(r#"{"keep_alive_secs": 5, "qos": 1}"#).unwrap();
        assert_eq!(options.keep_alive(), Duration::from_secs(5));
        assert_eq!(options.qos, QoS::AtLeastOnce);
        assert_eq!(options.max_in_flight, 10);
    }

    #[test]
    fn from_json_rejects_bad_qos() {
        assert!(ConnectionOptions::from_json(r#"{"qos": 3}"#).is_err());
    }

    #[test]
    fn credentials_require_both_parts() {
        let options = ConnectionOptions::default().with_credentials("user", "");
        assert!(options.usable_credentials().is_none());

        let options = ConnectionOptions::default().with_credentials("user", "pass");
        assert_eq!(options.usable_credentials().unwrap().username, "user");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let options = ConnectionOptions::default().with_credentials("user", "hunter2");
        let debug = format!("{:?}", options.credentials.unwrap());
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn validate_rejects_zero_in_flight() {
        let options = ConnectionOptions::default().with_max_in_flight(0);
        assert!(matches!(
            options.validate(),
            Err(ValueError::OutOfRange { actual: 0, .. })
        ));
        assert!(ConnectionOptions::default().validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let options = ConnectionOptions::default()
            .with_auto_reconnect(false)
            .with_clean_session(false)
            .with_keep_alive_secs(60)
            .with_connection_timeout_secs(5)
            .with_last_will("lamp/status", "offline");

        assert!(!options.auto_reconnect);
        assert!(!options.clean_session);
        assert_eq!(options.connection_timeout(), Duration::from_secs(5));
        assert_eq!(options.last_will.unwrap().payload, "offline");
    }
}
