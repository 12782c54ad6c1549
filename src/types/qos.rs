// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quality of service levels for publish and subscribe.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// MQTT delivery guarantee for a published message.
///
/// Serialized as its numeric level (0, 1 or 2).
///
/// # Examples
///
/// ```
/// use devrep::types::QoS;
///
/// assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
/// assert_eq!(QoS::AtLeastOnce.level(), 1);
/// assert!(QoS::try_from(3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget (level 0).
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible (level 1).
    AtLeastOnce,
    /// Assured single delivery (level 2).
    #[default]
    ExactlyOnce,
}

impl QoS {
    /// Returns the numeric level.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = ValueError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(ValueError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos.level()
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

#[cfg(feature = "mqtt")]
impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_exactly_once() {
        assert_eq!(QoS::default(), QoS::ExactlyOnce);
    }

    #[test]
    fn levels_round_trip_through_u8() {
        for level in 0..=2 {
            let qos = QoS::try_from(level).unwrap();
            assert_eq!(u8::from(qos), level);
        }
    }

    #[test]
    fn rejects_levels_above_two() {
        assert_eq!(QoS::try_from(7), Err(ValueError::InvalidQos(7)));
    }

    #[test]
    fn deserializes_from_number() {
        let qos: QoS = serde_json::from_str("1").unwrap();
        assert_eq!(qos, QoS::AtLeastOnce);
        assert!(serde_json::from_str::<QoS>("5").is_err());
    }

    #[cfg(feature = "mqtt")]
    #[test]
    fn converts_to_rumqttc() {
        assert_eq!(
            rumqttc::QoS::from(QoS::AtMostOnce),
            rumqttc::QoS::AtMostOnce
        );
    }
}
