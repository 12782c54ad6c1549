// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homey MQTT hub conventions.
//!
//! A Homey hub publishes device state under `homey/<device>/<capability>` and
//! listens for commands on a single `<device>/$command` topic. Commands are
//! JSON objects naming the device, the capability and the target value:
//!
//! ```json
//! {"command":"setOn","device":{"name":"Lamp"},"capability":"onoff","value":"true"}
//! ```

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValueError};

/// Suffix of the topic a Homey hub listens on for commands.
pub const COMMAND_SUFFIX: &str = "/$command";

/// Derives the command topic from a device root topic.
///
/// The second level of the root, lowercased, followed by [`COMMAND_SUFFIX`].
///
/// # Errors
///
/// Returns [`ValueError::InvalidRootTopic`] if the root has no non-empty
/// second level.
///
/// # Examples
///
/// ```
/// use devrep::representation::homey::command_topic;
///
/// assert_eq!(
///     command_topic("homey/LivingRoom-Lamp").unwrap(),
///     "livingroom-lamp/$command"
/// );
/// assert!(command_topic("homey").is_err());
/// ```
pub fn command_topic(root: &str) -> Result<String, ValueError> {
    let lowered = root.to_lowercase();
    match lowered.split('/').nth(1) {
        Some(device) if !device.is_empty() => Ok(format!("{device}{COMMAND_SUFFIX}")),
        _ => Err(ValueError::InvalidRootTopic {
            topic: root.to_string(),
            reason: "expected at least two topic levels",
        }),
    }
}

/// Extracts the capability name from a topic delivered under `root`.
///
/// The root prefix is stripped case-insensitively, comparing character by
/// character so the remainder keeps its delivered casing. If the remainder
/// is a non-empty path without a leading slash it is the capability;
/// anything else falls back to the first level of the topic.
///
/// # Examples
///
/// ```
/// use devrep::representation::homey::capability;
///
/// assert_eq!(capability("homey/lamp", "homey/lamp/onoff"), "onoff");
/// assert_eq!(capability("homey/lamp", "lamp/$command"), "lamp");
/// ```
#[must_use]
pub fn capability(root: &str, topic: &str) -> String {
    if let Some(rest) = strip_prefix_ignore_case(topic, &format!("{root}/"))
        && !rest.is_empty()
        && !rest.starts_with('/')
    {
        return rest.to_string();
    }

    topic.split('/').next().unwrap_or_default().to_string()
}

/// Strips `prefix` from `text`, ignoring case.
///
/// Characters are compared by their lowercase mappings, so byte offsets in
/// `text` stay valid even where a mapping changes the encoded length.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    text.get(chars.offset()..)
}

/// Device reference inside a [`HomeyCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    /// Device name as configured in Homey.
    pub name: String,
}

/// A structured command for the Homey MQTT hub.
///
/// # Examples
///
/// ```
/// use devrep::representation::homey::HomeyCommand;
///
/// let command = HomeyCommand::new("setOn", "Lamp", "onoff", "true");
/// let payload = command.to_payload().unwrap();
/// assert_eq!(HomeyCommand::from_payload(&payload).unwrap(), command);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeyCommand {
    /// Command keyword.
    pub command: String,
    /// Target device.
    pub device: DeviceRef,
    /// Capability the command acts on.
    pub capability: String,
    /// Value the capability should take.
    pub value: String,
}

impl HomeyCommand {
    /// Creates a command.
    pub fn new(
        command: impl Into<String>,
        device_name: impl Into<String>,
        capability: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            device: DeviceRef {
                name: device_name.into(),
            },
            capability: capability.into(),
            value: value.into(),
        }
    }

    /// Serializes the command to its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if serialization fails.
    pub fn to_payload(&self) -> Result<String, ParseError> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Parses a command payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the payload is not a command object.
    pub fn from_payload(payload: &str) -> Result<Self, ParseError> {
        serde_json::from_str(payload).map_err(Into::into)
    }
}

/// Command channel of a Homey representation.
#[derive(Debug)]
pub(crate) struct HomeyChannel {
    command_topic: String,
    commands: RwLock<HashMap<String, String>>,
}

impl HomeyChannel {
    pub(crate) fn new(command_topic: String) -> Self {
        Self {
            command_topic,
            commands: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn command_topic(&self) -> &str {
        &self.command_topic
    }

    pub(crate) fn save(&self, id: impl Into<String>, payload: String) {
        self.commands.write().insert(id.into(), payload);
    }

    pub(crate) fn payload(&self, id: &str) -> Option<String> {
        self.commands.read().get(id).cloned()
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.commands.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_topic_uses_second_level() {
        assert_eq!(
            command_topic("homey/livingroom-lamp").unwrap(),
            "livingroom-lamp/$command"
        );
        assert_eq!(
            command_topic("homey/Kitchen/extra").unwrap(),
            "kitchen/$command"
        );
    }

    #[test]
    fn command_topic_rejects_short_roots() {
        assert!(matches!(
            command_topic("homey"),
            Err(ValueError::InvalidRootTopic { .. })
        ));
        assert!(command_topic("homey/").is_err());
    }

    #[test]
    fn capability_strips_root() {
        assert_eq!(capability("homey/lamp", "homey/lamp/onoff"), "onoff");
        assert_eq!(capability("homey/lamp", "homey/lamp/measure/power"), "measure/power");
    }

    #[test]
    fn capability_matching_is_case_insensitive() {
        assert_eq!(capability("homey/Lamp", "Homey/lamp/Dim"), "Dim");
    }

    #[test]
    fn capability_matching_survives_length_changing_case_maps() {
        // KELVIN SIGN is 3 bytes and lowercases to the 1-byte 'k'
        assert_eq!(capability("homey/\u{212A}itchen", "homey/kitchen/onoff"), "onoff");
        assert_eq!(capability("homey/kitchen", "homey/\u{212A}ITCHEN/Dim"), "Dim");
        assert_eq!(
            capability("homey/\u{212A}itchen", "homey/\u{212A}itchen/measure/power"),
            "measure/power"
        );
        assert_eq!(capability("homey/\u{212A}itchen", "homey/kitche"), "homey");
    }

    #[test]
    fn strip_prefix_ignore_case_keeps_delivered_bytes() {
        assert_eq!(strip_prefix_ignore_case("HOMEY/Lamp", "homey/"), Some("Lamp"));
        assert_eq!(strip_prefix_ignore_case("\u{212A}/x", "k/"), Some("x"));
        assert_eq!(strip_prefix_ignore_case("homey", "homey/"), None);
        assert_eq!(strip_prefix_ignore_case("homex/", "homey/"), None);
        assert_eq!(strip_prefix_ignore_case("homey/", "homey/"), Some(""));
    }

    #[test]
    fn capability_falls_back_to_first_level() {
        // Root itself
        assert_eq!(capability("homey/lamp", "homey/lamp"), "homey");
        // Empty level after the root
        assert_eq!(capability("homey/lamp", "homey/lamp//x"), "homey");
        // Unrelated topic
        assert_eq!(capability("homey/lamp", "lamp/$command"), "lamp");
    }

    #[test]
    fn payload_shape() {
        let payload = HomeyCommand::new("setOn", "Lamp", "onoff", "true")
            .to_payload()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["command"], "setOn");
        assert_eq!(value["device"]["name"], "Lamp");
        assert_eq!(value["capability"], "onoff");
        assert_eq!(value["value"], "true");
    }

    #[test]
    fn payload_escapes_quotes() {
        let command = HomeyCommand::new("setOn", "The \"big\" lamp", "onoff", "true");
        let parsed = HomeyCommand::from_payload(&command.to_payload().unwrap()).unwrap();
        assert_eq!(parsed.device.name, "The \"big\" lamp");
    }

    #[test]
    fn from_payload_rejects_garbage() {
        assert!(HomeyCommand::from_payload("{\"command\":1}").is_err());
    }

    #[test]
    fn channel_saves_commands() {
        let channel = HomeyChannel::new("lamp/$command".to_string());
        channel.save("c2", "{}".to_string());
        channel.save("c1", "{}".to_string());
        assert_eq!(channel.command_topic(), "lamp/$command");
        assert_eq!(channel.ids(), vec!["c1".to_string(), "c2".to_string()]);
        assert!(channel.payload("c3").is_none());
    }
}
