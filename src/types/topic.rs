// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic filters and wildcard matching.
//!
//! Topics are `/`-separated levels. Filters may use `+` to match exactly one
//! level and a trailing `#` to match the parent level and every descendant.
//!
//! ```
//! use devrep::types::topic;
//!
//! assert!(topic::matches("homey/lamp/#", "homey/lamp/onoff"));
//! assert!(topic::matches("homey/lamp/#", "homey/lamp"));
//! assert!(topic::matches("homey/+/onoff", "homey/lamp/onoff"));
//! assert!(!topic::matches("homey/lamp/#", "homey/plug/onoff"));
//! ```

use crate::error::ValueError;

/// Multi-level wildcard suffix appended to root topics.
pub const MULTI_LEVEL_SUFFIX: &str = "/#";

/// Returns `true` if `topic` is matched by `filter`.
///
/// Topics starting with `$` are not matched by filters that start with a
/// wildcard, as brokers reserve them for internal use.
#[must_use]
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Checks that a subscription filter is well formed.
///
/// # Errors
///
/// Returns [`ValueError::EmptyTopic`] for an empty filter and
/// [`ValueError::InvalidTopicFilter`] if `+` or `#` share a level with other
/// characters or `#` is not the last level.
pub fn validate_filter(filter: &str) -> Result<(), ValueError> {
    if filter.is_empty() {
        return Err(ValueError::EmptyTopic);
    }

    let level_count = filter.split('/').count();
    for (index, level) in filter.split('/').enumerate() {
        let misplaced_hash = level.contains('#') && (level != "#" || index + 1 != level_count);
        let misplaced_plus = level.contains('+') && level != "+";
        if misplaced_hash || misplaced_plus {
            return Err(ValueError::InvalidTopicFilter(filter.to_string()));
        }
    }
    Ok(())
}

/// Normalizes the root topic of a device tree.
///
/// A trailing `/#` (or a trailing `/`) is removed so that callers may pass
/// either `homey/lamp` or `homey/lamp/#`.
///
/// # Errors
///
/// Returns [`ValueError::EmptyTopic`] if nothing is left after normalization
/// and [`ValueError::InvalidTopicFilter`] if the root contains wildcards.
pub fn normalize_root(root: &str) -> Result<String, ValueError> {
    let trimmed = root.strip_suffix(MULTI_LEVEL_SUFFIX).unwrap_or(root);
    let trimmed = trimmed.trim_end_matches('/');

    if trimmed.is_empty() {
        return Err(ValueError::EmptyTopic);
    }
    if trimmed.contains(['+', '#']) {
        return Err(ValueError::InvalidTopicFilter(root.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Returns the filter matching `root` and all of its descendants.
#[must_use]
pub fn wildcard(root: &str) -> String {
    format!("{root}{MULTI_LEVEL_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_filter_matches_only_itself() {
        assert!(matches("dev/cmd", "dev/cmd"));
        assert!(!matches("dev/cmd", "dev/cmd/x"));
        assert!(!matches("dev/cmd", "dev"));
    }

    #[test]
    fn multi_level_wildcard_matches_parent_and_descendants() {
        assert!(matches("dev/#", "dev"));
        assert!(matches("dev/#", "dev/a"));
        assert!(matches("dev/#", "dev/a/b/c"));
        assert!(!matches("dev/#", "device/a"));
        assert!(matches("#", "anything/at/all"));
    }

    #[test]
    fn single_level_wildcard_matches_one_level() {
        assert!(matches("dev/+/state", "dev/lamp/state"));
        assert!(!matches("dev/+/state", "dev/lamp/x/state"));
        assert!(!matches("dev/+", "dev"));
    }

    #[test]
    fn hash_must_be_last() {
        assert!(!matches("dev/#/x", "dev/a/x"));
    }

    #[test]
    fn dollar_topics_skip_leading_wildcards() {
        assert!(!matches("#", "$SYS/uptime"));
        assert!(!matches("+/uptime", "$SYS/uptime"));
        assert!(matches("$SYS/#", "$SYS/uptime"));
        assert!(matches("lamp/#", "lamp/$command"));
    }

    #[test]
    fn validate_filter_accepts_well_formed_filters() {
        assert!(validate_filter("a/b").is_ok());
        assert!(validate_filter("a/+/c").is_ok());
        assert!(validate_filter("a/#").is_ok());
        assert!(validate_filter("#").is_ok());
    }

    #[test]
    fn validate_filter_rejects_misplaced_wildcards() {
        assert_eq!(validate_filter(""), Err(ValueError::EmptyTopic));
        assert!(validate_filter("a/#/b").is_err());
        assert!(validate_filter("a/b#").is_err());
        assert!(validate_filter("a/b+/c").is_err());
    }

    #[test]
    fn normalize_root_strips_wildcard_suffix() {
        assert_eq!(normalize_root("homey/lamp").unwrap(), "homey/lamp");
        assert_eq!(normalize_root("homey/lamp/#").unwrap(), "homey/lamp");
        assert_eq!(normalize_root("homey/lamp/").unwrap(), "homey/lamp");
    }

    #[test]
    fn normalize_root_rejects_empty_and_wildcards() {
        assert_eq!(normalize_root(""), Err(ValueError::EmptyTopic));
        assert_eq!(normalize_root("/#"), Err(ValueError::EmptyTopic));
        assert!(normalize_root("homey/+/lamp").is_err());
    }

    #[test]
    fn wildcard_appends_suffix() {
        assert_eq!(wildcard("homey/lamp"), "homey/lamp/#");
    }
}
