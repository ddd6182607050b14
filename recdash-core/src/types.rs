//! Domain types shared by the dashboard crates.
//!
//! `ConfigValues` serializes with the shell key names so the JSON config API
//! and the on-disk `config.sh` speak the same vocabulary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config keys and defaults
// ---------------------------------------------------------------------------

pub const KEYWORDS_KEY: &str = "TEAMS_WINDOW_KEYWORDS";
pub const POLL_ACTIVE_KEY: &str = "POLL_INTERVAL_ACTIVE";
pub const POLL_INACTIVE_KEY: &str = "POLL_INTERVAL_INACTIVE";
pub const STABILITY_KEY: &str = "STABILITY_CHECK_DELAY";
pub const EXPORT_FOLDER_KEY: &str = "EXPORT_FOLDER";

pub const DEFAULT_KEYWORDS: [&str; 2] = ["Call", "Meeting"];
pub const DEFAULT_POLL_ACTIVE: i64 = 10;
pub const DEFAULT_POLL_INACTIVE: i64 = 30;
pub const DEFAULT_STABILITY_DELAY: i64 = 5;

// ---------------------------------------------------------------------------
// ConfigValues
// ---------------------------------------------------------------------------

/// The five settings the recording watcher reads from `config.sh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValues {
    /// Window-title substrings that identify a meeting. Order matters.
    #[serde(rename = "TEAMS_WINDOW_KEYWORDS")]
    pub window_keywords: Vec<String>,

    #[serde(rename = "POLL_INTERVAL_ACTIVE")]
    pub poll_interval_active: i64,

    #[serde(rename = "POLL_INTERVAL_INACTIVE")]
    pub poll_interval_inactive: i64,

    #[serde(rename = "STABILITY_CHECK_DELAY")]
    pub stability_check_delay: i64,

    #[serde(rename = "EXPORT_FOLDER", default)]
    pub export_folder: String,
}

impl Default for ConfigValues {
    fn default() -> Self {
        Self {
            window_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            poll_interval_active: DEFAULT_POLL_ACTIVE,
            poll_interval_inactive: DEFAULT_POLL_INACTIVE,
            stability_check_delay: DEFAULT_STABILITY_DELAY,
            export_folder: String::new(),
        }
    }
}

/// A single violated constraint reported by [`ConfigValues::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ConfigValues {
    /// Check every field against its declared domain.
    ///
    /// All violations are collected; nothing short-circuits, so the caller
    /// can show the full list at once.
    pub fn validate(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        if self.window_keywords.is_empty() {
            violations.push(Violation {
                field: KEYWORDS_KEY.to_string(),
                message: "At least one keyword is required".to_string(),
            });
        }

        if self.window_keywords.iter().any(|k| k.contains(['\n', '\r'])) {
            violations.push(Violation {
                field: KEYWORDS_KEY.to_string(),
                message: "keywords must not contain line breaks".to_string(),
            });
        }
        if self.export_folder.contains(['\n', '\r']) {
            violations.push(Violation {
                field: EXPORT_FOLDER_KEY.to_string(),
                message: "must not contain line breaks".to_string(),
            });
        }

        let ranges = [
            (POLL_ACTIVE_KEY, self.poll_interval_active, 1, 60),
            (POLL_INACTIVE_KEY, self.poll_interval_inactive, 10, 300),
            (STABILITY_KEY, self.stability_check_delay, 1, 20),
        ];
        for (field, value, min, max) in ranges {
            if value < min || value > max {
                violations.push(Violation {
                    field: field.to_string(),
                    message: format!("must be between {min} and {max}, got {value}"),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_LOG_LINES: usize = 50;
pub const DEFAULT_MAX_LOG_BYTES: u64 = 64 * 1024;
pub const MIN_LOG_LINES: usize = 10;
pub const MAX_LOG_LINES_LIMIT: usize = 500;
pub const MIN_LOG_BYTES: u64 = 8 * 1024;
pub const MAX_LOG_BYTES_LIMIT: u64 = 1024 * 1024;

/// Key/value pairs from the watcher status file. Always holds `state`.
pub type WatcherStatus = BTreeMap<String, String>;

/// Bounds for one snapshot read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOptions {
    pub max_lines: usize,
    pub max_bytes: u64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LOG_LINES,
            max_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

impl SnapshotOptions {
    /// Build options from the raw `lines` / `bytes` query values.
    ///
    /// Absent or non-numeric values fall back to the defaults; numbers out
    /// of range clamp to the nearest bound.
    pub fn from_query(lines: Option<&str>, bytes: Option<&str>) -> Self {
        let max_lines = bounded(
            lines,
            DEFAULT_MAX_LOG_LINES as i64,
            MIN_LOG_LINES as i64,
            MAX_LOG_LINES_LIMIT as i64,
        );
        let max_bytes = bounded(
            bytes,
            DEFAULT_MAX_LOG_BYTES as i64,
            MIN_LOG_BYTES as i64,
            MAX_LOG_BYTES_LIMIT as i64,
        );
        Self {
            max_lines: max_lines as usize,
            max_bytes: max_bytes as u64,
        }
    }
}

fn bounded(raw: Option<&str>, fallback: i64, min: i64, max: i64) -> i64 {
    match raw.filter(|s| !s.is_empty()).and_then(crate::shell::parse_leading_int) {
        Some(value) => value.clamp(min, max),
        None => fallback,
    }
}

/// Echo of the bounds a snapshot was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub lines: usize,
    pub bytes: u64,
}

impl From<SnapshotOptions> for SnapshotMeta {
    fn from(options: SnapshotOptions) -> Self {
        Self {
            lines: options.max_lines,
            bytes: options.max_bytes,
        }
    }
}

/// Point-in-time view of the watcher: status plus recent log lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: WatcherStatus,
    /// Oldest first, most recent last.
    pub logs: Vec<String>,
    pub meta: SnapshotMeta,
}

impl Snapshot {
    /// The `state` entry, which every snapshot carries.
    pub fn state(&self) -> &str {
        self.status.get("state").map(String::as_str).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ConfigValues::default().validate(), Ok(()));
    }

    #[test]
    fn validate_collects_every_violation() {
        let values = ConfigValues {
            window_keywords: vec![],
            poll_interval_active: 0,
            poll_interval_inactive: 301,
            stability_check_delay: 21,
            export_folder: String::new(),
        };
        let violations = values.validate().expect_err("invalid values");
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![KEYWORDS_KEY, POLL_ACTIVE_KEY, POLL_INACTIVE_KEY, STABILITY_KEY]
        );
    }

    #[test]
    fn snapshot_options_clamp_and_default() {
        assert_eq!(SnapshotOptions::from_query(None, None), SnapshotOptions::default());
        assert_eq!(
            SnapshotOptions::from_query(Some("200"), Some("8192")),
            SnapshotOptions { max_lines: 200, max_bytes: 8192 }
        );
        assert_eq!(
            SnapshotOptions::from_query(Some("1"), Some("999999999")),
            SnapshotOptions { max_lines: 10, max_bytes: 1024 * 1024 }
        );
        assert_eq!(
            SnapshotOptions::from_query(Some("abc"), Some("")),
            SnapshotOptions::default()
        );
    }

    #[test]
    fn config_values_use_shell_key_names_in_json() {
        let json = serde_json::to_value(ConfigValues::default()).expect("serialize");
        assert_eq!(json["TEAMS_WINDOW_KEYWORDS"], serde_json::json!(["Call", "Meeting"]));
        assert_eq!(json["POLL_INTERVAL_ACTIVE"], serde_json::json!(10));
        assert_eq!(json["EXPORT_FOLDER"], serde_json::json!(""));
    }
}
