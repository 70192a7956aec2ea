//! Per-table retention configuration for orphan cleaning.
//!
//! Parsed fresh from the table property map at the start of every
//! cleaning cycle. Defaults are deliberately conservative: cleaning is
//! opt-in and the age floor is non-zero to tolerate commit latency and
//! clock skew between writers and the storage backend.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use lakeward_core::error::{Error, Result};

/// Table property keys consumed by the maintenance layer.
pub mod keys {
    /// Whether orphan-file cleaning is enabled for the table (bool).
    pub const ORPHAN_CLEAN_ENABLED: &str = "maintenance.orphan-clean.enabled";
    /// Minimum age in minutes before an unreferenced file may be deleted.
    pub const MIN_EXISTING_TIME_MINUTES: &str =
        "maintenance.orphan-clean.min-existing-time-minutes";
    /// Comma-separated snapshot summary keys whose values protect staged
    /// files by file-name substring match.
    pub const PROTECTED_MARKER_KEYS: &str = "maintenance.orphan-clean.protected-marker-keys";
    /// How many recent metadata version files to retain per store.
    pub const METADATA_VERSION_RETAIN_COUNT: &str = "maintenance.metadata.version-retain-count";
}

/// Default minimum-existing-time: 48 hours.
pub const DEFAULT_MIN_EXISTING_TIME_MINUTES: u64 = 2_880;
/// Default count of retained metadata version files per store.
pub const DEFAULT_METADATA_VERSION_RETAIN_COUNT: usize = 5;
/// Default protected-marker key: the property under which a streaming
/// writer records its job identifier on each commit.
pub const DEFAULT_PROTECTED_MARKER_KEY: &str = "writer.job-id";

/// Per-table retention settings for orphan cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Whether orphan cleaning runs at all for this table.
    pub enabled: bool,
    /// Files younger than this are never deleted, regardless of
    /// reachability. Tolerates in-flight commits and clock skew.
    pub min_existing_time_minutes: u64,
    /// Snapshot summary keys whose current values protect staged files.
    pub protected_marker_keys: Vec<String>,
    /// Metadata version files retained per store (most recent N, min 1).
    pub metadata_version_retain_count: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_existing_time_minutes: DEFAULT_MIN_EXISTING_TIME_MINUTES,
            protected_marker_keys: vec![DEFAULT_PROTECTED_MARKER_KEY.to_string()],
            metadata_version_retain_count: DEFAULT_METADATA_VERSION_RETAIN_COUNT,
        }
    }
}

impl RetentionConfig {
    /// Parses retention settings from a table property map.
    ///
    /// Absent keys fall back to defaults; present-but-unparsable values
    /// are configuration errors that short-circuit the table's cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable property values.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let enabled = match properties.get(keys::ORPHAN_CLEAN_ENABLED) {
            None => defaults.enabled,
            Some(raw) => parse_bool(keys::ORPHAN_CLEAN_ENABLED, raw)?,
        };

        let min_existing_time_minutes = match properties.get(keys::MIN_EXISTING_TIME_MINUTES) {
            None => defaults.min_existing_time_minutes,
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{} must be a non-negative integer, got '{raw}'",
                    keys::MIN_EXISTING_TIME_MINUTES
                ))
            })?,
        };

        let protected_marker_keys = match properties.get(keys::PROTECTED_MARKER_KEYS) {
            None => defaults.protected_marker_keys,
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string)
                .collect(),
        };

        let metadata_version_retain_count =
            match properties.get(keys::METADATA_VERSION_RETAIN_COUNT) {
                None => defaults.metadata_version_retain_count,
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::config(format!(
                        "{} must be a positive integer, got '{raw}'",
                        keys::METADATA_VERSION_RETAIN_COUNT
                    ))
                })?,
            };

        let config = Self {
            enabled,
            min_existing_time_minutes,
            protected_marker_keys,
            metadata_version_retain_count,
        };
        if let Some(message) = config.validate() {
            return Err(Error::config(message));
        }
        Ok(config)
    }

    /// The minimum-existing-time threshold as a duration.
    ///
    /// Values outside the representable range saturate to the maximum
    /// duration, which only widens the never-delete window.
    #[must_use]
    pub fn min_existing_time(&self) -> Duration {
        i64::try_from(self.min_existing_time_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX)
    }

    /// Validates the settings; returns a message describing the first
    /// problem found.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.metadata_version_retain_count == 0 {
            return Some(format!(
                "{} must be at least 1",
                keys::METADATA_VERSION_RETAIN_COUNT
            ));
        }
        if i64::try_from(self.min_existing_time_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .is_none()
        {
            return Some(format!(
                "{} is too large to represent as a duration",
                keys::MIN_EXISTING_TIME_MINUTES
            ));
        }
        None
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::config(format!(
            "{key} must be 'true' or 'false', got '{other}'"
        ))),
    }
}
