//! TOML-based application configuration.
//!
//! Stores the calendar binding and the sync tuning knobs. Configuration is
//! read from `~/.config/planmatrix/config.toml`; every field has a default
//! so a missing or partial file still yields a working config.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::data_dir;

/// Calendar binding and scan window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Id of the service calendar this table syncs against. Required for
    /// any operation that touches the service.
    #[serde(default)]
    pub calendar_id: Option<String>,
    /// Events outside this window are invisible to the sync.
    #[serde(default = "default_window_begin")]
    pub window_begin: NaiveDate,
    #[serde(default = "default_window_end")]
    pub window_end: NaiveDate,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: None,
            window_begin: default_window_begin(),
            window_end: default_window_end(),
        }
    }
}

/// Sync engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Creations per batch before the engine pauses to stay under the
    /// service's create-rate ceiling.
    #[serde(default = "default_create_batch_size")]
    pub create_batch_size: usize,
    /// Pause between creation batches, and the cooldown before the single
    /// retry of a rate-limited call.
    #[serde(default = "default_create_cooldown_ms")]
    pub create_cooldown_ms: u64,
    /// How long the archive drain waits for its lock before giving up.
    #[serde(default = "default_drain_lock_wait_ms")]
    pub drain_lock_wait_ms: u64,
    /// Poll interval while waiting for the drain lock.
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
    /// Duration applied to a timed entry whose end is blank.
    #[serde(default = "default_timed_duration_min")]
    pub default_timed_duration_min: i64,
    /// Title prefix marking a row whose service event disappeared.
    #[serde(default = "default_no_sync_marker")]
    pub no_sync_marker: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            create_batch_size: default_create_batch_size(),
            create_cooldown_ms: default_create_cooldown_ms(),
            drain_lock_wait_ms: default_drain_lock_wait_ms(),
            lock_poll_ms: default_lock_poll_ms(),
            default_timed_duration_min: default_timed_duration_min(),
            no_sync_marker: default_no_sync_marker(),
        }
    }
}

impl SyncConfig {
    /// A config with every wait zeroed, for tests.
    pub fn immediate() -> Self {
        Self {
            create_cooldown_ms: 0,
            drain_lock_wait_ms: 0,
            lock_poll_ms: 0,
            ..Self::default()
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/planmatrix/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_window_begin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid constant date")
}
fn default_window_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid constant date")
}
fn default_create_batch_size() -> usize {
    125
}
fn default_create_cooldown_ms() -> u64 {
    15_000
}
fn default_drain_lock_wait_ms() -> u64 {
    30_000
}
fn default_lock_poll_ms() -> u64 {
    100
}
fn default_timed_duration_min() -> i64 {
    60
}
fn default_no_sync_marker() -> String {
    "NOSYNC".to_string()
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/planmatrix"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the config, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// The calendar id, or the config error naming the missing key.
    pub fn require_calendar_id(&self) -> Result<&str, ConfigError> {
        self.calendar
            .calendar_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("calendar.calendar_id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.create_batch_size, 125);
        assert_eq!(cfg.sync.create_cooldown_ms, 15_000);
        assert_eq!(cfg.sync.drain_lock_wait_ms, 30_000);
        assert_eq!(cfg.sync.default_timed_duration_min, 60);
        assert_eq!(cfg.sync.no_sync_marker, "NOSYNC");
        assert_eq!(
            cfg.calendar.window_begin,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [calendar]
            calendar_id = "team@group.calendar.test"

            [sync]
            create_batch_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.calendar.calendar_id.as_deref(),
            Some("team@group.calendar.test")
        );
        assert_eq!(cfg.sync.create_batch_size, 10);
        assert_eq!(cfg.sync.create_cooldown_ms, 15_000);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = Config::default();
        cfg.calendar.calendar_id = Some("cal-1".into());
        cfg.sync.create_batch_size = 50;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.calendar.calendar_id.as_deref(), Some("cal-1"));
        assert_eq!(loaded.sync.create_batch_size, 50);
    }

    #[test]
    fn missing_calendar_id_is_a_config_error() {
        let cfg = Config::default();
        let err = cfg.require_calendar_id().unwrap_err();
        assert!(err.to_string().contains("calendar.calendar_id"));
    }
}
