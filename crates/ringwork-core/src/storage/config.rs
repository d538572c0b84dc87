//! TOML-based application configuration.
//!
//! Stores:
//! - Defaults applied to newly created alarms
//! - Database location override
//! - Log filter
//!
//! Configuration is stored at `~/.config/ringwork/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::alarm::{AlarmDraft, SoundRef, VibrationPattern};
use crate::error::{ConfigError, Result};

/// Values used for any field the user leaves out when creating an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDefaults {
    #[serde(default = "default_snooze_interval_secs")]
    pub snooze_interval_secs: u64,
    #[serde(default = "default_work_duration_secs")]
    pub work_duration_secs: u64,
    #[serde(default = "default_break_duration_secs")]
    pub break_duration_secs: u64,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_snooze_count: u32,
    #[serde(default = "default_vibration")]
    pub vibration: VibrationPattern,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides `<data_dir>/ringwork.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/ringwork/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alarm_defaults: AlarmDefaults,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_snooze_interval_secs() -> u64 {
    180
}
fn default_work_duration_secs() -> u64 {
    300
}
fn default_break_duration_secs() -> u64 {
    120
}
fn default_vibration() -> VibrationPattern {
    VibrationPattern::Default
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for AlarmDefaults {
    fn default() -> Self {
        Self {
            snooze_interval_secs: default_snooze_interval_secs(),
            work_duration_secs: default_work_duration_secs(),
            break_duration_secs: default_break_duration_secs(),
            max_snooze_count: 0,
            vibration: default_vibration(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AlarmDefaults {
    /// A draft for `hour:minute` carrying these defaults.
    pub fn draft(&self, hour: u8, minute: u8) -> AlarmDraft {
        AlarmDraft {
            max_snooze_count: self.max_snooze_count,
            vibration: self.vibration,
            snooze_interval_ms: self.snooze_interval_secs.saturating_mul(1000),
            work_duration_ms: self.work_duration_secs.saturating_mul(1000),
            break_duration_ms: self.break_duration_secs.saturating_mul(1000),
            sound: SoundRef::PlatformDefault,
            ..AlarmDraft::new(hour, minute)
        }
    }
}

impl Config {
    /// Location of the config file.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Database file to open.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("ringwork.db")),
        }
    }
}
