mod alarm_store;
mod config;
pub mod database;
pub mod kv;

pub use alarm_store::{AlarmStore, ALARMS_KEY, DAILY_RESET_ENABLED_KEY};
pub use config::{AlarmDefaults, Config, LoggingConfig, StorageConfig};
pub use database::Database;
pub use kv::{KeyValueStore, MemoryKv};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/ringwork[-dev]/` based on RINGWORK_ENV.
///
/// Set RINGWORK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("RINGWORK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("ringwork-dev")
    } else {
        base_dir.join("ringwork")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
