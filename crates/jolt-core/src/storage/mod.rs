mod config;
pub mod database;

pub use config::{Config, DetectionConfig, EscalationConfig, NotifyConfig};
pub use database::{Database, HistoryEntry};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `JOLT_DATA_DIR` wins when set. Otherwise `~/.config/jolt`, or
/// `~/.config/jolt-dev` when `JOLT_ENV=dev`.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("JOLT_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("JOLT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("jolt-dev")
            } else {
                base_dir.join("jolt")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
