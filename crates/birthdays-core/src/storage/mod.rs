mod config;
pub mod database;
pub mod migrations;
pub mod registry;

pub use config::{Config, NotificationsConfig, RemindersConfig};
pub use database::Database;
pub use registry::LocalNotificationRegistry;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/birthdays[-dev]/` based on BIRTHDAYS_ENV.
///
/// Set BIRTHDAYS_ENV=dev to use the development data directory, or
/// BIRTHDAYS_DATA_DIR to use an explicit directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("BIRTHDAYS_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("BIRTHDAYS_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("birthdays-dev")
            } else {
                base_dir.join("birthdays")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
