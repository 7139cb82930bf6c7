use std::path::PathBuf;
use thiserror::Error;

use crate::backup::RestoreMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Service settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `DATABASE_URL`; without it records live in memory only.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub backup_dir: PathBuf,
    pub restore_mode: RestoreMode,
    /// Built frontend to serve for every non-API path.
    pub frontend_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "127.0.0.1:8000".to_string(),
            backup_dir: PathBuf::from("backups"),
            restore_mode: RestoreMode::default(),
            frontend_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let restore_mode = match get("RESTORE_MODE") {
            Some(raw) => raw.parse::<RestoreMode>().map_err(|reason| ConfigError::Invalid {
                name: "RESTORE_MODE",
                reason,
            })?,
            None => defaults.restore_mode,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            backup_dir: get("BACKUP_DIR").map(PathBuf::from).unwrap_or(defaults.backup_dir),
            restore_mode,
            frontend_dir: get("FRONTEND_DIR").map(PathBuf::from),
        })
    }
}
