//! Runtime configuration for embedding the directory core.
//!
//! # Responsibility
//! - Resolve database path and logging settings from the environment.
//! - Bootstrap logging and the migrated database from one value.
//!
//! # Invariants
//! - Blank variables behave as unset.
//! - An unsupported log level is rejected at load time, not at first use.

use crate::db::{open_db, DbError};
use crate::logging::{default_log_level, init_logging, normalize_level, LoggingError};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "ORGDIR_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "ORGDIR_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "ORGDIR_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "orgdir.sqlite3";

/// Errors from loading or applying configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    InvalidValue { key: &'static str, message: String },
    /// Logging bootstrap failed.
    Logging(LoggingError),
    /// Database bootstrap failed.
    Db(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, message } => write!(f, "invalid {key}: {message}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Canonical log level (`trace|debug|info|warn|error`).
    pub log_level: String,
    /// Directory for rolling log files; file logging is off when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl DirectoryConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = normalize_level(&level)
                .map_err(|err| ConfigError::InvalidValue {
                    key: LOG_LEVEL_ENV,
                    message: err.to_string(),
                })?
                .to_string();
        }
        if let Some(dir) = read(LOG_DIR_ENV) {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: LOG_DIR_ENV,
                    message: format!("must be an absolute path, got `{}`", dir.display()),
                });
            }
            config.log_dir = Some(dir);
        }
        Ok(config)
    }

    /// Starts file logging when configured, then opens the migrated database.
    pub fn open(&self) -> Result<Connection, ConfigError> {
        if let Some(log_dir) = &self.log_dir {
            init_logging(&self.log_level, log_dir)?;
        }
        let conn = open_db(&self.db_path)?;
        info!(
            "event=config_open module=config status=ok file_logging={}",
            self.log_dir.is_some()
        );
        Ok(conn)
    }
}
