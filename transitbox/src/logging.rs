//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a daily-rolling
//! file written by a background thread. `RUST_LOG` overrides the configured
//! level.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Log file name prefix; the appender adds the date.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "transitbox.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging setup.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `transitbox=debug`.
    pub level: String,
    /// Directory for log files; stderr only when `None`.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            directory: settings.directory.clone(),
            ..Self::default()
        }
    }
}

/// Keeps the file writer alive; buffered lines are flushed on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
            filter: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|source| LoggingError::CreateDirectory {
                path: directory.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_from_settings() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            directory: Some(PathBuf::from("/var/log/transitbox")),
        };
        let config = LoggingConfig::from(&settings);
        assert_eq!(config.level, "debug");
        assert_eq!(config.file_prefix, DEFAULT_LOG_FILE_PREFIX);
    }

    #[test]
    fn test_init_creates_directory_and_rejects_second_init() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        let config = LoggingConfig {
            directory: Some(logs.clone()),
            ..LoggingConfig::default()
        };

        let guard = init_logging(&config).unwrap();
        assert!(logs.is_dir());

        let second = init_logging(&LoggingConfig::default());
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
        drop(guard);
    }
}
