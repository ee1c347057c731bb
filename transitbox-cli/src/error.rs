//! Errors surfaced by CLI commands.

use thiserror::Error;
use transitbox::config::ConfigError;
use transitbox::feed::{DecodeError, FetchError};
use transitbox::logging::LoggingError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid arguments or settings.
    #[error("{0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Feed fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CliError {
    /// Print to stderr and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(1);
    }
}
