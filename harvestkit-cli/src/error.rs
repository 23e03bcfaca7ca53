//! CLI error type.

use harvestkit::config::ConfigError;
use harvestkit::logging::LoggingError;
use thiserror::Error;

/// Errors surfaced to the user by the `harvestkit` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
