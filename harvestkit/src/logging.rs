//! Logging setup.
//!
//! The library only emits `tracing` events; binaries call [`init_logging`]
//! once at startup to install a subscriber. `RUST_LOG` takes precedence over
//! the configured filter.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_LOG_FILTER: &str = "harvestkit=info";

/// Log file name prefix inside the log directory.
pub const LOG_FILE_PREFIX: &str = "harvestkit.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Directory for daily-rolling log files; `None` logs to stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
        }
    }
}

/// Errors that can occur while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the background log writer alive.
///
/// Dropping the guard flushes and stops file logging; hold it until exit.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global `tracing` subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.directory {
        Some(ref directory) => {
            std::fs::create_dir_all(directory).map_err(|source| LoggingError::CreateDir {
                path: directory.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

            Ok(LoggingGuard {
                _file_guard: Some(guard),
            })
        }
        None => {
            registry
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

            Ok(LoggingGuard { _file_guard: None })
        }
    }
}

fn build_filter(configured: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(configured).map_err(|e| LoggingError::InvalidFilter {
        filter: configured.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "harvestkit=info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(build_filter(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let _first = init_logging(&LoggingConfig::default());
        let second = init_logging(&LoggingConfig::default());
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
    }
}
