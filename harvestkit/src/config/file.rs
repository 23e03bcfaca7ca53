//! INI configuration file.
//!
//! ```ini
//! [cache]
//! day_ttl_secs = 300
//! night_ttl_secs = 1800
//! night_start_hour = 0
//! night_end_hour = 6
//! max_generation_lag = 2
//!
//! [negative]
//! empty_ttl_secs = 300
//! default_shield_secs = 86400
//!
//! [cadence]
//! latency_window = 10
//! excellent_latency_ms = 200
//! good_latency_ms = 500
//!
//! [ranker]
//! default_top_n = 100
//! report_top_n = 10
//!
//! [cooldown]
//! outcome_window = 10
//!
//! [logging]
//! filter = harvestkit=info
//! directory = /var/log/harvestkit
//! ```
//!
//! Missing sections and keys keep their defaults.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::{OptimizerConfig, MAX_OUTCOME_WINDOW};
use crate::logging::LoggingConfig;

/// Errors that can occur while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// A key holds a value that cannot be used.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// No per-user configuration directory exists on this platform.
    #[error("could not determine the configuration directory")]
    NoConfigDir,
}

/// Default configuration file location (`<config dir>/harvestkit/config.ini`).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("harvestkit").join("config.ini"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Everything that can be set from the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the given path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| match source {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let config = Self::from_ini(&ini)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load from the given path, or return defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from the default location, or return defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(&config_file_path()?)
    }

    /// Write to the given path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    /// Build from a parsed INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let opt = &mut config.optimizer;

        read_secs(ini, "cache", "day_ttl_secs", &mut opt.entity_cache.day_ttl)?;
        read_secs(ini, "cache", "night_ttl_secs", &mut opt.entity_cache.night_ttl)?;
        read(ini, "cache", "night_start_hour", &mut opt.entity_cache.night_start_hour)?;
        read(ini, "cache", "night_end_hour", &mut opt.entity_cache.night_end_hour)?;
        read(ini, "cache", "max_generation_lag", &mut opt.entity_cache.max_generation_lag)?;

        read_secs(ini, "negative", "empty_ttl_secs", &mut opt.negative.empty_ttl)?;
        read_secs(
            ini,
            "negative",
            "default_shield_secs",
            &mut opt.negative.default_shield_duration,
        )?;

        read(ini, "cadence", "latency_window", &mut opt.cadence.latency_window)?;
        read(ini, "cadence", "excellent_latency_ms", &mut opt.cadence.excellent_latency_ms)?;
        read(ini, "cadence", "good_latency_ms", &mut opt.cadence.good_latency_ms)?;

        read(ini, "ranker", "default_top_n", &mut opt.ranker.default_top_n)?;
        read(ini, "ranker", "report_top_n", &mut opt.ranker.report_top_n)?;

        read(ini, "cooldown", "outcome_window", &mut opt.cooldown.outcome_window)?;

        if let Some(filter) = ini.get_from(Some("logging"), "filter") {
            config.logging.filter = filter.trim().to_string();
        }
        if let Some(directory) = ini.get_from(Some("logging"), "directory") {
            let directory = directory.trim();
            if !directory.is_empty() {
                config.logging.directory = Some(PathBuf::from(directory));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Render as an INI document.
    pub fn to_ini(&self) -> Ini {
        let opt = &self.optimizer;
        let mut ini = Ini::new();

        ini.with_section(Some("cache"))
            .set("day_ttl_secs", opt.entity_cache.day_ttl.as_secs().to_string())
            .set("night_ttl_secs", opt.entity_cache.night_ttl.as_secs().to_string())
            .set("night_start_hour", opt.entity_cache.night_start_hour.to_string())
            .set("night_end_hour", opt.entity_cache.night_end_hour.to_string())
            .set("max_generation_lag", opt.entity_cache.max_generation_lag.to_string());

        ini.with_section(Some("negative"))
            .set("empty_ttl_secs", opt.negative.empty_ttl.as_secs().to_string())
            .set(
                "default_shield_secs",
                opt.negative.default_shield_duration.as_secs().to_string(),
            );

        ini.with_section(Some("cadence"))
            .set("latency_window", opt.cadence.latency_window.to_string())
            .set("excellent_latency_ms", opt.cadence.excellent_latency_ms.to_string())
            .set("good_latency_ms", opt.cadence.good_latency_ms.to_string());

        ini.with_section(Some("ranker"))
            .set("default_top_n", opt.ranker.default_top_n.to_string())
            .set("report_top_n", opt.ranker.report_top_n.to_string());

        ini.with_section(Some("cooldown"))
            .set("outcome_window", opt.cooldown.outcome_window.to_string());

        let mut logging = ini.with_section(Some("logging"));
        logging.set("filter", self.logging.filter.clone());
        if let Some(ref directory) = self.logging.directory {
            logging.set("directory", directory.display().to_string());
        }

        ini
    }

    /// Reject combinations the optimizer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let opt = &self.optimizer;
        let cache = &opt.entity_cache;

        if cache.night_start_hour > 24 || cache.night_end_hour > 24 {
            return Err(invalid(
                "cache.night_start_hour/night_end_hour",
                format!("{}..{}", cache.night_start_hour, cache.night_end_hour),
                "hours must be within 0..=24",
            ));
        }
        if opt.cadence.latency_window == 0 {
            return Err(invalid("cadence.latency_window", "0", "must be at least 1"));
        }
        if opt.cadence.excellent_latency_ms > opt.cadence.good_latency_ms {
            return Err(invalid(
                "cadence.excellent_latency_ms",
                opt.cadence.excellent_latency_ms.to_string(),
                "must not exceed cadence.good_latency_ms",
            ));
        }
        if opt.cooldown.outcome_window == 0 || opt.cooldown.outcome_window > MAX_OUTCOME_WINDOW {
            return Err(invalid(
                "cooldown.outcome_window",
                opt.cooldown.outcome_window.to_string(),
                "must be within 1..=32",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl Into<String>, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
        reason: reason.to_string(),
    }
}

fn read<T>(ini: &Ini, section: &str, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(raw) = ini.get_from(Some(section), key) {
        *target = raw.trim().parse().map_err(|e: T::Err| {
            invalid(&format!("{section}.{key}"), raw, &e.to_string())
        })?;
    }
    Ok(())
}

fn read_secs(ini: &Ini, section: &str, key: &str, target: &mut Duration) -> Result<(), ConfigError> {
    let mut secs = target.as_secs();
    read(ini, section, key, &mut secs)?;
    *target = Duration::from_secs(secs);
    Ok(())
}
