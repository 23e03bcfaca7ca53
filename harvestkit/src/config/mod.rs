//! Optimizer configuration.
//!
//! Component settings live in [`OptimizerConfig`]; [`ConfigFile`] maps them
//! (plus logging settings) to and from an INI file.

mod file;
mod settings;

pub use file::{config_file_path, ConfigError, ConfigFile};
pub use settings::{
    CadenceConfig, CooldownConfig, EntityCacheConfig, NegativeCacheConfig, OptimizerConfig,
    RankerConfig, DEFAULT_DAY_TTL, DEFAULT_EMPTY_TTL, DEFAULT_EXCELLENT_LATENCY_MS,
    DEFAULT_GOOD_LATENCY_MS, DEFAULT_LATENCY_WINDOW, DEFAULT_MAX_GENERATION_LAG,
    DEFAULT_NIGHT_END_HOUR, DEFAULT_NIGHT_START_HOUR, DEFAULT_NIGHT_TTL, DEFAULT_OUTCOME_WINDOW,
    DEFAULT_REPORT_TOP_N, DEFAULT_SHIELD_DURATION, DEFAULT_TOP_N, MAX_OUTCOME_WINDOW,
};
