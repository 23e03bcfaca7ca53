//! Tuning parameters for each optimizer component.
//!
//! Defaults reproduce the documented behaviour; every field can be
//! overridden through the INI file (see [`ConfigFile`](super::ConfigFile)).

use std::time::Duration;

// ==================== Entity Cache Defaults ====================

/// Entity list TTL during the day.
pub const DEFAULT_DAY_TTL: Duration = Duration::from_secs(5 * 60);

/// Entity list TTL during the night window.
pub const DEFAULT_NIGHT_TTL: Duration = Duration::from_secs(30 * 60);

/// First local hour of the night window (inclusive).
pub const DEFAULT_NIGHT_START_HOUR: u32 = 0;

/// Last local hour of the night window (exclusive).
pub const DEFAULT_NIGHT_END_HOUR: u32 = 6;

/// Entries more than this many generations away from the current one are swept.
pub const DEFAULT_MAX_GENERATION_LAG: u64 = 2;

// ==================== Negative Cache Defaults ====================

/// How long an empty poll result suppresses further polls.
pub const DEFAULT_EMPTY_TTL: Duration = Duration::from_secs(5 * 60);

/// Shield validity when the caller does not know the shield end time.
pub const DEFAULT_SHIELD_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

// ==================== Cadence Defaults ====================

/// Number of latency samples kept for network-quality classification.
pub const DEFAULT_LATENCY_WINDOW: usize = 10;

/// Average latency below this is classified as excellent (ms).
pub const DEFAULT_EXCELLENT_LATENCY_MS: u64 = 200;

/// Average latency below this is classified as good (ms).
pub const DEFAULT_GOOD_LATENCY_MS: u64 = 500;

// ==================== Ranker Defaults ====================

/// Candidates kept by `filter_top_n` when the caller does not choose.
pub const DEFAULT_TOP_N: usize = 100;

/// Entities listed in the full report.
pub const DEFAULT_REPORT_TOP_N: usize = 10;

// ==================== Cooldown Defaults ====================

/// Number of recent attempts used for the success rate.
pub const DEFAULT_OUTCOME_WINDOW: usize = 10;

/// Largest supported outcome window; outcomes are kept as a bit history.
pub const MAX_OUTCOME_WINDOW: usize = 32;

/// Entity list cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCacheConfig {
    /// TTL outside the night window.
    pub day_ttl: Duration,
    /// TTL inside the night window.
    pub night_ttl: Duration,
    /// Night window start hour (inclusive).
    pub night_start_hour: u32,
    /// Night window end hour (exclusive).
    pub night_end_hour: u32,
    /// Maximum generation distance kept by the sweep.
    pub max_generation_lag: u64,
}

impl Default for EntityCacheConfig {
    fn default() -> Self {
        Self {
            day_ttl: DEFAULT_DAY_TTL,
            night_ttl: DEFAULT_NIGHT_TTL,
            night_start_hour: DEFAULT_NIGHT_START_HOUR,
            night_end_hour: DEFAULT_NIGHT_END_HOUR,
            max_generation_lag: DEFAULT_MAX_GENERATION_LAG,
        }
    }
}

impl EntityCacheConfig {
    /// TTL that applies at the given local hour.
    pub fn ttl_for_hour(&self, hour: u32) -> Duration {
        if self.is_night_hour(hour) {
            self.night_ttl
        } else {
            self.day_ttl
        }
    }

    /// Whether `hour` falls in the night window.
    ///
    /// A window whose start is after its end wraps past midnight, so
    /// `22..6` covers 22:00 through 05:59. Equal bounds mean no night window.
    pub fn is_night_hour(&self, hour: u32) -> bool {
        let (start, end) = (self.night_start_hour, self.night_end_hour);
        if start <= end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }
}

/// Empty-result and shield cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeCacheConfig {
    pub empty_ttl: Duration,
    pub default_shield_duration: Duration,
}

impl Default for NegativeCacheConfig {
    fn default() -> Self {
        Self {
            empty_ttl: DEFAULT_EMPTY_TTL,
            default_shield_duration: DEFAULT_SHIELD_DURATION,
        }
    }
}

/// Cadence and batch-size controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CadenceConfig {
    pub latency_window: usize,
    pub excellent_latency_ms: u64,
    pub good_latency_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            latency_window: DEFAULT_LATENCY_WINDOW,
            excellent_latency_ms: DEFAULT_EXCELLENT_LATENCY_MS,
            good_latency_ms: DEFAULT_GOOD_LATENCY_MS,
        }
    }
}

/// Yield ranker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RankerConfig {
    pub default_top_n: usize,
    pub report_top_n: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            default_top_n: DEFAULT_TOP_N,
            report_top_n: DEFAULT_REPORT_TOP_N,
        }
    }
}

/// Adaptive cooldown configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownConfig {
    pub outcome_window: usize,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            outcome_window: DEFAULT_OUTCOME_WINDOW,
        }
    }
}

/// Configuration for the whole optimizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerConfig {
    pub entity_cache: EntityCacheConfig,
    pub negative: NegativeCacheConfig,
    pub cadence: CadenceConfig,
    pub ranker: RankerConfig,
    pub cooldown: CooldownConfig,
}

impl OptimizerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }
}
