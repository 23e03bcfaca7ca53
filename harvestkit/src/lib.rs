//! Harvestkit - adaptive collection optimization for polling harvesters
//!
//! This library decides, for a loop that periodically collects a decaying
//! resource from many remote entities, whom to poll, whether a poll can be
//! skipped, how often to poll and how many entities to request per batch.
//! Decisions are based on yield history, observed latency and time of day.
//!
//! # Components
//!
//! - [`cache`]: entity list cache and negative-result (empty/shield) cache
//! - [`predict`]: maturity prediction and peak-period history
//! - [`cadence`]: polling interval table and latency-driven batch sizing
//! - [`rank`]: yield history and priority scoring
//! - [`cooldown`]: success-rate driven cooldown between rounds
//! - [`stats`]: counters and snapshots
//! - [`optimizer`]: [`HarvestOptimizer`], owning all of the above
//! - [`harvest`]: cycle and loop driver over an [`EntityPoller`]
//!
//! All state lives in memory for the lifetime of the process. Every operation
//! is safe to call from several threads at once.
//!
//! # Example
//!
//! ```
//! use harvestkit::clock::{ManualClock, SharedClock};
//! use harvestkit::config::OptimizerConfig;
//! use harvestkit::{HarvestOptimizer, PollOutcome};
//! use std::sync::Arc;
//!
//! let clock: SharedClock = Arc::new(ManualClock::at_hour(12));
//! let optimizer = HarvestOptimizer::with_clock(OptimizerConfig::default(), clock);
//!
//! optimizer.record_poll("alice", &PollOutcome::found(40, 120));
//! optimizer.record_poll("bob", &PollOutcome::empty(120));
//!
//! let plan = optimizer.plan_cycle(&["bob", "alice", "carol"]);
//! assert_eq!(plan.skipped, vec!["bob"]);
//! assert_eq!(plan.batches, vec![vec!["alice", "carol"]]);
//! ```

pub mod cache;
pub mod cadence;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod harvest;
pub mod logging;
pub mod optimizer;
pub mod predict;
pub mod rank;
pub mod stats;

pub use error::{ComputeError, FetchError, PollError};
pub use harvest::{run_cycle, run_loop, CycleReport, EntityPoller, LoopSummary};
pub use optimizer::{CyclePlan, HarvestOptimizer, OptimizerSnapshot, PollOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
