//! Polling cadence and batch sizing.
//!
//! ```text
//! local hour ──► interval table ──────────────► sleep between cycles
//! poll latency ──► rolling window ──► quality ──► batch size
//! ```

mod controller;
mod latency;
mod schedule;

pub use controller::AdaptiveCadenceController;
pub use latency::NetworkQuality;
pub use schedule::{
    next_peak_start, period_label, PeakPeriod, DEFAULT_INTERVAL, PEAK_INTERVAL, QUIET_INTERVAL,
};
