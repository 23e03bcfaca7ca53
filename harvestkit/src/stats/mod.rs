//! Bookkeeping counters for the optimization core.
//!
//! Lock-free atomic counters with point-in-time snapshots for reporting:
//!
//! ```text
//! Callers ─────► StatsRecorder / CollectionStats ─────► Snapshot ─────► report, CLI
//!                (atomic counters)                     (plain copy)
//! ```
//!
//! Counters carry no decision logic; they only describe what the caches and
//! the harvesting loop did.

mod collect;
mod recorder;

pub use collect::{CollectionSnapshot, CollectionStats};
pub use recorder::{StatsRecorder, StatsSnapshot};

/// Percentage of `part` in `total`, 0 when `total` is 0.
pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_zero_total() {
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_percent() {
        assert!((percent(1, 4) - 25.0).abs() < f64::EPSILON);
    }
}
