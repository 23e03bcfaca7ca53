//! Skip/hit counters shared by the caches.
//!
//! # Thread Safety
//!
//! `StatsRecorder` uses relaxed atomic operations for lock-free updates. A
//! snapshot taken while other threads are recording may mix counts from
//! before and after a concurrent update; each counter on its own is exact.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::percent;

/// Atomic attempt/skip/hit/miss counters.
///
/// # Example
///
/// ```
/// use harvestkit::stats::StatsRecorder;
///
/// let stats = StatsRecorder::new();
/// stats.increment_total();
/// stats.increment_skipped();
/// stats.increment_hits();
///
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.total, 1);
/// assert_eq!(snapshot.skip_rate, 100.0);
/// ```
#[derive(Debug, Default)]
pub struct StatsRecorder {
    total: AtomicU64,
    skipped: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsRecorder {
    /// Create a recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one lookup.
    pub fn increment_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one lookup that resulted in a skipped remote call.
    pub fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one lookup answered from cached state.
    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one lookup that found nothing usable in cache.
    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        StatsSnapshot {
            total,
            skipped,
            hits,
            misses,
            skip_rate: percent(skipped, total),
            hit_rate: percent(hits, total),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a [`StatsRecorder`].
///
/// Rates are percentages in `0.0..=100.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub skipped: u64,
    pub hits: u64,
    pub misses: u64,
    pub skip_rate: f64,
    pub hit_rate: f64,
}

impl StatsSnapshot {
    /// True when nothing has been recorded.
    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.skipped == 0 && self.hits == 0 && self.misses == 0
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, skipped: {} ({:.1}%), hits: {} ({:.1}%)",
            self.total, self.skipped, self.skip_rate, self.hits, self.hit_rate
        )
    }
}
