//! Batch vs single collection statistics.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::percent;
use crate::clock::{SharedClock, MINUTE_MS};

/// Counters describing how collections were issued and how long they took.
#[derive(Debug)]
pub struct CollectionStats {
    clock: SharedClock,
    batch_count: AtomicU64,
    single_count: AtomicU64,
    single_fail_count: AtomicU64,
    batch_success_count: AtomicU64,
    batch_fail_count: AtomicU64,
    total_collected: AtomicU64,
    total_batch_ms: AtomicU64,
    total_single_ms: AtomicU64,
    started_at: AtomicI64,
}

impl CollectionStats {
    /// Create empty stats whose runtime starts now.
    pub fn new(clock: SharedClock) -> Self {
        let started_at = AtomicI64::new(clock.now());
        Self {
            clock,
            batch_count: AtomicU64::new(0),
            single_count: AtomicU64::new(0),
            single_fail_count: AtomicU64::new(0),
            batch_success_count: AtomicU64::new(0),
            batch_fail_count: AtomicU64::new(0),
            total_collected: AtomicU64::new(0),
            total_batch_ms: AtomicU64::new(0),
            total_single_ms: AtomicU64::new(0),
            started_at,
        }
    }

    /// Record one batched collection request.
    pub fn record_batch(&self, success: bool, duration: Duration, collected: u64) {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.batch_success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batch_fail_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_batch_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.total_collected.fetch_add(collected, Ordering::Relaxed);
    }

    /// Record one single-entity collection request.
    pub fn record_single(&self, duration: Duration, collected: u64) {
        self.single_count.fetch_add(1, Ordering::Relaxed);
        self.total_single_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.total_collected.fetch_add(collected, Ordering::Relaxed);
    }

    /// Record a single-entity request that failed.
    ///
    /// Failed singles count towards `single_count` and the average duration
    /// but are also tallied separately, so the failure stays visible.
    pub fn record_single_failure(&self, duration: Duration) {
        self.single_count.fetch_add(1, Ordering::Relaxed);
        self.single_fail_count.fetch_add(1, Ordering::Relaxed);
        self.total_single_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy with derived averages.
    pub fn snapshot(&self) -> CollectionSnapshot {
        let batch_count = self.batch_count.load(Ordering::Relaxed);
        let single_count = self.single_count.load(Ordering::Relaxed);
        let batch_success_count = self.batch_success_count.load(Ordering::Relaxed);
        let total_batch_ms = self.total_batch_ms.load(Ordering::Relaxed);
        let total_single_ms = self.total_single_ms.load(Ordering::Relaxed);
        let elapsed = self.clock.now() - self.started_at.load(Ordering::Relaxed);

        CollectionSnapshot {
            batch_count,
            single_count,
            single_fail_count: self.single_fail_count.load(Ordering::Relaxed),
            batch_success_count,
            batch_fail_count: self.batch_fail_count.load(Ordering::Relaxed),
            total_collected: self.total_collected.load(Ordering::Relaxed),
            batch_success_rate: percent(batch_success_count, batch_count),
            avg_batch_ms: total_batch_ms.checked_div(batch_count).unwrap_or(0),
            avg_single_ms: total_single_ms.checked_div(single_count).unwrap_or(0),
            runtime_minutes: (elapsed.max(0) / MINUTE_MS) as u64,
        }
    }

    /// Zero the counters and restart the runtime.
    pub fn reset(&self) {
        self.batch_count.store(0, Ordering::Relaxed);
        self.single_count.store(0, Ordering::Relaxed);
        self.single_fail_count.store(0, Ordering::Relaxed);
        self.batch_success_count.store(0, Ordering::Relaxed);
        self.batch_fail_count.store(0, Ordering::Relaxed);
        self.total_collected.store(0, Ordering::Relaxed);
        self.total_batch_ms.store(0, Ordering::Relaxed);
        self.total_single_ms.store(0, Ordering::Relaxed);
        self.started_at.store(self.clock.now(), Ordering::Relaxed);
        tracing::debug!("Collection stats reset");
    }
}

/// Point-in-time copy of [`CollectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    pub batch_count: u64,
    pub single_count: u64,
    pub single_fail_count: u64,
    pub batch_success_count: u64,
    pub batch_fail_count: u64,
    pub total_collected: u64,
    /// Percentage of batches that succeeded.
    pub batch_success_rate: f64,
    pub avg_batch_ms: u64,
    pub avg_single_ms: u64,
    pub runtime_minutes: u64,
}

impl CollectionSnapshot {
    /// True when no collection has been recorded.
    pub fn is_empty(&self) -> bool {
        self.batch_count == 0 && self.single_count == 0
    }
}
