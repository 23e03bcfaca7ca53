//! Rolling latency window and network quality classification.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::config::CadenceConfig;
use crate::error::ComputeError;

/// Network quality derived from recent poll latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Excellent,
    Good,
    Poor,
    /// No samples yet.
    Unknown,
}

impl NetworkQuality {
    /// Classify an average latency against the configured thresholds.
    pub fn from_average(average_ms: f64, config: &CadenceConfig) -> Self {
        if average_ms < config.excellent_latency_ms as f64 {
            NetworkQuality::Excellent
        } else if average_ms < config.good_latency_ms as f64 {
            NetworkQuality::Good
        } else {
            NetworkQuality::Poor
        }
    }

    /// Largest batch to request at this quality.
    pub fn base_batch_size(self) -> usize {
        match self {
            NetworkQuality::Excellent => 10,
            NetworkQuality::Good => 6,
            NetworkQuality::Poor => 3,
            NetworkQuality::Unknown => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NetworkQuality::Excellent => "excellent",
            NetworkQuality::Good => "good",
            NetworkQuality::Poor => "poor",
            NetworkQuality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed-capacity ring of latency samples in milliseconds.
///
/// Writers claim a slot through the cursor and store into it, so recording
/// never blocks. A reader racing a writer may see the slot's previous sample;
/// the average is a best-effort signal.
#[derive(Debug)]
pub(crate) struct LatencyWindow {
    slots: Box<[AtomicU64]>,
    cursor: AtomicUsize,
    filled: AtomicUsize,
}

impl LatencyWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| AtomicU64::new(0)).collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            filled: AtomicUsize::new(0),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Record a sample, overwriting the oldest one when full.
    pub(crate) fn record(&self, latency_ms: u64) {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.capacity();
        self.slots[slot].store(latency_ms, Ordering::Relaxed);

        let capacity = self.capacity();
        let _ = self
            .filled
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |filled| {
                (filled < capacity).then_some(filled + 1)
            });
    }

    pub(crate) fn average(&self) -> Result<f64, ComputeError> {
        let filled = self.len();
        if filled == 0 {
            return Err(ComputeError::EmptyWindow("latency"));
        }
        let sum: u128 = self.slots[..filled]
            .iter()
            .map(|slot| u128::from(slot.load(Ordering::Relaxed)))
            .sum();
        Ok(sum as f64 / filled as f64)
    }

    pub(crate) fn len(&self) -> usize {
        self.filled.load(Ordering::Relaxed).min(self.capacity())
    }

    pub(crate) fn clear(&self) {
        self.filled.store(0, Ordering::Relaxed);
        self.cursor.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_drops_oldest() {
        let window = LatencyWindow::new(3);
        for ms in [1000, 10, 20, 30] {
            window.record(ms);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Ok(20.0));
    }

    #[test]
    fn test_clear_restarts_window() {
        let window = LatencyWindow::new(3);
        for ms in [100, 200, 300, 400] {
            window.record(ms);
        }
        window.clear();
        assert_eq!(window.len(), 0);

        window.record(50);
        assert_eq!(window.len(), 1);
        assert_eq!(window.average(), Ok(50.0));
    }

    #[test]
    fn test_concurrent_records_stay_bounded() {
        let window = std::sync::Arc::new(LatencyWindow::new(10));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let window = std::sync::Arc::clone(&window);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        window.record(t * 10 + i % 10);
                        assert!(window.len() <= 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(window.len(), 10);
        let average = window.average().unwrap();
        assert!((0.0..80.0).contains(&average), "average {average}");
    }

    #[test]
    fn test_empty_window_average_is_error() {
        let window = LatencyWindow::new(10);
        assert_eq!(window.average(), Err(ComputeError::EmptyWindow("latency")));
    }

    #[test]
    fn test_classification_thresholds() {
        let config = CadenceConfig::default();
        assert_eq!(NetworkQuality::from_average(199.9, &config), NetworkQuality::Excellent);
        assert_eq!(NetworkQuality::from_average(200.0, &config), NetworkQuality::Good);
        assert_eq!(NetworkQuality::from_average(499.0, &config), NetworkQuality::Good);
        assert_eq!(NetworkQuality::from_average(500.0, &config), NetworkQuality::Poor);
    }

    #[test]
    fn test_base_batch_sizes() {
        assert_eq!(NetworkQuality::Excellent.base_batch_size(), 10);
        assert_eq!(NetworkQuality::Good.base_batch_size(), 6);
        assert_eq!(NetworkQuality::Poor.base_batch_size(), 3);
        assert_eq!(NetworkQuality::Unknown.base_batch_size(), 6);
    }
}
