//! Adaptive cadence and batch-size controller.

use std::time::Duration;

use chrono::{TimeDelta, Timelike};

use super::latency::{LatencyWindow, NetworkQuality};
use super::schedule::{period_label, try_interval_for_hour, DEFAULT_INTERVAL};
use crate::clock::SharedClock;
use crate::config::CadenceConfig;

/// Decides how often to poll and how many entities to request per batch.
///
/// The interval is a pure function of the local hour. The batch size follows
/// the network quality observed over the last few polls.
///
/// # Example
///
/// ```
/// use harvestkit::cadence::{AdaptiveCadenceController, NetworkQuality};
/// use harvestkit::clock::{ManualClock, SharedClock};
/// use harvestkit::config::CadenceConfig;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock: SharedClock = Arc::new(ManualClock::at_hour(13));
/// let cadence = AdaptiveCadenceController::new(CadenceConfig::default(), clock);
///
/// assert_eq!(cadence.current_interval(), Duration::from_secs(120));
///
/// for _ in 0..5 {
///     cadence.record_latency(120);
/// }
/// assert_eq!(cadence.classify_quality(), NetworkQuality::Excellent);
/// assert_eq!(cadence.batch_size(25), 10);
/// assert_eq!(cadence.batch_size(4), 4);
/// ```
#[derive(Debug)]
pub struct AdaptiveCadenceController {
    clock: SharedClock,
    config: CadenceConfig,
    latency: LatencyWindow,
}

impl AdaptiveCadenceController {
    pub fn new(config: CadenceConfig, clock: SharedClock) -> Self {
        let latency = LatencyWindow::new(config.latency_window);
        Self {
            clock,
            config,
            latency,
        }
    }

    /// Polling interval for the given local hour.
    ///
    /// Hours outside `0..=23` fall back to the 5 minute default.
    pub fn next_interval(&self, hour: u32) -> Duration {
        try_interval_for_hour(hour).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default polling interval");
            DEFAULT_INTERVAL
        })
    }

    /// Polling interval at the clock's current local hour.
    pub fn current_interval(&self) -> Duration {
        self.next_interval(self.clock.hour_of_day())
    }

    /// Add a poll latency sample.
    pub fn record_latency(&self, latency_ms: u64) {
        self.latency.record(latency_ms);
    }

    /// Average of the latency window, `None` when it is empty.
    pub fn average_latency(&self) -> Option<f64> {
        self.latency.average().ok()
    }

    /// Number of latency samples currently held.
    pub fn sample_count(&self) -> usize {
        self.latency.len()
    }

    pub fn classify_quality(&self) -> NetworkQuality {
        match self.latency.average() {
            Ok(average) => NetworkQuality::from_average(average, &self.config),
            Err(_) => NetworkQuality::Unknown,
        }
    }

    /// Batch size for `total_items` pending entities.
    ///
    /// Never exceeds either `total_items` or the base size for the current
    /// network quality.
    pub fn batch_size(&self, total_items: usize) -> usize {
        self.classify_quality().base_batch_size().min(total_items)
    }

    /// Forget all latency samples.
    pub fn reset(&self) {
        self.latency.clear();
        tracing::debug!("Cadence latency window cleared");
    }

    /// Describe when the next check happens, e.g.
    /// `"next check at 12:32:00 (noon, every 2 min)"`.
    pub fn next_check_description(&self) -> String {
        let now = self.clock.local_time();
        let hour = now.hour();
        let interval = self.next_interval(hour);

        let next = TimeDelta::from_std(interval)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta));

        match next {
            Some(next) => format!(
                "next check at {} ({}, every {} min)",
                next.format("%H:%M:%S"),
                period_label(hour),
                interval.as_secs() / 60
            ),
            None => {
                tracing::warn!(hour, "Next check time is out of range");
                format!(
                    "next check in {} min ({})",
                    interval.as_secs() / 60,
                    period_label(hour)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn controller_at(hour: u32) -> (AdaptiveCadenceController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_hour(hour));
        let controller = AdaptiveCadenceController::new(
            CadenceConfig::default(),
            Arc::clone(&clock) as SharedClock,
        );
        (controller, clock)
    }

    #[test]
    fn test_interval_scenarios() {
        let (controller, _) = controller_at(0);
        assert_eq!(controller.next_interval(13), Duration::from_secs(120));
        assert_eq!(controller.next_interval(3), Duration::from_secs(1800));
        assert_eq!(controller.next_interval(10), Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_hour_falls_back() {
        let (controller, _) = controller_at(0);
        assert_eq!(controller.next_interval(99), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_current_interval_follows_clock() {
        let (controller, clock) = controller_at(12);
        assert_eq!(controller.current_interval(), Duration::from_secs(120));

        clock.advance(Duration::from_secs(3 * 3600));
        assert_eq!(controller.current_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_unknown_quality_without_samples() {
        let (controller, _) = controller_at(10);
        assert_eq!(controller.classify_quality(), NetworkQuality::Unknown);
        assert_eq!(controller.average_latency(), None);
        assert_eq!(controller.batch_size(20), 6);
    }

    #[test]
    fn test_poor_network_shrinks_batches() {
        let (controller, _) = controller_at(10);
        for _ in 0..10 {
            controller.record_latency(800);
        }
        assert_eq!(controller.classify_quality(), NetworkQuality::Poor);
        assert_eq!(controller.batch_size(20), 3);
        assert_eq!(controller.batch_size(0), 0);
    }

    #[test]
    fn test_window_recovers_after_overflow() {
        let (controller, _) = controller_at(10);
        for _ in 0..10 {
            controller.record_latency(900);
        }
        for _ in 0..10 {
            controller.record_latency(100);
        }
        assert_eq!(controller.sample_count(), 10);
        assert_eq!(controller.classify_quality(), NetworkQuality::Excellent);
    }

    #[test]
    fn test_reset_clears_samples() {
        let (controller, _) = controller_at(10);
        controller.record_latency(100);
        controller.reset();
        assert_eq!(controller.classify_quality(), NetworkQuality::Unknown);
    }

    #[test]
    fn test_next_check_description() {
        let (controller, _) = controller_at(12);
        let description = controller.next_check_description();
        assert_eq!(description, "next check at 12:02:00 (noon, every 2 min)");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_batch_size_is_bounded(
                samples in proptest::collection::vec(0u64..2_000, 0..15),
                total_items in 0usize..200,
            ) {
                let (controller, _) = controller_at(10);
                for ms in &samples {
                    controller.record_latency(*ms);
                }

                let base = controller.classify_quality().base_batch_size();
                let size = controller.batch_size(total_items);
                prop_assert!(size <= total_items);
                prop_assert!(size <= base);
                prop_assert_eq!(size, base.min(total_items));
            }
        }
    }
}
