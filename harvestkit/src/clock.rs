//! Time source abstraction.
//!
//! Every component reads time through the [`Clock`] trait so tests and
//! simulations can drive TTLs, cooldowns and predictions deterministically
//! instead of sleeping.
//!
//! Timestamps are wall-clock milliseconds since the Unix epoch. The core is
//! not monotonic-clock safe: an adjusted system clock can transiently skew
//! TTL and cooldown arithmetic.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// One minute in milliseconds.
pub const MINUTE_MS: i64 = 60 * 1000;

/// One hour in milliseconds.
pub const HOUR_MS: i64 = 60 * MINUTE_MS;

/// One day in milliseconds.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// 2025-01-15 00:00:00 UTC, the base day for [`ManualClock::at_hour`].
const REFERENCE_DAY_MS: Timestamp = 1_736_899_200_000;

/// Convert a duration to whole milliseconds, saturating on overflow.
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;

    /// Current local date-time, used for hour-of-day decisions.
    fn local_time(&self) -> NaiveDateTime;

    /// Current local hour in `0..=23`.
    fn hour_of_day(&self) -> u32 {
        self.local_time().hour()
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the system wall clock and local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now().timestamp_millis()
    }

    fn local_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and offline simulation.
///
/// Local time is interpreted as UTC so hour-of-day results do not depend on
/// the host timezone.
///
/// # Example
///
/// ```
/// use harvestkit::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::at_hour(13);
/// assert_eq!(clock.hour_of_day(), 13);
///
/// clock.advance(Duration::from_secs(3600));
/// assert_eq!(clock.hour_of_day(), 14);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given timestamp.
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start),
        }
    }

    /// Create a clock at the top of the given UTC hour on a fixed reference day.
    pub fn at_hour(hour: u32) -> Self {
        Self::new(REFERENCE_DAY_MS + i64::from(hour % 24) * HOUR_MS)
    }

    /// Move the clock to an absolute timestamp.
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(duration_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst)
    }

    fn local_time(&self) -> NaiveDateTime {
        DateTime::from_timestamp_millis(self.now())
            .map(|dt| dt.naive_utc())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_at_hour() {
        for hour in 0..24 {
            let clock = ManualClock::at_hour(hour);
            assert_eq!(clock.hour_of_day(), hour);
            assert_eq!(clock.local_time().minute(), 0);
        }
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), 1_500);

        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_manual_clock_wraps_to_next_day() {
        let clock = ManualClock::at_hour(23);
        clock.advance(Duration::from_secs(2 * 3600));
        assert_eq!(clock.hour_of_day(), 1);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2024-01-01 00:00:00 UTC
        assert!(SystemClock.now() > 1_704_067_200_000);
        assert!(SystemClock.hour_of_day() < 24);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_secs(2)), 2_000);
        assert_eq!(duration_ms(Duration::MAX), i64::MAX);
    }
}
