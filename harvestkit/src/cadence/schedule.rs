//! Time-of-day polling schedule.
//!
//! Resources mature in four daily peak windows. Polling is fast inside them,
//! slow in the small hours and moderate otherwise:
//!
//! | Hours                    | Interval |
//! |--------------------------|----------|
//! | 0-1, 7-8, 12-13, 17-18   | 2 min    |
//! | 2-6                      | 30 min   |
//! | everything else          | 5 min    |

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::ComputeError;

/// Interval inside a peak window.
pub const PEAK_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Interval during the quiet night hours.
pub const QUIET_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Interval at any other hour, and the fallback for invalid input.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

const QUIET_HOURS: RangeInclusive<u32> = 2..=6;

/// Daily window in which resources tend to mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakPeriod {
    Morning,
    Noon,
    Evening,
    Midnight,
}

impl PeakPeriod {
    /// All periods in the order they start during a day, midnight first.
    pub const ALL: [PeakPeriod; 4] = [
        PeakPeriod::Midnight,
        PeakPeriod::Morning,
        PeakPeriod::Noon,
        PeakPeriod::Evening,
    ];

    /// Local hours covered by the period.
    pub fn hours(self) -> RangeInclusive<u32> {
        match self {
            PeakPeriod::Morning => 7..=8,
            PeakPeriod::Noon => 12..=13,
            PeakPeriod::Evening => 17..=18,
            PeakPeriod::Midnight => 0..=1,
        }
    }

    /// First local hour of the period.
    pub fn start_hour(self) -> u32 {
        *self.hours().start()
    }

    /// Period containing `hour`, if any.
    pub fn for_hour(hour: u32) -> Option<PeakPeriod> {
        Self::ALL
            .into_iter()
            .find(|period| period.hours().contains(&hour))
    }

    /// Whether `hour` falls inside any peak period.
    pub fn is_peak_hour(hour: u32) -> bool {
        Self::for_hour(hour).is_some()
    }

    pub fn label(self) -> &'static str {
        match self {
            PeakPeriod::Morning => "morning",
            PeakPeriod::Noon => "noon",
            PeakPeriod::Evening => "evening",
            PeakPeriod::Midnight => "midnight",
        }
    }
}

impl fmt::Display for PeakPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Polling interval at the given local hour.
pub(crate) fn try_interval_for_hour(hour: u32) -> Result<Duration, ComputeError> {
    if hour > 23 {
        return Err(ComputeError::InvalidHour(hour));
    }
    if PeakPeriod::is_peak_hour(hour) {
        Ok(PEAK_INTERVAL)
    } else if QUIET_HOURS.contains(&hour) {
        Ok(QUIET_INTERVAL)
    } else {
        Ok(DEFAULT_INTERVAL)
    }
}

/// Human-readable name of the schedule band `hour` belongs to.
pub fn period_label(hour: u32) -> &'static str {
    match PeakPeriod::for_hour(hour) {
        Some(period) => period.label(),
        None if QUIET_HOURS.contains(&hour) => "quiet",
        None => "regular",
    }
}

/// Start of the first peak period strictly after `now`.
///
/// Returns `None` only when the next day is outside chrono's calendar range.
pub fn next_peak_start(now: NaiveDateTime) -> Option<(PeakPeriod, NaiveDateTime)> {
    let today = now.date();
    let tomorrow = today.succ_opt()?;

    [today, tomorrow]
        .into_iter()
        .flat_map(|day| {
            PeakPeriod::ALL.into_iter().filter_map(move |period| {
                day.and_hms_opt(period.start_hour(), 0, 0)
                    .map(|start| (period, start))
            })
        })
        .filter(|(_, start)| *start > now)
        .min_by_key(|(_, start)| *start)
}
