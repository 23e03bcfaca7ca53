//! Per-entity history of yields during peak periods.

use dashmap::DashMap;
use serde::Serialize;

use crate::cadence::PeakPeriod;
use crate::clock::{SharedClock, Timestamp};

/// Last time an entity yielded during each peak period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeakRecord {
    pub morning: Option<Timestamp>,
    pub noon: Option<Timestamp>,
    pub evening: Option<Timestamp>,
    pub midnight: Option<Timestamp>,
}

impl PeakRecord {
    pub fn get(&self, period: PeakPeriod) -> Option<Timestamp> {
        match period {
            PeakPeriod::Morning => self.morning,
            PeakPeriod::Noon => self.noon,
            PeakPeriod::Evening => self.evening,
            PeakPeriod::Midnight => self.midnight,
        }
    }

    fn set(&mut self, period: PeakPeriod, at: Timestamp) {
        let slot = match period {
            PeakPeriod::Morning => &mut self.morning,
            PeakPeriod::Noon => &mut self.noon,
            PeakPeriod::Evening => &mut self.evening,
            PeakPeriod::Midnight => &mut self.midnight,
        };
        *slot = Some(at);
    }
}

/// Remembers in which peak periods each entity tends to yield.
#[derive(Debug)]
pub struct PeakHistory {
    clock: SharedClock,
    records: DashMap<String, PeakRecord>,
}

impl PeakHistory {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            records: DashMap::new(),
        }
    }

    /// Record a yield from `id` now. Ignored outside peak hours.
    ///
    /// Returns the period the yield was recorded under.
    pub fn record(&self, id: &str) -> Option<PeakPeriod> {
        let period = PeakPeriod::for_hour(self.clock.hour_of_day())?;
        let now = self.clock.now();
        self.records
            .entry(id.to_string())
            .or_default()
            .set(period, now);
        Some(period)
    }

    pub fn last_seen(&self, id: &str, period: PeakPeriod) -> Option<Timestamp> {
        self.records.get(id).and_then(|record| record.get(period))
    }

    pub fn get(&self, id: &str) -> Option<PeakRecord> {
        self.records.get(id).map(|record| *record)
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
