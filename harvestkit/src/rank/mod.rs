//! Yield-based entity ranking.
//!
//! Every poll outcome is folded into a per-entity [`YieldRecord`]. The
//! records drive a priority score used to pick which entities are worth
//! polling at all.
//!
//! # Scoring
//!
//! ```text
//! score = average - 10 * zero_streak
//!         - 20   if shielded in more than half the samples
//!         + 10   if collected within the last 24 hours
//! score = max(score, 0)
//! ```

use std::cmp::Reverse;

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::{SharedClock, Timestamp, DAY_MS};
use crate::config::RankerConfig;

/// Penalty per consecutive empty poll.
const ZERO_STREAK_PENALTY: i64 = 10;

/// Penalty for entities shielded in most polls.
const SHIELDED_PENALTY: i64 = 20;

/// Bonus for entities collected within [`RECENT_WINDOW_MS`].
const RECENT_BONUS: i64 = 10;

const RECENT_WINDOW_MS: i64 = DAY_MS;

/// Yield history of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YieldRecord {
    pub id: String,
    pub cumulative_yield: u64,
    pub sample_count: u64,
    pub consecutive_zero_streak: u64,
    pub shielded_count: u64,
    pub last_collected_at: Timestamp,
    /// `cumulative_yield / sample_count`, truncated.
    pub average: u64,
}

impl YieldRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            cumulative_yield: 0,
            sample_count: 0,
            consecutive_zero_streak: 0,
            shielded_count: 0,
            last_collected_at: 0,
            average: 0,
        }
    }

    fn observe(&mut self, amount: u64, was_shielded: bool, now: Timestamp) {
        if was_shielded {
            self.shielded_count += 1;
        } else if amount > 0 {
            self.cumulative_yield = self.cumulative_yield.saturating_add(amount);
            self.consecutive_zero_streak = 0;
        } else {
            self.consecutive_zero_streak += 1;
        }

        self.sample_count += 1;
        self.last_collected_at = now;
        self.average = self
            .cumulative_yield
            .checked_div(self.sample_count)
            .unwrap_or(0);
    }

    /// Priority score at time `now`; higher is polled first.
    pub fn priority_score(&self, now: Timestamp) -> i64 {
        let average = i64::try_from(self.average).unwrap_or(i64::MAX);
        let streak = i64::try_from(self.consecutive_zero_streak).unwrap_or(i64::MAX);
        let mut score = average.saturating_sub(streak.saturating_mul(ZERO_STREAK_PENALTY));

        if self.shielded_count as f64 > self.sample_count as f64 * 0.5 {
            score = score.saturating_sub(SHIELDED_PENALTY);
        }
        if self.last_collected_at > 0 && now - self.last_collected_at < RECENT_WINDOW_MS {
            score = score.saturating_add(RECENT_BONUS);
        }

        score.max(0)
    }
}

/// Ranks entities by their yield history.
#[derive(Debug)]
pub struct YieldRanker {
    clock: SharedClock,
    config: RankerConfig,
    records: DashMap<String, YieldRecord>,
}

impl YieldRanker {
    pub fn new(config: RankerConfig, clock: SharedClock) -> Self {
        Self {
            clock,
            config,
            records: DashMap::new(),
        }
    }

    /// Fold one poll outcome into the entity's record.
    pub fn record(&self, id: &str, amount: u64, was_shielded: bool) {
        let now = self.clock.now();
        self.records
            .entry(id.to_string())
            .or_insert_with(|| YieldRecord::new(id))
            .observe(amount, was_shielded, now);
    }

    /// Priority score of `id`; 0 for entities never recorded.
    pub fn priority_score(&self, id: &str) -> i64 {
        let now = self.clock.now();
        self.records
            .get(id)
            .map(|record| record.priority_score(now))
            .unwrap_or(0)
    }

    /// The `n` highest scoring ids, best first. Ties keep input order.
    pub fn filter_top_n<S: AsRef<str>>(&self, ids: &[S], n: usize) -> Vec<String> {
        let now = self.clock.now();
        let mut scored: Vec<(i64, &str)> = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                let score = self
                    .records
                    .get(id)
                    .map(|record| record.priority_score(now))
                    .unwrap_or(0);
                (score, id)
            })
            .collect();

        scored.sort_by_key(|(score, _)| Reverse(*score));
        scored
            .into_iter()
            .take(n)
            .map(|(_, id)| id.to_string())
            .collect()
    }

    /// [`filter_top_n`](Self::filter_top_n) with the configured default size.
    pub fn filter_default<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        self.filter_top_n(ids, self.config.default_top_n)
    }

    /// The `n` records with the highest average yield.
    pub fn top_by_average(&self, n: usize) -> Vec<YieldRecord> {
        let mut records: Vec<YieldRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.average.cmp(&a.average).then_with(|| a.id.cmp(&b.id)));
        records.truncate(n);
        records
    }

    pub fn get(&self, id: &str) -> Option<YieldRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn reset(&self) {
        self.records.clear();
        tracing::info!("Yield ranker reset");
    }
}
