//! Generation-stamped entity list cache.
//!
//! Holds the list of remote entities (friends) the harvesting loop may poll.
//! The list is refreshed from an [`EntityFetcher`] when it is older than a
//! time-of-day dependent TTL: 30 minutes during the night window, 5 minutes
//! otherwise.
//!
//! # Generations
//!
//! Every refresh bumps a generation counter and every write stamps the entry
//! with the generation current at write time. After a refresh, entries more
//! than [`max_generation_lag`](crate::config::EntityCacheConfig) generations
//! away from the current one are swept, so an entity that stops appearing in
//! the fetched list disappears after a few refreshes.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::{duration_ms, SharedClock, Timestamp};
use crate::config::EntityCacheConfig;
use crate::error::FetchError;
use crate::stats::{StatsRecorder, StatsSnapshot};

/// Entity as reported by the remote entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub id: String,
    pub display_name: String,
    pub can_collect: bool,
}

impl EntitySummary {
    /// Create a collectable entity summary.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            can_collect: true,
        }
    }

    /// Set whether the entity currently has anything to collect.
    pub fn with_can_collect(mut self, can_collect: bool) -> Self {
        self.can_collect = can_collect;
        self
    }
}

/// Cached entity with bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub id: String,
    pub display_name: String,
    pub can_collect: bool,
    /// Last time the entity was observed to have something to collect.
    pub last_observed_at: Timestamp,
    /// Cache generation at write time.
    pub generation: u64,
    /// Write time.
    pub updated_at: Timestamp,
}

impl CacheEntry {
    /// Create an entry; generation and write time are stamped on insert.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            can_collect: true,
            last_observed_at: 0,
            generation: 0,
            updated_at: 0,
        }
    }

    pub fn with_can_collect(mut self, can_collect: bool) -> Self {
        self.can_collect = can_collect;
        self
    }

    pub fn with_last_observed_at(mut self, at: Timestamp) -> Self {
        self.last_observed_at = at;
        self
    }
}

impl From<EntitySummary> for CacheEntry {
    fn from(summary: EntitySummary) -> Self {
        CacheEntry::new(summary.id, summary.display_name).with_can_collect(summary.can_collect)
    }
}

/// Source of the remote entity list.
///
/// Implementations may return the full list or a partial page; the cache
/// merges whatever comes back and makes no ordering assumptions.
pub trait EntityFetcher: Send + Sync {
    /// Fetch the current entity list.
    fn fetch_entities(&self) -> Result<Vec<EntitySummary>, FetchError>;
}

/// Fetcher that never returns anything.
///
/// Useful when the cache is fed exclusively through `upsert`/`upsert_batch`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFetcher;

impl EntityFetcher for EmptyFetcher {
    fn fetch_entities(&self) -> Result<Vec<EntitySummary>, FetchError> {
        Ok(Vec::new())
    }
}

/// Fetcher serving a fixed list, for tests and simulation.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    entities: Vec<EntitySummary>,
}

impl StaticFetcher {
    pub fn new(entities: Vec<EntitySummary>) -> Self {
        Self { entities }
    }
}

impl EntityFetcher for StaticFetcher {
    fn fetch_entities(&self) -> Result<Vec<EntitySummary>, FetchError> {
        Ok(self.entities.clone())
    }
}

/// TTL and generation aware entity cache.
pub struct EntityCache {
    clock: SharedClock,
    config: EntityCacheConfig,
    fetcher: Arc<dyn EntityFetcher>,
    entries: DashMap<String, CacheEntry>,
    generation: AtomicU64,
    /// Time of the last batch write; 0 when never updated.
    last_update: AtomicI64,
    stats: StatsRecorder,
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("last_update", &self.last_update.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EntityCache {
    /// Create an empty cache that refreshes through `fetcher`.
    pub fn new(
        config: EntityCacheConfig,
        clock: SharedClock,
        fetcher: Arc<dyn EntityFetcher>,
    ) -> Self {
        Self {
            clock,
            config,
            fetcher,
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            last_update: AtomicI64::new(0),
            stats: StatsRecorder::new(),
        }
    }

    /// Return the entity list, refreshing it first when stale, empty or forced.
    ///
    /// Entries are returned sorted by id.
    pub fn get(&self, force_refresh: bool) -> Vec<CacheEntry> {
        self.stats.increment_total();

        if !force_refresh && self.is_valid() {
            self.stats.increment_hits();
            let age_secs = (self.clock.now() - self.last_update.load(Ordering::Relaxed)) / 1000;
            tracing::debug!(age_secs, entries = self.entries.len(), "Using cached entity list");
        } else {
            self.stats.increment_misses();
            self.refresh();
        }

        self.entries()
    }

    /// Look up a single entity without triggering a refresh.
    pub fn get_one(&self, id: &str) -> Option<CacheEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite one entry.
    ///
    /// Does not count as a list refresh: the TTL clock is not reset.
    pub fn upsert(&self, mut entry: CacheEntry) {
        entry.generation = self.generation.load(Ordering::SeqCst);
        entry.updated_at = self.clock.now();
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Insert or overwrite many entries and reset the TTL clock.
    pub fn upsert_batch<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = CacheEntry>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let now = self.clock.now();
        let mut written = 0;

        for mut entry in entries {
            entry.generation = generation;
            entry.updated_at = now;
            self.entries.insert(entry.id.clone(), entry);
            written += 1;
        }

        self.last_update.store(now, Ordering::SeqCst);
        tracing::debug!(written, generation, "Batch updated entity cache");
        written
    }

    /// Remove entries whose generation is more than the configured lag away
    /// from `current_generation`. Returns the number removed.
    pub fn sweep_old_generations(&self, current_generation: u64) -> usize {
        let max_lag = self.config.max_generation_lag;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.generation.abs_diff(current_generation) <= max_lag;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(removed, current_generation, "Swept stale entity generations");
        }
        removed
    }

    /// Note that `id` had something to collect at `at`.
    ///
    /// Leaves generation and write time alone. Returns false for unknown ids.
    pub fn mark_observed(&self, id: &str, at: Timestamp) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.last_observed_at = entry.last_observed_at.max(at);
                true
            }
            None => false,
        }
    }

    /// Refresh from the fetcher regardless of TTL.
    pub fn force_refresh(&self) {
        tracing::info!("Forcing entity list refresh");
        self.refresh();
    }

    /// Whether the cached list is fresh and non-empty.
    pub fn is_valid(&self) -> bool {
        let age = self.clock.now() - self.last_update.load(Ordering::SeqCst);
        age < duration_ms(self.ttl()) && !self.entries.is_empty()
    }

    /// TTL that applies right now.
    pub fn ttl(&self) -> Duration {
        self.config.ttl_for_hour(self.clock.hour_of_day())
    }

    /// Current generation counter.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Snapshot of all entries, sorted by id.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Remove a single entity.
    pub fn remove(&self, id: &str) -> Option<CacheEntry> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    /// Drop every entry and reset the generation and TTL clock.
    pub fn clear(&self) {
        self.entries.clear();
        self.last_update.store(0, Ordering::SeqCst);
        self.generation.store(0, Ordering::SeqCst);
        tracing::debug!("Cleared entity cache");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Query/hit/miss counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero the query counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// One-line query statistics.
    pub fn stats_summary(&self) -> String {
        let stats = self.stats.snapshot();
        format!(
            "entity cache - queries: {}, hits: {} ({:.1}%), misses: {}, entries: {}",
            stats.total,
            stats.hits,
            stats.hit_rate,
            stats.misses,
            self.entries.len()
        )
    }

    /// One-line freshness status.
    pub fn status_summary(&self) -> String {
        let age_secs = (self.clock.now() - self.last_update.load(Ordering::SeqCst)) / 1000;
        format!(
            "entity cache {}, entries: {}, updated {}s ago, generation: {}",
            if self.is_valid() { "valid" } else { "expired" },
            self.entries.len(),
            age_secs,
            self.generation()
        )
    }

    fn refresh(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.fetcher.fetch_entities() {
            Ok(summaries) => {
                let fetched = summaries.len();
                let merged: Vec<CacheEntry> = summaries
                    .into_iter()
                    .map(|summary| {
                        let last_observed_at = self
                            .entries
                            .get(&summary.id)
                            .map(|existing| existing.last_observed_at)
                            .unwrap_or(0);
                        CacheEntry::from(summary).with_last_observed_at(last_observed_at)
                    })
                    .collect();

                self.upsert_batch(merged);
                let removed = self.sweep_old_generations(generation);
                tracing::info!(generation, fetched, removed, "Entity list refreshed");
            }
            Err(e) => {
                tracing::warn!(
                    generation,
                    error = %e,
                    "Entity list refresh failed, keeping cached entries"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use parking_lot::Mutex;

    /// Fetcher whose response can be swapped between calls.
    struct ScriptedFetcher {
        response: Mutex<Result<Vec<EntitySummary>, String>>,
        calls: AtomicU64,
    }

    impl ScriptedFetcher {
        fn returning(entities: Vec<EntitySummary>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(entities)),
                calls: AtomicU64::new(0),
            })
        }

        fn set(&self, response: Result<Vec<EntitySummary>, String>) {
            *self.response.lock() = response;
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EntityFetcher for ScriptedFetcher {
        fn fetch_entities(&self) -> Result<Vec<EntitySummary>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().clone().map_err(FetchError::Remote)
        }
    }

    fn friends(ids: &[&str]) -> Vec<EntitySummary> {
        ids.iter()
            .map(|id| EntitySummary::new(*id, format!("name-{id}")))
            .collect()
    }

    fn cache_at(hour: u32, fetcher: Arc<dyn EntityFetcher>) -> (EntityCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_hour(hour));
        let cache = EntityCache::new(
            EntityCacheConfig::default(),
            Arc::clone(&clock) as SharedClock,
            fetcher,
        );
        (cache, clock)
    }

    #[test]
    fn test_first_get_refreshes() {
        let fetcher = ScriptedFetcher::returning(friends(&["b", "a"]));
        let (cache, _) = cache_at(10, fetcher.clone());

        let entries = cache.get(false);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "a");
        assert_eq!(entries[0].generation, 1);
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn test_fresh_cache_is_served_without_fetch() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, clock) = cache_at(10, fetcher.clone());

        cache.get(false);
        clock.advance(Duration::from_secs(4 * 60));
        cache.get(false);
        assert_eq!(fetcher.calls(), 1);

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_day_ttl_expiry() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, clock) = cache_at(10, fetcher.clone());

        cache.get(false);
        clock.advance(Duration::from_secs(5 * 60));
        assert!(!cache.is_valid());
        cache.get(false);
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_night_ttl_is_longer() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, clock) = cache_at(2, fetcher.clone());

        assert_eq!(cache.ttl(), Duration::from_secs(30 * 60));
        cache.get(false);
        clock.advance(Duration::from_secs(29 * 60));
        assert!(cache.is_valid());
        cache.get(false);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_force_refresh_bypasses_ttl() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, _) = cache_at(10, fetcher.clone());

        cache.get(false);
        cache.get(true);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn test_empty_cache_is_never_valid() {
        let (cache, _) = cache_at(10, Arc::new(EmptyFetcher));
        cache.upsert_batch(Vec::new());
        assert!(!cache.is_valid());
        assert!(cache.get(false).is_empty());
    }

    #[test]
    fn test_failed_refresh_keeps_entries() {
        let fetcher = ScriptedFetcher::returning(friends(&["a", "b"]));
        let (cache, clock) = cache_at(10, fetcher.clone());
        cache.get(false);

        fetcher.set(Err("offline".to_string()));
        clock.advance(Duration::from_secs(10 * 60));
        let entries = cache.get(false);

        assert_eq!(entries.len(), 2);
        assert!(!cache.is_valid(), "failed refresh does not reset the TTL");
    }

    #[test]
    fn test_refresh_preserves_last_observed() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, _) = cache_at(10, fetcher.clone());
        cache.upsert(CacheEntry::new("a", "A").with_last_observed_at(1234));

        cache.force_refresh();
        let entry = cache.get_one("a").unwrap();
        assert_eq!(entry.last_observed_at, 1234);
        assert_eq!(entry.display_name, "name-a");
    }

    #[test]
    fn test_mark_observed() {
        let (cache, _) = cache_at(10, Arc::new(EmptyFetcher));
        cache.upsert(CacheEntry::new("a", "A").with_last_observed_at(500));

        assert!(cache.mark_observed("a", 900));
        assert!(cache.mark_observed("a", 700));
        assert_eq!(cache.get_one("a").unwrap().last_observed_at, 900);
        assert!(!cache.mark_observed("missing", 900));
    }

    #[test]
    fn test_upsert_stamps_generation_and_time() {
        let (cache, clock) = cache_at(10, Arc::new(EmptyFetcher));
        cache.force_refresh();
        cache.force_refresh();

        cache.upsert(CacheEntry::new("x", "X"));
        let entry = cache.get_one("x").unwrap();
        assert_eq!(entry.generation, 2);
        assert_eq!(entry.updated_at, clock.now());
    }

    #[test]
    fn test_entities_missing_from_fetch_age_out() {
        let fetcher = ScriptedFetcher::returning(friends(&["keep", "gone"]));
        let (cache, _) = cache_at(10, fetcher.clone());
        cache.get(true);

        fetcher.set(Ok(friends(&["keep"])));
        cache.get(true); // gen 2, "gone" lag 1
        cache.get(true); // gen 3, lag 2
        assert!(cache.get_one("gone").is_some());

        cache.get(true); // gen 4, lag 3
        assert!(cache.get_one("gone").is_none());
        assert!(cache.get_one("keep").is_some());
    }

    #[test]
    fn test_sweep_old_generations() {
        let (cache, _) = cache_at(10, Arc::new(EmptyFetcher));
        for generation in 0..8u64 {
            cache.generation.store(generation, Ordering::SeqCst);
            cache.upsert(CacheEntry::new(format!("e{generation}"), "e"));
        }

        let removed = cache.sweep_old_generations(4);
        assert_eq!(removed, 3); // e0, e1, e7
        for entry in cache.entries() {
            assert!(entry.generation.abs_diff(4) <= 2);
        }
    }

    #[test]
    fn test_remove_and_clear() {
        let fetcher = ScriptedFetcher::returning(friends(&["a", "b"]));
        let (cache, _) = cache_at(10, fetcher);
        cache.get(false);

        assert!(cache.remove("a").is_some());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 0);
        assert!(!cache.is_valid());
    }

    #[test]
    fn test_summaries() {
        let fetcher = ScriptedFetcher::returning(friends(&["a"]));
        let (cache, _) = cache_at(10, fetcher);
        cache.get(false);
        cache.get(false);

        assert!(cache.stats_summary().contains("queries: 2"));
        assert!(cache.status_summary().contains("valid"));
        assert!(cache.status_summary().contains("generation: 1"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_sweep_keeps_only_recent_generations(
                generations in proptest::collection::vec(0u64..20, 0..40),
                current in 0u64..20,
            ) {
                let (cache, _) = cache_at(10, Arc::new(EmptyFetcher));
                for (i, generation) in generations.iter().enumerate() {
                    cache.generation.store(*generation, Ordering::SeqCst);
                    cache.upsert(CacheEntry::new(format!("e{i}"), "e"));
                }

                cache.sweep_old_generations(current);

                let expected = generations
                    .iter()
                    .filter(|g| g.abs_diff(current) <= 2)
                    .count();
                prop_assert_eq!(cache.len(), expected);
                for entry in cache.entries() {
                    prop_assert!(entry.generation.abs_diff(current) <= 2);
                }
            }
        }
    }
}
