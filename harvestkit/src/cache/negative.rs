//! Negative-result skip cache.
//!
//! Remembers entities whose last poll came back empty and entities that are
//! currently shielded, so the harvesting loop can skip remote calls that are
//! known to be wasted.
//!
//! # Expiry
//!
//! Expired records are removed lazily when they are read, plus on demand via
//! [`NegativeResultCache::sweep_expired_shields`]. Empty-result records are
//! additionally scoped to a harvesting round: the caller clears them with
//! [`NegativeResultCache::clear_round_cache`] when a round ends.
//!
//! # Consistency
//!
//! `should_skip` followed later by `mark_empty` is not atomic as a pair. Two
//! callers polling the same entity concurrently can both see "not skipped"
//! and both issue the remote call.

use dashmap::DashMap;

use crate::clock::{duration_ms, SharedClock, Timestamp};
use crate::config::NegativeCacheConfig;
use crate::stats::{StatsRecorder, StatsSnapshot};

/// Empty-result and shield cache.
///
/// # Example
///
/// ```
/// use harvestkit::cache::NegativeResultCache;
/// use harvestkit::clock::{ManualClock, SharedClock};
/// use harvestkit::config::NegativeCacheConfig;
/// use std::sync::Arc;
///
/// let clock: SharedClock = Arc::new(ManualClock::at_hour(9));
/// let cache = NegativeResultCache::new(NegativeCacheConfig::default(), clock);
///
/// cache.mark_empty("u1");
/// assert!(cache.should_skip("u1"));
/// assert!(!cache.should_skip("u2"));
/// ```
#[derive(Debug)]
pub struct NegativeResultCache {
    clock: SharedClock,
    config: NegativeCacheConfig,
    /// id -> time the empty result was observed.
    empty: DashMap<String, Timestamp>,
    /// id -> absolute shield end time.
    shields: DashMap<String, Timestamp>,
    stats: StatsRecorder,
}

impl NegativeResultCache {
    /// Create an empty cache.
    pub fn new(config: NegativeCacheConfig, clock: SharedClock) -> Self {
        Self {
            clock,
            config,
            empty: DashMap::new(),
            shields: DashMap::new(),
            stats: StatsRecorder::new(),
        }
    }

    /// Whether a poll of `id` should be skipped.
    ///
    /// Checks the empty-result record first, then the shield record. Expired
    /// records are removed on the way.
    pub fn should_skip(&self, id: &str) -> bool {
        self.stats.increment_total();
        let now = self.clock.now();

        if self.empty_is_live(id, now) || self.shield_is_live(id, now) {
            self.stats.increment_skipped();
            self.stats.increment_hits();
            true
        } else {
            self.stats.increment_misses();
            false
        }
    }

    /// Record that polling `id` found nothing.
    pub fn mark_empty(&self, id: &str) {
        self.empty.insert(id.to_string(), self.clock.now());
    }

    /// Record that `id` is shielded until `expires_at`.
    ///
    /// Without an explicit end time the shield lasts the configured default
    /// (24 hours).
    pub fn mark_shielded(&self, id: &str, expires_at: Option<Timestamp>) {
        let expires_at = expires_at.unwrap_or_else(|| {
            self.clock
                .now()
                .saturating_add(duration_ms(self.config.default_shield_duration))
        });
        self.shields.insert(id.to_string(), expires_at);
    }

    /// Forget all empty-result records. Call at the end of each round.
    pub fn clear_round_cache(&self) {
        let cleared = self.empty.len();
        self.empty.clear();
        tracing::debug!(cleared, "Cleared round empty-result cache");
    }

    /// Remove every shield that ended before now.
    ///
    /// Returns the number of records removed.
    pub fn sweep_expired_shields(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.shields.retain(|_, expires_at| {
            let keep = *expires_at >= now;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(removed, "Swept expired shield records");
        }
        removed
    }

    /// Drop every record and zero the statistics.
    pub fn clear(&self) {
        self.empty.clear();
        self.shields.clear();
        self.stats.reset();
    }

    /// Skip/hit counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero the statistics without touching the records.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Number of stored empty-result records (expired ones included).
    pub fn empty_len(&self) -> usize {
        self.empty.len()
    }

    /// Number of stored shield records (expired ones included).
    pub fn shield_len(&self) -> usize {
        self.shields.len()
    }

    fn empty_is_live(&self, id: &str, now: Timestamp) -> bool {
        let ttl = duration_ms(self.config.empty_ttl);
        // Copy out so the shard lock is released before any removal.
        match self.empty.get(id).map(|marked_at| *marked_at) {
            Some(marked_at) if now - marked_at < ttl => true,
            Some(_) => {
                self.empty
                    .remove_if(id, |_, marked_at| now - *marked_at >= ttl);
                false
            }
            None => false,
        }
    }

    fn shield_is_live(&self, id: &str, now: Timestamp) -> bool {
        match self.shields.get(id).map(|expires_at| *expires_at) {
            Some(expires_at) if now < expires_at => true,
            Some(_) => {
                self.shields.remove_if(id, |_, expires_at| now >= *expires_at);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock, HOUR_MS};
    use std::sync::Arc;
    use std::time::Duration;

    fn cache_with_clock() -> (NegativeResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_hour(10));
        let cache = NegativeResultCache::new(
            NegativeCacheConfig::default(),
            Arc::clone(&clock) as SharedClock,
        );
        (cache, clock)
    }

    #[test]
    fn test_unknown_id_is_not_skipped() {
        let (cache, _) = cache_with_clock();
        assert!(!cache.should_skip("nobody"));

        let stats = cache.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_empty_result_ttl_boundary() {
        let (cache, clock) = cache_with_clock();
        cache.mark_empty("u1");

        assert!(cache.should_skip("u1"));
        clock.advance(Duration::from_millis(5 * 60 * 1000 - 1));
        assert!(cache.should_skip("u1"));

        clock.advance(Duration::from_millis(1));
        assert!(!cache.should_skip("u1"));
        assert_eq!(cache.empty_len(), 0, "expired record removed on read");
    }

    #[test]
    fn test_shield_boundary() {
        let (cache, clock) = cache_with_clock();
        let t0 = clock.now();
        cache.mark_shielded("u1", Some(t0 + HOUR_MS));

        assert!(cache.should_skip("u1"));
        clock.set(t0 + HOUR_MS - 1);
        assert!(cache.should_skip("u1"));

        clock.set(t0 + HOUR_MS);
        assert!(!cache.should_skip("u1"));
        assert_eq!(cache.shield_len(), 0);
    }

    #[test]
    fn test_default_shield_lasts_a_day() {
        let (cache, clock) = cache_with_clock();
        cache.mark_shielded("u1", None);

        clock.advance(Duration::from_secs(23 * 3600));
        assert!(cache.should_skip("u1"));

        clock.advance(Duration::from_secs(3600));
        assert!(!cache.should_skip("u1"));
    }

    #[test]
    fn test_expired_empty_falls_through_to_shield() {
        let (cache, clock) = cache_with_clock();
        cache.mark_empty("u1");
        cache.mark_shielded("u1", Some(clock.now() + 2 * HOUR_MS));

        clock.advance(Duration::from_secs(10 * 60));
        assert!(cache.should_skip("u1"));
        assert_eq!(cache.empty_len(), 0);
        assert_eq!(cache.shield_len(), 1);
    }

    #[test]
    fn test_clear_round_cache_keeps_shields() {
        let (cache, _) = cache_with_clock();
        cache.mark_empty("u1");
        cache.mark_shielded("u2", None);

        cache.clear_round_cache();

        assert!(!cache.should_skip("u1"));
        assert!(cache.should_skip("u2"));
    }

    #[test]
    fn test_sweep_expired_shields() {
        let (cache, clock) = cache_with_clock();
        let now = clock.now();
        cache.mark_shielded("old", Some(now - 1));
        cache.mark_shielded("edge", Some(now));
        cache.mark_shielded("fresh", Some(now + HOUR_MS));

        assert_eq!(cache.sweep_expired_shields(), 1);
        assert_eq!(cache.shield_len(), 2);
    }

    #[test]
    fn test_skip_statistics() {
        let (cache, _) = cache_with_clock();
        cache.mark_empty("a");
        cache.should_skip("a");
        cache.should_skip("a");
        cache.should_skip("b");
        cache.should_skip("c");

        let stats = cache.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert!((stats.skip_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (cache, _) = cache_with_clock();
        cache.mark_empty("a");
        cache.mark_shielded("b", None);
        cache.should_skip("a");

        cache.clear();

        assert!(cache.stats().is_zero());
        assert!(!cache.should_skip("a"));
        assert!(!cache.should_skip("b"));
    }

    #[test]
    fn test_remark_refreshes_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.mark_empty("u1");
        clock.advance(Duration::from_secs(4 * 60));
        cache.mark_empty("u1");
        clock.advance(Duration::from_secs(4 * 60));
        assert!(cache.should_skip("u1"));
    }
}
