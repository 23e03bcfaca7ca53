//! Harvest optimizer facade.
//!
//! [`HarvestOptimizer`] owns one instance of every optimization component
//! and wires them together for a polling cycle:
//!
//! ```text
//!                       ┌──────────────┐
//!  candidates ─────────►│ YieldRanker  │ top N by priority
//!                       └──────┬───────┘
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ NegativeResultCache │ drop empty / shielded
//!                   └──────────┬──────────┘
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ MaturityPredictor   │ ripe first
//!                   └──────────┬──────────┘
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ AdaptiveCadence     │ batch size, interval
//!                   └──────────┬──────────┘
//!                              ▼
//!                          CyclePlan
//! ```
//!
//! Poll outcomes flow back through [`HarvestOptimizer::record_poll`] and
//! [`HarvestOptimizer::finish_round`].
//!
//! Instances are independent: run one per account if several are harvested
//! from the same process.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{EmptyFetcher, EntityCache, EntityFetcher, NegativeResultCache};
use crate::cadence::{next_peak_start, AdaptiveCadenceController, NetworkQuality};
use crate::clock::{SharedClock, SystemClock, Timestamp};
use crate::config::OptimizerConfig;
use crate::cooldown::{AdaptiveCooldownController, CooldownSnapshot};
use crate::predict::{MaturityPredictor, PeakHistory};
use crate::rank::{YieldRanker, YieldRecord};
use crate::stats::{CollectionSnapshot, CollectionStats, StatsSnapshot};

/// Result of polling one entity, as reported by the remote side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub amount_found: u64,
    pub was_shielded: bool,
    /// Shield end time, when the remote side reports one.
    pub shield_expires_at: Option<Timestamp>,
    pub latency_ms: u64,
    /// Time the collected resource matured, when known.
    pub matured_at: Option<Timestamp>,
}

impl PollOutcome {
    /// Poll that collected `amount`.
    pub fn found(amount: u64, latency_ms: u64) -> Self {
        Self {
            amount_found: amount,
            latency_ms,
            ..Self::default()
        }
    }

    /// Poll that found nothing.
    pub fn empty(latency_ms: u64) -> Self {
        Self::found(0, latency_ms)
    }

    /// Poll rejected by a shield.
    pub fn shielded(expires_at: Option<Timestamp>, latency_ms: u64) -> Self {
        Self {
            was_shielded: true,
            shield_expires_at: expires_at,
            latency_ms,
            ..Self::default()
        }
    }

    pub fn with_matured_at(mut self, matured_at: Timestamp) -> Self {
        self.matured_at = Some(matured_at);
        self
    }
}

/// What to poll in the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CyclePlan {
    /// Ids to poll, grouped into request batches, most urgent first.
    pub batches: Vec<Vec<String>>,
    /// Ids dropped by the negative-result cache.
    pub skipped: Vec<String>,
    /// Ids dropped by the top-N filter.
    pub filtered_out: usize,
    /// Sleep before the cycle after this one.
    pub interval: Duration,
    pub quality: NetworkQuality,
}

impl CyclePlan {
    /// Number of ids to poll.
    pub fn poll_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Serializable view of every component's statistics.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerSnapshot {
    pub skip_cache: StatsSnapshot,
    pub entity_cache: StatsSnapshot,
    pub collection: CollectionSnapshot,
    pub cooldown: CooldownSnapshot,
    pub network_quality: NetworkQuality,
    pub average_latency_ms: Option<f64>,
    pub interval_secs: u64,
    pub top_entities: Vec<YieldRecord>,
}

/// Owner of all optimization state for one harvesting account.
pub struct HarvestOptimizer {
    config: OptimizerConfig,
    clock: SharedClock,
    entity_cache: EntityCache,
    negative: NegativeResultCache,
    predictor: MaturityPredictor,
    peaks: PeakHistory,
    cadence: AdaptiveCadenceController,
    ranker: YieldRanker,
    cooldown: AdaptiveCooldownController,
    collection: CollectionStats,
}

impl std::fmt::Debug for HarvestOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarvestOptimizer")
            .field("config", &self.config)
            .field("entity_cache", &self.entity_cache)
            .field("ranked_entities", &self.ranker.len())
            .field("predictions", &self.predictor.len())
            .finish_non_exhaustive()
    }
}

impl Default for HarvestOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl HarvestOptimizer {
    /// Create an optimizer on the system clock.
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an optimizer on the given clock.
    pub fn with_clock(config: OptimizerConfig, clock: SharedClock) -> Self {
        Self {
            entity_cache: EntityCache::new(
                config.entity_cache.clone(),
                Arc::clone(&clock),
                Arc::new(EmptyFetcher),
            ),
            negative: NegativeResultCache::new(config.negative.clone(), Arc::clone(&clock)),
            predictor: MaturityPredictor::new(Arc::clone(&clock)),
            peaks: PeakHistory::new(Arc::clone(&clock)),
            cadence: AdaptiveCadenceController::new(config.cadence.clone(), Arc::clone(&clock)),
            ranker: YieldRanker::new(config.ranker.clone(), Arc::clone(&clock)),
            cooldown: AdaptiveCooldownController::new(config.cooldown.clone(), Arc::clone(&clock)),
            collection: CollectionStats::new(Arc::clone(&clock)),
            config,
            clock,
        }
    }

    /// Use `fetcher` to refresh the entity list.
    ///
    /// Replaces the entity cache, so call it before the first refresh.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn EntityFetcher>) -> Self {
        self.entity_cache = EntityCache::new(
            self.config.entity_cache.clone(),
            Arc::clone(&self.clock),
            fetcher,
        );
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn entity_cache(&self) -> &EntityCache {
        &self.entity_cache
    }

    pub fn negative_cache(&self) -> &NegativeResultCache {
        &self.negative
    }

    pub fn predictor(&self) -> &MaturityPredictor {
        &self.predictor
    }

    pub fn peak_history(&self) -> &PeakHistory {
        &self.peaks
    }

    pub fn cadence(&self) -> &AdaptiveCadenceController {
        &self.cadence
    }

    pub fn ranker(&self) -> &YieldRanker {
        &self.ranker
    }

    pub fn cooldown(&self) -> &AdaptiveCooldownController {
        &self.cooldown
    }

    pub fn collection_stats(&self) -> &CollectionStats {
        &self.collection
    }

    /// Decide which of `candidates` to poll and in which batches.
    pub fn plan_cycle<S: AsRef<str>>(&self, candidates: &[S]) -> CyclePlan {
        let ranked = self.ranker.filter_default(candidates);
        let filtered_out = candidates.len() - ranked.len();

        let (skipped, remaining): (Vec<String>, Vec<String>) = ranked
            .into_iter()
            .partition(|id| self.negative.should_skip(id));

        let ordered = self.predictor.sort_by_urgency(&remaining);
        let quality = self.cadence.classify_quality();
        let batch_size = self.cadence.batch_size(ordered.len());

        let batches = if batch_size == 0 {
            Vec::new()
        } else {
            ordered
                .chunks(batch_size)
                .map(<[String]>::to_vec)
                .collect()
        };

        let plan = CyclePlan {
            batches,
            skipped,
            filtered_out,
            interval: self.cadence.current_interval(),
            quality,
        };

        tracing::debug!(
            candidates = candidates.len(),
            polling = plan.poll_count(),
            skipped = plan.skipped.len(),
            filtered_out,
            batch_size,
            quality = %quality,
            "Planned harvest cycle"
        );
        plan
    }

    /// Feed one poll outcome back into every component.
    pub fn record_poll(&self, id: &str, outcome: &PollOutcome) {
        let now = self.clock.now();
        self.ranker
            .record(id, outcome.amount_found, outcome.was_shielded);
        self.cadence.record_latency(outcome.latency_ms);

        if outcome.was_shielded {
            self.negative.mark_shielded(id, outcome.shield_expires_at);
        } else if outcome.amount_found == 0 {
            self.negative.mark_empty(id);
        } else {
            self.peaks.record(id);
            self.entity_cache.mark_observed(id, now);
        }

        if let Some(matured_at) = outcome.matured_at {
            self.predictor.record_observed_maturity(id, matured_at);
        }
    }

    /// Close a harvesting round.
    ///
    /// Records the round with the cooldown controller, forgets this round's
    /// empty results and sweeps expired shields.
    pub fn finish_round(&self, found: u64, checked: u64) {
        self.cooldown.record_attempt(found, checked);
        self.negative.clear_round_cache();
        self.negative.sweep_expired_shields();
        tracing::debug!(
            found,
            checked,
            cooldown_mins = self.cooldown.current_cooldown().as_secs() / 60,
            "Harvest round finished"
        );
    }

    /// Polling interval for the current local hour.
    pub fn calculate_dynamic_interval(&self) -> Duration {
        self.cadence.current_interval()
    }

    /// Clear every cache and zero the statistics.
    ///
    /// Yield history and cooldown state survive; see
    /// [`reset_all`](Self::reset_all).
    pub fn clear_all_caches(&self) {
        self.predictor.clear();
        self.peaks.clear();
        self.negative.clear();
        self.entity_cache.clear();
        self.entity_cache.reset_stats();
        self.collection.reset();
        tracing::info!("Cleared all optimizer caches");
    }

    /// Clear all caches and forget yield history, latency and cooldown state.
    pub fn reset_all(&self) {
        self.clear_all_caches();
        self.ranker.reset();
        self.cooldown.reset();
        self.cadence.reset();
        tracing::info!("Optimizer reset");
    }

    /// Serializable statistics of every component.
    pub fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            skip_cache: self.negative.stats(),
            entity_cache: self.entity_cache.stats(),
            collection: self.collection.snapshot(),
            cooldown: self.cooldown.snapshot(),
            network_quality: self.cadence.classify_quality(),
            average_latency_ms: self.cadence.average_latency(),
            interval_secs: self.cadence.current_interval().as_secs(),
            top_entities: self.ranker.top_by_average(self.config.ranker.report_top_n),
        }
    }

    /// One-line statistics summary.
    pub fn stats_summary(&self) -> String {
        let collection = self.collection.snapshot();
        format!(
            "skip cache [{}] | collected: {} in {} batches ({:.1}% ok), {} singles | network: {}",
            self.negative.stats(),
            collection.total_collected,
            collection.batch_count,
            collection.batch_success_rate,
            collection.single_count,
            self.cadence.classify_quality()
        )
    }

    /// Multi-line human-readable report.
    pub fn report(&self) -> String {
        let cooldown = self.cooldown.snapshot();
        let collection = self.collection.snapshot();
        let report_top_n = self.config.ranker.report_top_n;

        let mut lines = vec![
            "========== harvest report ==========".to_string(),
            "rounds:".to_string(),
            format!("  attempts: {}", cooldown.attempts),
            format!("  successes: {}", cooldown.successes),
            format!("  success rate: {:.1}%", cooldown.success_rate * 100.0),
            format!(
                "  recent success rate: {:.1}%",
                cooldown.recent_success_rate * 100.0
            ),
            format!("  total found: {}", cooldown.cumulative_yield),
            format!("  cooldown: {} min", cooldown.cooldown_secs / 60),
            "collection:".to_string(),
            format!(
                "  batches: {} ({} ok, {} failed, avg {} ms)",
                collection.batch_count,
                collection.batch_success_count,
                collection.batch_fail_count,
                collection.avg_batch_ms
            ),
            format!(
                "  singles: {} ({} failed, avg {} ms)",
                collection.single_count, collection.single_fail_count, collection.avg_single_ms
            ),
            format!("  collected: {}", collection.total_collected),
            format!("  runtime: {} min", collection.runtime_minutes),
            "network:".to_string(),
        ];

        lines.push(match self.cadence.average_latency() {
            Some(average) => format!(
                "  quality: {} (avg {:.0} ms)",
                self.cadence.classify_quality(),
                average
            ),
            None => format!("  quality: {}", NetworkQuality::Unknown),
        });
        lines.push(format!("  {}", self.cadence.next_check_description()));
        if let Some((period, starts_at)) = next_peak_start(self.clock.local_time()) {
            lines.push(format!(
                "  next peak: {} at {}",
                period,
                starts_at.format("%H:%M")
            ));
        }

        lines.push("skip cache:".to_string());
        lines.push(format!("  {}", self.negative.stats()));

        let top = self.ranker.top_by_average(report_top_n);
        if !top.is_empty() {
            lines.push(format!("top entities (top {report_top_n}):"));
            lines.extend(top.iter().enumerate().map(|(rank, record)| {
                format!(
                    "  {}. {} - avg {}, total {}, polls {}",
                    rank + 1,
                    record.id,
                    record.average,
                    record.cumulative_yield,
                    record.sample_count
                )
            }));
        }

        lines.push("====================================".to_string());
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
