//! Harvesting loop driver.
//!
//! Runs polling cycles against an [`EntityPoller`] using a
//! [`HarvestOptimizer`] to choose what to poll. One cycle is:
//!
//! 1. Read the entity list from the entity cache (refreshing when stale).
//! 2. Plan the cycle: rank, skip, order by urgency, batch.
//! 3. Poll every planned entity and feed each outcome back.
//! 4. Close the round.
//!
//! [`run_loop`] repeats this on tokio, sleeping for the cadence interval
//! between cycles, until cancelled.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::PollError;
use crate::optimizer::{HarvestOptimizer, PollOutcome};

/// Remote collection call for a single entity.
pub trait EntityPoller: Send + Sync {
    /// Poll `id`, collecting whatever is ready.
    fn poll(&self, id: &str) -> Result<PollOutcome, PollError>;
}

/// Summary of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Collectable entities in the entity list.
    pub candidates: usize,
    pub polled: usize,
    pub skipped: usize,
    pub filtered_out: usize,
    pub errors: usize,
    pub batches: usize,
    pub found: u64,
    /// Sleep before the next cycle.
    pub interval: Duration,
}

/// Summary of a [`run_loop`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub cycles: u64,
    pub polled: u64,
    pub found: u64,
    pub errors: u64,
}

impl LoopSummary {
    fn add(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.polled += report.polled as u64;
        self.found += report.found;
        self.errors += report.errors as u64;
    }
}

/// Run one polling cycle.
///
/// Poll errors are logged and mark their batch as failed; they never abort
/// the cycle.
pub fn run_cycle(optimizer: &HarvestOptimizer, poller: &dyn EntityPoller) -> CycleReport {
    let ids: Vec<String> = optimizer
        .entity_cache()
        .get(false)
        .into_iter()
        .filter(|entry| entry.can_collect)
        .map(|entry| entry.id)
        .collect();

    let plan = optimizer.plan_cycle(&ids);
    let mut report = CycleReport {
        candidates: ids.len(),
        skipped: plan.skipped.len(),
        filtered_out: plan.filtered_out,
        batches: plan.batches.len(),
        interval: plan.interval,
        ..CycleReport::default()
    };

    for batch in &plan.batches {
        let mut batch_ok = true;
        let mut batch_found = 0u64;
        let mut batch_latency_ms = 0u64;

        for id in batch {
            match poller.poll(id) {
                Ok(outcome) => {
                    optimizer.record_poll(id, &outcome);
                    batch_found = batch_found.saturating_add(outcome.amount_found);
                    batch_latency_ms = batch_latency_ms.saturating_add(outcome.latency_ms);
                    report.polled += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Poll failed");
                    batch_ok = false;
                    report.errors += 1;
                }
            }
        }

        let duration = Duration::from_millis(batch_latency_ms);
        if batch.len() == 1 {
            if batch_ok {
                optimizer.collection_stats().record_single(duration, batch_found);
            } else {
                optimizer.collection_stats().record_single_failure(duration);
            }
        } else {
            optimizer
                .collection_stats()
                .record_batch(batch_ok, duration, batch_found);
        }
        report.found = report.found.saturating_add(batch_found);
    }

    optimizer.finish_round(report.found, report.polled as u64);

    tracing::info!(
        candidates = report.candidates,
        polled = report.polled,
        skipped = report.skipped,
        errors = report.errors,
        found = report.found,
        next_in_secs = report.interval.as_secs(),
        "Harvest cycle complete"
    );
    report
}

/// Run polling cycles until `cancel` fires.
///
/// Each cycle runs on the blocking pool since pollers make synchronous
/// remote calls.
pub async fn run_loop(
    optimizer: Arc<HarvestOptimizer>,
    poller: Arc<dyn EntityPoller>,
    cancel: CancellationToken,
) -> LoopSummary {
    let mut summary = LoopSummary::default();
    tracing::info!("Harvest loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let cycle_optimizer = Arc::clone(&optimizer);
        let cycle_poller = Arc::clone(&poller);
        let cycle = tokio::task::spawn_blocking(move || {
            run_cycle(&cycle_optimizer, cycle_poller.as_ref())
        });

        let interval = match cycle.await {
            Ok(report) => {
                summary.add(&report);
                report.interval
            }
            Err(e) => {
                tracing::error!(error = %e, "Harvest cycle panicked");
                optimizer.calculate_dynamic_interval()
            }
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        polled = summary.polled,
        found = summary.found,
        "Harvest loop stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntitySummary, StaticFetcher};
    use crate::clock::{ManualClock, SharedClock};
    use crate::config::OptimizerConfig;
    use std::collections::HashMap;

    /// Poller serving canned outcomes; unknown ids fail.
    struct CannedPoller {
        outcomes: HashMap<String, PollOutcome>,
    }

    impl CannedPoller {
        fn new(outcomes: &[(&str, PollOutcome)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(id, outcome)| (id.to_string(), *outcome))
                    .collect(),
            }
        }
    }

    impl EntityPoller for CannedPoller {
        fn poll(&self, id: &str) -> Result<PollOutcome, PollError> {
            self.outcomes.get(id).copied().ok_or_else(|| PollError::Remote {
                id: id.to_string(),
                reason: "unknown entity".to_string(),
            })
        }
    }

    fn optimizer_with(entities: Vec<EntitySummary>) -> HarvestOptimizer {
        let clock: SharedClock = Arc::new(ManualClock::at_hour(10));
        HarvestOptimizer::with_clock(OptimizerConfig::default(), clock)
            .with_fetcher(Arc::new(StaticFetcher::new(entities)))
    }

    #[test]
    fn test_cycle_polls_collectable_entities() {
        let optimizer = optimizer_with(vec![
            EntitySummary::new("a", "A"),
            EntitySummary::new("b", "B"),
            EntitySummary::new("idle", "Idle").with_can_collect(false),
        ]);
        let poller = CannedPoller::new(&[
            ("a", PollOutcome::found(12, 100)),
            ("b", PollOutcome::empty(100)),
        ]);

        let report = run_cycle(&optimizer, &poller);

        assert_eq!(report.candidates, 2);
        assert_eq!(report.polled, 2);
        assert_eq!(report.found, 12);
        assert_eq!(report.errors, 0);
        assert_eq!(report.batches, 1);

        let collection = optimizer.collection_stats().snapshot();
        assert_eq!(collection.batch_count, 1);
        assert_eq!(collection.batch_success_count, 1);
        assert_eq!(collection.total_collected, 12);
        assert_eq!(optimizer.cooldown().snapshot().attempts, 1);
    }

    #[test]
    fn test_poll_errors_fail_the_batch() {
        let optimizer = optimizer_with(vec![
            EntitySummary::new("a", "A"),
            EntitySummary::new("broken", "Broken"),
        ]);
        let poller = CannedPoller::new(&[("a", PollOutcome::found(3, 100))]);

        let report = run_cycle(&optimizer, &poller);

        assert_eq!(report.polled, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(optimizer.collection_stats().snapshot().batch_fail_count, 1);
    }

    #[test]
    fn test_second_cycle_skips_shielded() {
        let optimizer = optimizer_with(vec![
            EntitySummary::new("a", "A"),
            EntitySummary::new("s", "S"),
        ]);
        let poller = CannedPoller::new(&[
            ("a", PollOutcome::found(5, 100)),
            ("s", PollOutcome::shielded(None, 100)),
        ]);

        run_cycle(&optimizer, &poller);
        let second = run_cycle(&optimizer, &poller);

        assert_eq!(second.skipped, 1);
        assert_eq!(second.polled, 1);
        // Single-entity batch counts as a single collection.
        assert_eq!(optimizer.collection_stats().snapshot().single_count, 1);
    }

    #[test]
    fn test_failed_single_poll_is_recorded_as_failure() {
        let optimizer = optimizer_with(vec![EntitySummary::new("broken", "Broken")]);
        let poller = CannedPoller::new(&[]);

        let report = run_cycle(&optimizer, &poller);

        assert_eq!(report.errors, 1);
        let collection = optimizer.collection_stats().snapshot();
        assert_eq!(collection.single_count, 1);
        assert_eq!(collection.single_fail_count, 1);
        assert_eq!(collection.batch_count, 0);
    }

    #[test]
    fn test_empty_entity_list() {
        let optimizer = optimizer_with(Vec::new());
        let poller = CannedPoller::new(&[]);
        let report = run_cycle(&optimizer, &poller);
        assert_eq!(report.polled, 0);
        assert_eq!(report.batches, 0);
    }

    /// Poller that cancels the loop on its first call.
    struct CancellingPoller {
        cancel: CancellationToken,
    }

    impl EntityPoller for CancellingPoller {
        fn poll(&self, _id: &str) -> Result<PollOutcome, PollError> {
            self.cancel.cancel();
            Ok(PollOutcome::found(4, 50))
        }
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_cancel() {
        let optimizer = Arc::new(optimizer_with(vec![EntitySummary::new("a", "A")]));
        let cancel = CancellationToken::new();
        let poller = Arc::new(CancellingPoller {
            cancel: cancel.clone(),
        });

        let summary = run_loop(optimizer, poller, cancel).await;

        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.polled, 1);
        assert_eq!(summary.found, 4);
    }

    #[tokio::test]
    async fn test_run_loop_precancelled() {
        let optimizer = Arc::new(optimizer_with(vec![EntitySummary::new("a", "A")]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run_loop(optimizer, Arc::new(CannedPoller::new(&[])), cancel).await;
        assert_eq!(summary, LoopSummary::default());
    }
}
