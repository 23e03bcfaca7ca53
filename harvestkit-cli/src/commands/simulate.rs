//! `simulate` command: run the optimizer against synthetic entities.
//!
//! Each entity gets a random profile (how often it has something to collect,
//! how much, how often it is shielded). The simulation runs harvest cycles
//! on a manual clock, advancing it by the planned interval after each cycle,
//! so a day of harvesting finishes instantly and reproducibly for a seed.

use std::collections::HashMap;
use std::sync::Arc;

use harvestkit::cache::{EntitySummary, StaticFetcher};
use harvestkit::clock::{Clock, ManualClock, SharedClock, HOUR_MS, MINUTE_MS};
use harvestkit::config::OptimizerConfig;
use harvestkit::{run_cycle, CycleReport, EntityPoller, HarvestOptimizer, OptimizerSnapshot};
use harvestkit::{PollError, PollOutcome};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::CliError;

/// Chance that any single poll is rate limited.
const RATE_LIMIT_CHANCE: f64 = 0.02;

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub entities: usize,
    pub rounds: usize,
    pub seed: u64,
    pub start_hour: u32,
}

/// Everything a simulation produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutput {
    pub seed: u64,
    pub rounds: Vec<CycleReport>,
    pub snapshot: OptimizerSnapshot,
    /// Human-readable report; not part of the JSON output.
    #[serde(skip)]
    pub report: String,
}

/// Behaviour of one synthetic entity.
#[derive(Debug, Clone, Copy)]
struct EntityProfile {
    yield_chance: f64,
    max_yield: u64,
    shield_chance: f64,
    base_latency_ms: u64,
}

impl EntityProfile {
    fn random(rng: &mut StdRng) -> Self {
        Self {
            yield_chance: rng.random_range(0.05..0.9),
            max_yield: rng.random_range(5..80),
            shield_chance: rng.random_range(0.0..0.15),
            base_latency_ms: rng.random_range(60..450),
        }
    }
}

/// Poller answering from random entity profiles.
struct SimulatedPoller {
    clock: Arc<ManualClock>,
    profiles: HashMap<String, EntityProfile>,
    rng: Mutex<StdRng>,
}

impl SimulatedPoller {
    fn new(clock: Arc<ManualClock>, ids: &[String], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let profiles = ids
            .iter()
            .map(|id| (id.clone(), EntityProfile::random(&mut rng)))
            .collect();
        Self {
            clock,
            profiles,
            rng: Mutex::new(rng),
        }
    }
}

impl EntityPoller for SimulatedPoller {
    fn poll(&self, id: &str) -> Result<PollOutcome, PollError> {
        let profile = self.profiles.get(id).ok_or_else(|| PollError::Remote {
            id: id.to_string(),
            reason: "no such entity".to_string(),
        })?;

        let now = self.clock.now();
        let mut rng = self.rng.lock();

        if rng.random_bool(RATE_LIMIT_CHANCE) {
            return Err(PollError::RateLimited { id: id.to_string() });
        }

        let latency_ms = profile.base_latency_ms + rng.random_range(0..100);

        if rng.random_bool(profile.shield_chance) {
            let expires_at = now + rng.random_range(1..12) * HOUR_MS;
            return Ok(PollOutcome::shielded(Some(expires_at), latency_ms));
        }

        if rng.random_bool(profile.yield_chance) {
            let amount = rng.random_range(1..=profile.max_yield);
            let matured_at = now - rng.random_range(0..90) * MINUTE_MS;
            Ok(PollOutcome::found(amount, latency_ms).with_matured_at(matured_at))
        } else {
            Ok(PollOutcome::empty(latency_ms))
        }
    }
}

/// Run a simulation and return its output.
pub fn simulate(
    config: &OptimizerConfig,
    params: &SimulationParams,
) -> Result<SimulationOutput, CliError> {
    if params.rounds == 0 {
        return Err(CliError::InvalidArgument(
            "--rounds must be at least 1".to_string(),
        ));
    }

    let ids: Vec<String> = (0..params.entities)
        .map(|i| format!("entity-{:03}", i + 1))
        .collect();
    let summaries = ids
        .iter()
        .map(|id| EntitySummary::new(id.clone(), format!("Entity {id}")))
        .collect();

    let clock = Arc::new(ManualClock::at_hour(params.start_hour));
    let optimizer =
        HarvestOptimizer::with_clock(config.clone(), Arc::clone(&clock) as SharedClock)
            .with_fetcher(Arc::new(StaticFetcher::new(summaries)));
    let poller = SimulatedPoller::new(Arc::clone(&clock), &ids, params.seed);

    tracing::info!(
        entities = params.entities,
        rounds = params.rounds,
        seed = params.seed,
        start_hour = params.start_hour,
        "Starting simulation"
    );

    let mut rounds = Vec::with_capacity(params.rounds);
    for _ in 0..params.rounds {
        let report = run_cycle(&optimizer, &poller);
        clock.advance(report.interval);
        rounds.push(report);
    }

    tracing::debug!(summary = %optimizer.stats_summary(), "Simulation finished");

    Ok(SimulationOutput {
        seed: params.seed,
        rounds,
        snapshot: optimizer.snapshot(),
        report: optimizer.report(),
    })
}

/// Run the simulate command.
pub fn run(config: &OptimizerConfig, params: &SimulationParams, json: bool) -> Result<(), CliError> {
    let output = simulate(config, params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (index, round) in output.rounds.iter().enumerate() {
        println!(
            "round {:>3}: polled {:>3}, skipped {:>3}, errors {:>2}, found {:>5}, next in {:>2} min",
            index + 1,
            round.polled,
            round.skipped,
            round.errors,
            round.found,
            round.interval.as_secs() / 60
        );
    }
    println!();
    print!("{}", output.report);
    Ok(())
}
