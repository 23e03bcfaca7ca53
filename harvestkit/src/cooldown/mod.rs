//! Adaptive cooldown between harvesting rounds.
//!
//! Each finished round is recorded as an attempt that either found something
//! or did not. The success rate over the last few attempts selects one of
//! three cooldowns:
//!
//! | recent success rate | cooldown |
//! |---------------------|----------|
//! | >= 70%              | 10 min   |
//! | 40% - 70%           | 15 min   |
//! | < 40%               | 20 min   |

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::clock::{duration_ms, SharedClock, Timestamp};
use crate::config::{CooldownConfig, MAX_OUTCOME_WINDOW};
use crate::error::ComputeError;

/// Cooldown when rounds usually succeed.
pub const MIN_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Cooldown before any attempt is recorded and for average success rates.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Cooldown when rounds usually come back empty.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(20 * 60);

const HIGH_SUCCESS_RATE: f64 = 0.7;
const LOW_SUCCESS_RATE: f64 = 0.4;

/// Sentinel for "no attempt recorded yet" in the timestamp atomics.
const NEVER: Timestamp = Timestamp::MIN;

/// Success flags of the most recent attempts packed into one word.
///
/// The low 32 bits hold one bit per attempt (bit 0 newest), the high 32 bits
/// the number of attempts in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutcomeBits(u64);

impl OutcomeBits {
    const EMPTY: OutcomeBits = OutcomeBits(0);

    fn push(self, success: bool, window: usize) -> Self {
        let mask = (1u64 << window) - 1;
        let history = ((self.history() << 1) | u64::from(success)) & mask;
        let filled = (self.filled() + 1).min(window as u64);
        OutcomeBits((filled << 32) | history)
    }

    fn history(self) -> u64 {
        self.0 & 0xFFFF_FFFF
    }

    fn filled(self) -> u64 {
        self.0 >> 32
    }

    fn rate(self) -> Result<f64, ComputeError> {
        if self.filled() == 0 {
            return Err(ComputeError::EmptyWindow("outcome"));
        }
        Ok(f64::from(self.history().count_ones()) / self.filled() as f64)
    }
}

/// Point-in-time view of the cooldown controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CooldownSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub friends_checked: u64,
    pub cumulative_yield: u64,
    pub last_attempt_at: Option<Timestamp>,
    pub last_success_at: Option<Timestamp>,
    /// Lifetime success rate in `0.0..=1.0`.
    pub success_rate: f64,
    /// Success rate over the rolling window in `0.0..=1.0`.
    pub recent_success_rate: f64,
    pub cooldown_secs: u64,
}

/// Success-rate driven cooldown.
///
/// All state lives in atomics. Each counter is updated independently, so a
/// snapshot taken while attempts are being recorded may mix values from
/// neighbouring attempts.
#[derive(Debug)]
pub struct AdaptiveCooldownController {
    clock: SharedClock,
    window: usize,
    outcomes: AtomicU64,
    attempts: AtomicU64,
    successes: AtomicU64,
    friends_checked: AtomicU64,
    cumulative_yield: AtomicU64,
    last_attempt_at: AtomicI64,
    last_success_at: AtomicI64,
    cooldown_secs: AtomicU64,
}

impl AdaptiveCooldownController {
    pub fn new(config: CooldownConfig, clock: SharedClock) -> Self {
        Self {
            clock,
            window: config.outcome_window.clamp(1, MAX_OUTCOME_WINDOW),
            outcomes: AtomicU64::new(OutcomeBits::EMPTY.0),
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            friends_checked: AtomicU64::new(0),
            cumulative_yield: AtomicU64::new(0),
            last_attempt_at: AtomicI64::new(NEVER),
            last_success_at: AtomicI64::new(NEVER),
            cooldown_secs: AtomicU64::new(DEFAULT_COOLDOWN.as_secs()),
        }
    }

    /// Record the outcome of one round and recompute the cooldown.
    pub fn record_attempt(&self, found_amount: u64, friends_checked: u64) {
        let now = self.clock.now();
        let success = found_amount > 0;

        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.friends_checked
            .fetch_add(friends_checked, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
            self.cumulative_yield
                .fetch_add(found_amount, Ordering::Relaxed);
            self.last_success_at.fetch_max(now, Ordering::Relaxed);
        }
        self.last_attempt_at.fetch_max(now, Ordering::Relaxed);

        let outcomes = self.push_outcome(success);
        let rate = outcomes.rate().unwrap_or_else(|_| self.lifetime_rate());
        let cooldown = cooldown_for_rate(rate);
        let previous = self.cooldown_secs.swap(cooldown.as_secs(), Ordering::Relaxed);
        if previous != cooldown.as_secs() {
            tracing::info!(
                recent_success_rate = rate,
                from_mins = previous / 60,
                to_mins = cooldown.as_secs() / 60,
                "Cooldown adjusted"
            );
        }
    }

    /// Cooldown computed by the last [`record_attempt`](Self::record_attempt).
    pub fn current_cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs.load(Ordering::Relaxed))
    }

    /// Whether the cooldown since `last_seek_at` has elapsed.
    pub fn is_ready(&self, last_seek_at: Timestamp) -> bool {
        let cooldown = duration_ms(self.current_cooldown());
        self.clock.now().saturating_sub(last_seek_at) >= cooldown
    }

    pub fn snapshot(&self) -> CooldownSnapshot {
        CooldownSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            friends_checked: self.friends_checked.load(Ordering::Relaxed),
            cumulative_yield: self.cumulative_yield.load(Ordering::Relaxed),
            last_attempt_at: timestamp(&self.last_attempt_at),
            last_success_at: timestamp(&self.last_success_at),
            success_rate: self.lifetime_rate(),
            recent_success_rate: self.recent_rate(),
            cooldown_secs: self.cooldown_secs.load(Ordering::Relaxed),
        }
    }

    /// Number of attempts currently in the rolling window.
    pub fn window_len(&self) -> usize {
        self.load_outcomes().filled() as usize
    }

    /// Forget every attempt and restore the default cooldown.
    pub fn reset(&self) {
        self.outcomes.store(OutcomeBits::EMPTY.0, Ordering::Relaxed);
        self.attempts.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.friends_checked.store(0, Ordering::Relaxed);
        self.cumulative_yield.store(0, Ordering::Relaxed);
        self.last_attempt_at.store(NEVER, Ordering::Relaxed);
        self.last_success_at.store(NEVER, Ordering::Relaxed);
        self.cooldown_secs
            .store(DEFAULT_COOLDOWN.as_secs(), Ordering::Relaxed);
        tracing::info!("Cooldown statistics reset");
    }

    fn push_outcome(&self, success: bool) -> OutcomeBits {
        let window = self.window;
        let update = |bits: u64| Some(OutcomeBits(bits).push(success, window).0);
        match self
            .outcomes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, update)
        {
            Ok(previous) | Err(previous) => OutcomeBits(previous).push(success, window),
        }
    }

    fn load_outcomes(&self) -> OutcomeBits {
        OutcomeBits(self.outcomes.load(Ordering::Relaxed))
    }

    fn lifetime_rate(&self) -> f64 {
        let attempts = self.attempts.load(Ordering::Relaxed);
        if attempts == 0 {
            0.0
        } else {
            self.successes.load(Ordering::Relaxed) as f64 / attempts as f64
        }
    }

    fn recent_rate(&self) -> f64 {
        self.load_outcomes()
            .rate()
            .unwrap_or_else(|_| self.lifetime_rate())
    }
}

fn timestamp(value: &AtomicI64) -> Option<Timestamp> {
    match value.load(Ordering::Relaxed) {
        NEVER => None,
        at => Some(at),
    }
}

fn cooldown_for_rate(rate: f64) -> Duration {
    if rate >= HIGH_SUCCESS_RATE {
        MIN_COOLDOWN
    } else if rate >= LOW_SUCCESS_RATE {
        DEFAULT_COOLDOWN
    } else {
        MAX_COOLDOWN
    }
}
