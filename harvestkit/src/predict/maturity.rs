//! Maturity time prediction.

use dashmap::DashMap;

use crate::clock::{SharedClock, Timestamp, HOUR_MS};

/// Offsets from an observed maturity at which the resource is expected again.
const MATURITY_OFFSETS_MS: [i64; 3] = [6 * HOUR_MS, 12 * HOUR_MS, 18 * HOUR_MS];

/// Step applied when a stored prediction has already elapsed.
const ADVANCE_STEP_MS: i64 = 6 * HOUR_MS;

/// Per-entity prediction of the next time its resource matures.
#[derive(Debug)]
pub struct MaturityPredictor {
    clock: SharedClock,
    predictions: DashMap<String, Timestamp>,
}

impl MaturityPredictor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            predictions: DashMap::new(),
        }
    }

    /// Derive a prediction from a maturity observed at `observed_at`.
    ///
    /// Stores the earliest of `observed_at + {6h, 12h, 18h}` that is still in
    /// the future. When all three have passed the previous prediction is kept.
    pub fn record_observed_maturity(&self, id: &str, observed_at: Timestamp) {
        let now = self.clock.now();
        let next = MATURITY_OFFSETS_MS
            .iter()
            .map(|offset| observed_at.saturating_add(*offset))
            .find(|candidate| *candidate > now);

        match next {
            Some(predicted) => {
                self.predictions.insert(id.to_string(), predicted);
            }
            None => {
                tracing::debug!(id, observed_at, "Observed maturity too old to predict from");
            }
        }
    }

    /// Predicted next maturity for `id`.
    ///
    /// An elapsed prediction is moved to `now + 6h` before being returned.
    pub fn predict_next(&self, id: &str) -> Option<Timestamp> {
        let now = self.clock.now();
        let mut predicted = self.predictions.get_mut(id)?;
        if *predicted <= now {
            *predicted = now.saturating_add(ADVANCE_STEP_MS);
        }
        Some(*predicted)
    }

    /// Order ids by how soon they mature.
    ///
    /// Already mature ids come first, then ids by distance to their
    /// prediction, then ids without a prediction. The sort is stable.
    pub fn sort_by_urgency<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        let now = self.clock.now();
        let mut keyed: Vec<(i64, &str)> = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                let key = match self.predictions.get(id).map(|p| *p) {
                    Some(predicted) if predicted <= now => 0,
                    Some(predicted) => predicted.saturating_sub(now).saturating_abs(),
                    None => i64::MAX,
                };
                (key, id)
            })
            .collect();

        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, id)| id.to_string()).collect()
    }

    /// Raw stored prediction, without advancing it.
    pub fn stored(&self, id: &str) -> Option<Timestamp> {
        self.predictions.get(id).map(|p| *p)
    }

    pub fn clear(&self) {
        self.predictions.clear();
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}
