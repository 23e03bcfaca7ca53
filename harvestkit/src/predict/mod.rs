//! Maturity prediction.
//!
//! [`MaturityPredictor`] estimates when each entity's resource will be ready
//! again so the harvesting loop can poll ripe entities first.
//! [`PeakHistory`] records which daily peak windows an entity yields in.

mod maturity;
mod peak;

pub use maturity::MaturityPredictor;
pub use peak::{PeakHistory, PeakRecord};
