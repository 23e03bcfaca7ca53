//! Error types for the optimization core and its collaborators.
//!
//! The optimizer itself never returns errors to callers. Internal derived
//! computations return [`ComputeError`] and the public wrapper logs it and
//! substitutes a safe fallback. Collaborators (entity fetch, entity poll)
//! report failures through [`FetchError`] and [`PollError`].

use thiserror::Error;

/// Failure of an internal derived computation.
///
/// Never escapes the public API; see the module docs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    /// An hour-of-day outside `0..=23` was supplied.
    #[error("hour of day out of range: {0}")]
    InvalidHour(u32),

    /// A rolling window was read while empty.
    #[error("rolling window '{0}' is empty")]
    EmptyWindow(&'static str),

    /// A timestamp calculation overflowed or fell outside the calendar range.
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Errors reported by an [`EntityFetcher`](crate::cache::EntityFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote call failed.
    #[error("entity fetch failed: {0}")]
    Remote(String),

    /// The remote call returned data that could not be interpreted.
    #[error("malformed entity list: {0}")]
    Malformed(String),
}

/// Errors reported by an [`EntityPoller`](crate::harvest::EntityPoller).
#[derive(Debug, Error)]
pub enum PollError {
    /// The remote call failed.
    #[error("poll of '{id}' failed: {reason}")]
    Remote { id: String, reason: String },

    /// The remote side rejected the call because of rate limiting.
    #[error("poll of '{id}' was rate limited")]
    RateLimited { id: String },
}
