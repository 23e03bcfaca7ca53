//! In-memory caches that keep the harvesting loop from wasting remote calls.
//!
//! - [`EntityCache`]: list of pollable entities with a day/night TTL and
//!   generation-based eviction.
//! - [`NegativeResultCache`]: entities whose last poll was empty or which
//!   are currently shielded.
//!
//! All state is process-lifetime only; nothing is persisted.

mod entity;
mod negative;

pub use entity::{
    CacheEntry, EmptyFetcher, EntityCache, EntityFetcher, EntitySummary, StaticFetcher,
};
pub use negative::NegativeResultCache;
