//! Cache-aside layer for catalog reads.
//!
//! - [`CacheKey`] / [`KeyPattern`]: typed keys and their string schema
//! - [`CacheAside`]: read-through with explicit invalidation
//! - [`CacheRead`]: hit/miss provenance of a read
//! - [`CacheStats`]: hit, miss, load and failure counters

mod aside;
mod freshness;
mod key;
mod stats;

pub use aside::{CacheAside, TtlPolicy};
pub use freshness::CacheRead;
pub use key::{CacheKey, ChildCollection, KeyPattern};
pub use stats::CacheStats;
