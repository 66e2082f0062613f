//! Manga Storage - Stores, Cache-Aside and Analytics
//!
//! Store seams used by the catalog service:
//! - [`kv`]: the KV/ranking store trait with Redis and in-memory backends
//! - [`catalog`]: authoritative repository traits and an in-memory catalog
//! - [`cache`]: cache-aside reads with typed keys and pattern invalidation
//! - [`analytics`]: view counting and period leaderboards

pub mod analytics;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod kv;

pub use analytics::{counter_key, ranking_key, AnalyticsEngine, RankedSubject, ViewEvent};
pub use cache::{
    CacheAside, CacheKey, CacheRead, CacheStats, ChildCollection, KeyPattern, TtlPolicy,
};
pub use catalog::{
    ChapterRepository, InMemoryCatalog, MangaRepository, PageRepository, UserRepository,
};
pub use error::{CacheError, CacheResult};
pub use kv::{InMemoryKvStore, KvStore, RedisConfig, RedisKvStore};
