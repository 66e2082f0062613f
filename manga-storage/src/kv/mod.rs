//! KV/ranking store abstraction.
//!
//! The cache-aside wrapper and the analytics engine talk to the store only
//! through [`KvStore`], so production runs against Redis while tests run
//! against [`InMemoryKvStore`].

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

pub use memory::InMemoryKvStore;
pub use redis_store::{RedisConfig, RedisKvStore};

/// String and sorted-set operations over a Redis-like store.
///
/// Every operation is a single atomic store command. No locking or retries
/// happen above this trait.
#[async_trait]
pub trait KvStore: Send + Sync {
    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Get a value. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value with a TTL. A zero TTL stores the value without expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete keys in one command, returning how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Increment an integer counter by one, creating it at zero.
    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.incr_by(key, 1).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    // ========================================================================
    // SORTED-SET OPERATIONS
    // ========================================================================

    /// Add or overwrite a member's score.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()>;

    /// Increment a member's score, creating it at zero. Returns the new score.
    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> CacheResult<f64>;

    /// Members with scores by rank, highest score first. `start` and `stop`
    /// are inclusive ranks; a negative `stop` counts from the end. Equal
    /// scores order by member, reverse lexicographic.
    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> CacheResult<Vec<(String, f64)>>;

    /// All members of a sorted set, in no particular order.
    async fn zmembers(&self, key: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .zrevrange_with_scores(key, 0, -1)
            .await?
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    async fn zrem(&self, key: &str, members: &[String]) -> CacheResult<u64>;

    /// Remove members whose score lies in `[min, max]`, returning how many
    /// were removed. An emptied set is deleted.
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> CacheResult<u64>;

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    /// Give an existing key a new lifetime. `Ok(false)` when the key is
    /// absent. A zero TTL is ignored.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Cheap round trip for health checks.
    async fn ping(&self) -> CacheResult<()>;
}

/// Resolve Redis-style inclusive rank bounds against a collection length.
pub(crate) fn rank_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let resolve = |idx: isize| if idx < 0 { len + idx } else { idx };
    let start = resolve(start).max(0);
    let stop = resolve(stop).min(len - 1);
    if len == 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::rank_bounds;

    #[test]
    fn test_rank_bounds() {
        assert_eq!(rank_bounds(5, 0, -1), Some((0, 4)));
        assert_eq!(rank_bounds(5, 0, 1), Some((0, 1)));
        assert_eq!(rank_bounds(5, 3, 10), Some((3, 4)));
        assert_eq!(rank_bounds(0, 0, -1), None);
        assert_eq!(rank_bounds(5, 4, 2), None);
        assert_eq!(rank_bounds(3, -2, -1), Some((1, 2)));
    }
}
