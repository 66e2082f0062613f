//! Cache-aside wrapper over a [`KvStore`].
//!
//! Reads try the cache first and fall back to a caller-supplied loader;
//! writes in the authoritative store are followed by explicit invalidation.
//! The cache is advisory: apart from the loader's own error, nothing that
//! goes wrong here reaches the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::freshness::CacheRead;
use super::key::{CacheKey, KeyPattern};
use super::stats::{CacheCounters, CacheStats};
use crate::error::CacheResult;
use crate::kv::KvStore;

// ============================================================================
// TTL POLICY
// ============================================================================

/// Lifetime of cached values by key shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Single entities (default: 30 minutes).
    pub item: Duration,
    /// Nested collections such as a manga's chapters (default: 15 minutes).
    pub children: Duration,
    /// Unfiltered listings (default: 10 minutes).
    pub list: Duration,
    /// Leaderboards use [`StatsPeriod::popular_ttl`] unless overridden.
    ///
    /// [`StatsPeriod::popular_ttl`]: manga_core::StatsPeriod::popular_ttl
    pub popular_override: Option<Duration>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            item: Duration::from_secs(30 * 60),
            children: Duration::from_secs(15 * 60),
            list: Duration::from_secs(10 * 60),
            popular_override: None,
        }
    }
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, ttl: Duration) -> Self {
        self.item = ttl;
        self
    }

    pub fn with_children(mut self, ttl: Duration) -> Self {
        self.children = ttl;
        self
    }

    pub fn with_list(mut self, ttl: Duration) -> Self {
        self.list = ttl;
        self
    }

    /// Use one lifetime for every leaderboard regardless of period.
    pub fn with_popular(mut self, ttl: Duration) -> Self {
        self.popular_override = Some(ttl);
        self
    }

    pub fn ttl_for(&self, key: &CacheKey) -> Duration {
        match key {
            CacheKey::Item { .. } => self.item,
            CacheKey::Children { .. } => self.children,
            CacheKey::List { .. } => self.list,
            CacheKey::Popular { period, .. } => {
                self.popular_override.unwrap_or_else(|| period.popular_ttl())
            }
        }
    }
}

// ============================================================================
// CACHE-ASIDE
// ============================================================================

/// Generic read-through / invalidate-on-write cache.
///
/// Concurrent misses on the same key are not deduplicated; each one loads
/// and writes back, last write wins.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
    ttl: TtlPolicy,
    counters: Arc<CacheCounters>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KvStore>, ttl: TtlPolicy) -> Self {
        Self {
            store,
            ttl,
            counters: Arc::new(CacheCounters::default()),
        }
    }

    pub fn with_defaults(store: Arc<dyn KvStore>) -> Self {
        Self::new(store, TtlPolicy::default())
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// [`get_or_load`](Self::get_or_load) with the policy TTL for `key`.
    pub async fn read<T, E, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<CacheRead<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = self.ttl.ttl_for(key);
        self.get_or_load(key, loader, ttl).await
    }

    /// Serve `key` from the cache, or call `loader` and write the result
    /// back with `ttl`.
    ///
    /// A failing or undecodable cache read counts as a miss. A loader error
    /// is returned unchanged and nothing is written. A failing write-back is
    /// logged and the loaded value is still returned.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        loader: F,
        ttl: Duration,
    ) -> Result<CacheRead<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let encoded = key.to_string();

        match self.store.get(&encoded).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    self.counters.hit();
                    tracing::trace!(key = %encoded, "Cache hit");
                    return Ok(CacheRead::from_cache(value));
                }
                Err(e) => {
                    tracing::warn!(key = %encoded, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %encoded, error = %e, "Cache read failed, loading from store");
            }
        }

        self.counters.miss();
        let value = loader().await?;
        self.counters.load();
        self.write_back(key, &encoded, &value, ttl).await;
        Ok(CacheRead::from_storage(value))
    }

    async fn write_back<T: Serialize>(
        &self,
        key: &CacheKey,
        encoded: &str,
        value: &T,
        ttl: Duration,
    ) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.counters.write_failure();
                tracing::warn!(key = %encoded, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        if let Err(e) = self.store.set(encoded, &bytes, ttl).await {
            self.counters.write_failure();
            tracing::warn!(key = %encoded, error = %e, "Failed to write cache entry");
            return;
        }

        if let Some(pattern) = key.pattern() {
            let index = pattern.index_key();
            if let Err(e) = self.register_in_index(&index, encoded, ttl).await {
                self.counters.write_failure();
                tracing::warn!(
                    key = %encoded,
                    index = %index,
                    error = %e,
                    "Failed to register cache key in index"
                );
            }
        }
    }

    /// Record `encoded` in `index`, scored by the unix millisecond at which
    /// the entry expires. Members already past their expiry are pruned
    /// first, and the index itself lives as long as its longest member.
    async fn register_in_index(
        &self,
        index: &str,
        encoded: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let now = unix_millis();
        self.store
            .zrem_range_by_score(index, f64::NEG_INFINITY, now)
            .await?;

        if ttl.is_zero() {
            return self.store.zadd(index, encoded, f64::INFINITY).await;
        }
        let expires_at = now + ttl.as_millis() as f64;
        self.store.zadd(index, encoded, expires_at).await?;

        let latest = self
            .store
            .zrevrange_with_scores(index, 0, 0)
            .await?
            .first()
            .map_or(expires_at, |(_, score)| *score);
        if latest.is_finite() {
            let remaining = Duration::from_millis((latest - now).max(1.0) as u64);
            self.store.expire(index, remaining).await?;
        }
        Ok(())
    }

    /// Delete specific keys.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        let encoded: Vec<String> = keys.iter().map(ToString::to_string).collect();
        match self.store.delete(&encoded).await {
            Ok(removed) => {
                tracing::debug!(keys = ?encoded, removed, "Invalidated cache keys");
            }
            Err(e) => {
                self.counters.write_failure();
                tracing::warn!(keys = ?encoded, error = %e, "Failed to invalidate cache keys");
            }
        }
    }

    /// Delete every key issued under `pattern`, then the index itself.
    pub async fn invalidate_pattern(&self, pattern: KeyPattern) {
        let index = pattern.index_key();
        let mut keys = match self.store.zmembers(&index).await {
            Ok(members) => members,
            Err(e) => {
                self.counters.write_failure();
                tracing::warn!(pattern = %pattern, error = %e, "Failed to read cache key index");
                return;
            }
        };
        keys.push(index);

        match self.store.delete(&keys).await {
            Ok(removed) => {
                tracing::debug!(pattern = %pattern, removed, "Invalidated cache pattern");
            }
            Err(e) => {
                self.counters.write_failure();
                tracing::warn!(pattern = %pattern, error = %e, "Failed to invalidate cache pattern");
            }
        }
    }
}

fn unix_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_millis() as f64)
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("ttl", &self.ttl)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}
