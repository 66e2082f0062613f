//! Provenance of a cache-aside read.

use chrono::{DateTime, Utc};

/// Result of a cache-aside read, carrying where the value came from.
///
/// Cached values are stored as plain JSON with no envelope, so a hit
/// cannot tell when it was written; `cached_at` is only known for values
/// that were just loaded and written back.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    cached_at: Option<DateTime<Utc>>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A value served from the cache.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            cached_at: None,
            was_cache_hit: true,
        }
    }

    /// A value produced by the loader (cache miss).
    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            cached_at: Some(Utc::now()),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Transform the value, keeping the provenance.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}
