//! In-process KV/ranking store used for tests and single-node development.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{rank_bounds, KvStore};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// DashMap-backed store with Redis semantics for the commands the catalog
/// uses. Expired entries are dropped lazily on access.
///
/// The store can be switched into an unavailable state to exercise the
/// failure paths of its callers.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, Entry>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail with [`CacheError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "in-memory store switched off".to_string(),
            });
        }
        Ok(())
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired() {
            self.entries.remove(key);
            return None;
        }
        Some(entry)
    }

    fn wrong_type(command: &'static str) -> CacheError {
        CacheError::command(
            command,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        )
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check_available()?;
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(Self::wrong_type("GET")),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        self.entries
            .insert(key.to_string(), Entry::new(Value::Bytes(value.to_vec()), ttl));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.check_available()?;
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check_available()?;
        Ok(self.live(key).is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.check_available()?;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Bytes(b"0".to_vec()), Duration::ZERO));
        if entry.is_expired() {
            *entry = Entry::new(Value::Bytes(b"0".to_vec()), Duration::ZERO);
        }
        let current = match &entry.value {
            Value::Bytes(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| {
                    CacheError::command("INCRBY", "value is not an integer or out of range")
                })?,
            Value::SortedSet(_) => return Err(Self::wrong_type("INCRBY")),
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::command("INCRBY", "increment would overflow"))?;
        entry.value = Value::Bytes(next.to_string().into_bytes());
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()> {
        self.check_available()?;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::SortedSet(HashMap::new()), Duration::ZERO));
        if entry.is_expired() {
            *entry = Entry::new(Value::SortedSet(HashMap::new()), Duration::ZERO);
        }
        match &mut entry.value {
            Value::SortedSet(set) => {
                set.insert(member.to_string(), score);
                Ok(())
            }
            Value::Bytes(_) => Err(Self::wrong_type("ZADD")),
        }
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> CacheResult<f64> {
        self.check_available()?;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::SortedSet(HashMap::new()), Duration::ZERO));
        if entry.is_expired() {
            *entry = Entry::new(Value::SortedSet(HashMap::new()), Duration::ZERO);
        }
        match &mut entry.value {
            Value::SortedSet(set) => {
                let score = set.entry(member.to_string()).or_insert(0.0);
                *score += delta;
                Ok(*score)
            }
            Value::Bytes(_) => Err(Self::wrong_type("ZINCRBY")),
        }
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        self.check_available()?;
        let set = match self.live(key) {
            None => return Ok(Vec::new()),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => set,
            Some(_) => return Err(Self::wrong_type("ZREVRANGE")),
        };

        let mut ranked: Vec<(String, f64)> = set.into_iter().collect();
        ranked.sort_by(|(ma, sa), (mb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| mb.cmp(ma))
        });

        Ok(match rank_bounds(ranked.len(), start, stop) {
            Some((from, to)) => ranked.drain(from..=to).collect(),
            None => Vec::new(),
        })
    }

    async fn zrem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.check_available()?;
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(0);
        };
        let (removed, now_empty) = match &mut entry.value {
            Value::SortedSet(set) => {
                let removed = members.iter().filter(|m| set.remove(*m).is_some()).count();
                (removed as u64, set.is_empty())
            }
            Value::Bytes(_) => return Err(Self::wrong_type("ZREM")),
        };
        drop(entry);
        if now_empty {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> CacheResult<u64> {
        self.check_available()?;
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(0);
        };
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return Ok(0);
        }
        let (removed, now_empty) = match &mut entry.value {
            Value::SortedSet(set) => {
                let before = set.len();
                set.retain(|_, score| *score < min || *score > max);
                ((before - set.len()) as u64, set.is_empty())
            }
            Value::Bytes(_) => return Err(Self::wrong_type("ZREMRANGEBYSCORE")),
        };
        drop(entry);
        if now_empty {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.check_available()?;
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return Ok(false);
        }
        if !ttl.is_zero() {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(true)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_available()
    }
}
