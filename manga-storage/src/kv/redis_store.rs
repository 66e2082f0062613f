//! Redis-backed KV/ranking store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, RedisResult};

use super::KvStore;
use crate::error::{CacheError, CacheResult};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Redis connection settings.
#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// How long to wait for a pooled connection.
    pub connect_timeout: Duration,
    /// Upper bound on any single command.
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            pool_size: 16,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    ///
    /// - `MANGA_REDIS_HOST` (default: localhost)
    /// - `MANGA_REDIS_PORT` (default: 6379)
    /// - `MANGA_REDIS_PASSWORD` (default: none)
    /// - `MANGA_REDIS_DB` (default: 0)
    /// - `MANGA_REDIS_POOL_SIZE` (default: 16)
    /// - `MANGA_REDIS_CONNECT_TIMEOUT_MS` (default: 5000)
    /// - `MANGA_REDIS_COMMAND_TIMEOUT_MS` (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("MANGA_REDIS_HOST").unwrap_or(defaults.host),
            port: env_parse("MANGA_REDIS_PORT").unwrap_or(defaults.port),
            password: std::env::var("MANGA_REDIS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            db: env_parse("MANGA_REDIS_DB").unwrap_or(defaults.db),
            pool_size: env_parse("MANGA_REDIS_POOL_SIZE").unwrap_or(defaults.pool_size),
            connect_timeout: env_parse("MANGA_REDIS_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            command_timeout: env_parse("MANGA_REDIS_COMMAND_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.command_timeout),
        }
    }

    /// Connection URL. The password is embedded, so never log the result.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> CacheResult<Pool> {
        let mut cfg = deadpool_redis::Config::from_url(self.url());
        let mut pool_config = PoolConfig::new(self.pool_size);
        pool_config.timeouts.wait = Some(self.connect_timeout);
        pool_config.timeouts.create = Some(self.connect_timeout);
        pool_config.timeouts.recycle = Some(self.connect_timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable {
                reason: format!("failed to create Redis pool: {}", e),
            })
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Score bound in ZRANGEBYSCORE syntax.
fn score_bound(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// STORE
// ============================================================================

/// [`KvStore`] over a deadpool-redis pool. Each command is bounded by the
/// configured command timeout.
#[derive(Clone)]
pub struct RedisKvStore {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisKvStore {
    pub fn new(pool: Pool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    pub fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        Ok(Self::new(config.create_pool()?, config.command_timeout))
    }

    async fn conn(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| CacheError::Unavailable {
            reason: e.to_string(),
        })
    }

    async fn run<T, F>(&self, command: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::command(command, e)),
            Err(_) => Err(CacheError::Timeout {
                command,
                after: self.command_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore")
            .field("pool_size", &self.pool.status().max_size)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        self.run("GET", conn.get::<_, Option<Vec<u8>>>(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        if ttl.is_zero() {
            self.run("SET", conn.set::<_, _, ()>(key, value.to_vec())).await
        } else {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            self.run("PSETEX", conn.pset_ex::<_, _, ()>(key, value.to_vec(), millis))
                .await
        }
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        self.run("DEL", conn.del::<_, u64>(keys.to_vec())).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        self.run("EXISTS", conn.exists::<_, bool>(key)).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        self.run("INCRBY", conn.incr::<_, _, i64>(key, delta)).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        self.run("ZADD", conn.zadd::<_, _, _, ()>(key, member, score))
            .await
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> CacheResult<f64> {
        let mut conn = self.conn().await?;
        self.run("ZINCRBY", conn.zincr::<_, _, _, f64>(key, member, delta))
            .await
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        let mut conn = self.conn().await?;
        self.run(
            "ZREVRANGE",
            conn.zrevrange_withscores::<_, Vec<(String, f64)>>(key, start, stop),
        )
        .await
    }

    async fn zrem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        self.run("ZREM", conn.zrem::<_, _, u64>(key, members.to_vec())).await
    }

    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        self.run(
            "ZREMRANGEBYSCORE",
            conn.zrembyscore::<_, _, _, u64>(key, score_bound(min), score_bound(max)),
        )
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        if ttl.is_zero() {
            return self.run("EXISTS", conn.exists::<_, bool>(key)).await;
        }
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.run("PEXPIRE", conn.pexpire::<_, bool>(key, millis)).await
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let pong: String = self
            .run("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        tracing::debug!(reply = %pong, "Redis ping");
        Ok(())
    }
}
