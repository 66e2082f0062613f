//! API Configuration Module
//!
//! Server settings (bind address, request deadline, CORS) plus the
//! [`AppConfig`] aggregate that collects every component's configuration.
//! Everything is loaded from `MANGA_*` environment variables with defaults
//! suitable for local development.

use std::net::SocketAddr;
use std::time::Duration;

use manga_core::{ConfigError, MangaError, MangaResult};
use manga_storage::RedisConfig;

use crate::auth::TokenConfig;
use crate::db::DbConfig;
use crate::telemetry::TelemetryConfig;

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Deadline applied to every request
    pub request_timeout: Duration,

    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
        }
    }
}

impl ServerConfig {
    /// Create ServerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MANGA_API_HOST`: bind host (default: 0.0.0.0)
    /// - `PORT` or `MANGA_API_PORT`: bind port (default: 8080)
    /// - `MANGA_REQUEST_TIMEOUT_SECS`: per-request deadline (default: 30)
    /// - `MANGA_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `MANGA_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `MANGA_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("MANGA_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("MANGA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: std::env::var("MANGA_API_HOST").unwrap_or(defaults.host),
            port,
            request_timeout: std::env::var("MANGA_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            cors_origins,
            cors_allow_credentials: std::env::var("MANGA_CORS_ALLOW_CREDENTIALS")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            cors_max_age_secs: std::env::var("MANGA_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// Resolve the socket address to bind.
    pub fn bind_addr(&self) -> MangaResult<SocketAddr> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| {
            MangaError::Config(ConfigError::InvalidValue {
                field: "MANGA_API_HOST".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
    }
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Every component's configuration, loaded together at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub token: TokenConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            db: DbConfig::from_env(),
            redis: RedisConfig::from_env(),
            token: TokenConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
        }
    }

    /// Reject configurations that must not serve traffic.
    pub fn validate(&self) -> MangaResult<()> {
        self.token.validate_for_production()?;
        if self.server.request_timeout.is_zero() {
            return Err(MangaError::Config(ConfigError::InvalidValue {
                field: "MANGA_REQUEST_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr() -> MangaResult<()> {
        let addr = ServerConfig::default().bind_addr()?;
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_unspecified());
        Ok(())
    }

    #[test]
    fn test_bad_host_is_config_error() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.bind_addr(),
            Err(MangaError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig {
            server: ServerConfig::default(),
            db: DbConfig::default(),
            redis: RedisConfig::default(),
            token: TokenConfig::default(),
            telemetry: TelemetryConfig::default(),
        };
        config.server.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
