//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an env filter and either a
//! JSON or a human-readable formatter.

use std::str::FromStr;

use manga_core::{ConfigError, MangaError, MangaResult, ParseEnumError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "manga_api=debug,manga_storage=info,tower_http=debug,info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ParseEnumError::new("log format", other)),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Output format
    pub format: LogFormat,
    /// Service name attached to the startup line
    pub service_name: String,
    /// Environment (production, staging, development)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
            service_name: "manga-api".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `MANGA_LOG_LEVEL`: filter directive (overridden by `RUST_LOG`)
    /// - `MANGA_LOG_FORMAT`: `json` or `pretty` (default: json)
    /// - `MANGA_SERVICE_NAME` (default: manga-api)
    /// - `MANGA_ENVIRONMENT` (default: development)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("MANGA_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: std::env::var("MANGA_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
            service_name: std::env::var("MANGA_SERVICE_NAME").unwrap_or(defaults.service_name),
            environment: std::env::var("MANGA_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}

/// Install the global subscriber. Call once, before any tracing occurs.
pub fn init_tracing(config: &TelemetryConfig) -> MangaResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| {
        MangaError::Config(ConfigError::InvalidValue {
            field: "tracing subscriber".to_string(),
            value: format!("{:?}", config.format),
            reason: e.to_string(),
        })
    })?;

    tracing::info!(
        service_name = config.service_name,
        environment = config.environment,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_from_env() {
        let _format = EnvVarGuard::set("MANGA_LOG_FORMAT", Some("pretty"));
        let _name = EnvVarGuard::set("MANGA_SERVICE_NAME", None);
        let config = TelemetryConfig::from_env();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.service_name, "manga-api");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
