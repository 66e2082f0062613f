//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Catalog and cache connectivity check
//!
//! No authentication required for health endpoints. A cache outage only
//! degrades readiness; reads still fall through to the catalog.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use manga_storage::CacheStats;
use serde::{Deserialize, Serialize};

use crate::state::{AppState, HealthState};

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Absent when the catalog lives in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentHealth>,
    pub cache: ComponentHealth,
    pub cache_stats: CacheStats,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_probe(result: Result<u64, String>, failed: HealthStatus) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: failed,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
pub async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    let database = match &state.catalog {
        Some(catalog) => {
            let start = Instant::now();
            let probe = catalog
                .ping()
                .await
                .map(|_| start.elapsed().as_millis() as u64)
                .map_err(|e| format!("Database check failed: {}", e));
            Some(ComponentHealth::from_probe(probe, HealthStatus::Unhealthy))
        }
        None => None,
    };

    let start = Instant::now();
    let probe = state
        .kv
        .ping()
        .await
        .map(|_| start.elapsed().as_millis() as u64)
        .map_err(|e| format!("Cache check failed: {}", e));
    let cache = ComponentHealth::from_probe(probe, HealthStatus::Degraded);

    let overall_status = match (&database, cache.status) {
        (Some(db), _) if db.status != HealthStatus::Healthy => HealthStatus::Unhealthy,
        (_, HealthStatus::Healthy) => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    };
    if overall_status != HealthStatus::Healthy {
        tracing::warn!(status = ?overall_status, "Readiness check not healthy");
    }

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            database,
            cache,
            cache_stats: state.cache.stats(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
