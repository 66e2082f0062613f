//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Catalog reads (manga, chapters, pages), served through the cache
//! - Admin catalog mutations
//! - Leaderboards and stats resets under /analytics
//! - Account management under /users
//! - Health checks at /health/* (public)

pub mod analytics;
pub mod chapter;
pub mod health;
pub mod manga;
pub mod page;
pub mod user;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    BoxError, Json, Router,
};
use manga_core::StatsPeriod;
use manga_storage::CacheRead;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, require_admin, AuthMiddlewareState};
use crate::state::AppState;

/// Response header telling whether a read was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

// ============================================================================
// ROUTER
// ============================================================================

/// Build the complete router.
///
/// # Layers (outer to inner)
/// 1. Tracing - one span per request, preflights included
/// 2. CORS - answers preflight requests
/// 3. Timeout - every request runs under the configured deadline
/// 4. Auth / admin gate - per route, only where required
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let auth = state.auth.clone();

    let api_routes = Router::new()
        .nest("/manga", manga::create_router(&auth))
        .nest("/chapters", chapter::create_router(&auth))
        .nest("/pages", page::create_router(&auth))
        .nest("/analytics", analytics::create_router(&auth))
        .nest("/users", user::create_router(&auth));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router())
        .fallback(fallback)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(config))
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(config.request_timeout),
        )
}

async fn fallback() -> ApiError {
    ApiError::not_found("No route matches this path")
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request exceeded its deadline");
        ApiError::timeout("request")
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::internal_error("Unhandled middleware error")
    }
}

// ============================================================================
// ROUTE HELPERS
// ============================================================================

/// Require a valid access token on `route`.
pub(crate) fn authenticated(
    auth: &AuthMiddlewareState,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(auth.clone(), auth_middleware))
}

/// Require a valid access token with the admin role on `route`.
pub(crate) fn admin_only(
    auth: &AuthMiddlewareState,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    authenticated(auth, route.route_layer(from_fn(require_admin)))
}

/// JSON body plus an `x-cache: HIT|MISS` header.
pub(crate) fn cached_json<T: Serialize>(read: CacheRead<T>) -> Response {
    let status = if read.was_cache_hit() { "HIT" } else { "MISS" };
    (
        [(HeaderName::from_static(CACHE_STATUS_HEADER), status)],
        Json(read.into_value()),
    )
        .into_response()
}

/// Parse a `period` query value, defaulting to all-time.
pub(crate) fn parse_period(raw: Option<&str>) -> ApiResult<StatsPeriod> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(StatsPeriod::AllTime),
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::invalid_input(format!(
                "Unknown period '{}': expected daily, weekly, monthly or all_time",
                raw
            ))
        }),
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ServerConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([HeaderName::from_static(CACHE_STATUS_HEADER)])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}
