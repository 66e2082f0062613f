//! Analytics REST API Routes
//!
//! Leaderboards are public; resets and cache counters are admin-only.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use manga_core::{ChapterStat, EntityId, MangaStat, PageStat, StatsPeriod};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::manga::LeaderboardQuery;
use super::{admin_only, parse_period};
use crate::error::ApiResult;
use crate::middleware::AuthMiddlewareState;
use crate::services::{top_limit, StatsService};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub period: StatsPeriod,
    /// Ranking sets deleted
    pub removed: u64,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/analytics/manga/top
pub async fn top_manga(
    State(service): State<StatsService>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<MangaStat>>> {
    let period = parse_period(query.period.as_deref())?;
    Ok(Json(service.top_manga(period, top_limit(query.limit)).await?))
}

/// GET /api/v1/analytics/chapters/top
pub async fn top_chapters(
    State(service): State<StatsService>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<ChapterStat>>> {
    let period = parse_period(query.period.as_deref())?;
    Ok(Json(service.top_chapters(period, top_limit(query.limit)).await?))
}

/// GET /api/v1/analytics/pages/top
pub async fn top_pages(
    State(service): State<StatsService>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<PageStat>>> {
    let period = parse_period(query.period.as_deref())?;
    Ok(Json(service.top_pages(period, top_limit(query.limit)).await?))
}

/// GET /api/v1/analytics/manga/:id/views
pub async fn manga_views(
    State(service): State<StatsService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<MangaStat>> {
    Ok(Json(service.manga_views(id).await?))
}

/// POST /api/v1/analytics/reset/:period (admin)
pub async fn reset_period(
    State(service): State<StatsService>,
    Path(period): Path<String>,
) -> ApiResult<Json<ResetResponse>> {
    let period = parse_period(Some(&period))?;
    let removed = service.reset(period).await?;
    tracing::info!(period = %period, removed, "Reset view rankings");
    Ok(Json(ResetResponse { period, removed }))
}

/// GET /api/v1/analytics/stats (admin)
pub async fn cache_stats(State(service): State<StatsService>) -> Json<serde_json::Value> {
    let stats = service.cache_stats();
    Json(json!({
        "cache": stats,
        "hit_rate": stats.hit_rate(),
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(auth: &AuthMiddlewareState) -> Router<AppState> {
    Router::new()
        .route("/manga/top", get(top_manga))
        .route("/manga/:id/views", get(manga_views))
        .route("/chapters/top", get(top_chapters))
        .route("/pages/top", get(top_pages))
        .route("/reset/:period", admin_only(auth, post(reset_period)))
        .route("/stats", admin_only(auth, get(cache_stats)))
}
