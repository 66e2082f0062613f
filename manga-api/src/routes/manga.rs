//! Manga REST API Routes
//!
//! Reads are public and cached; mutations require an admin token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use manga_core::{EntityId, Manga, MangaFilter, MangaStatus, MangaUpdate, NewManga};
use serde::Deserialize;

use super::{admin_only, cached_json, parse_period};
use crate::error::ApiResult;
use crate::middleware::AuthMiddlewareState;
use crate::services::{top_limit, MangaService};
use crate::state::AppState;

// ============================================================================
// QUERY / BODY TYPES
// ============================================================================

/// `GET /manga` query. `genres` is comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMangaQuery {
    pub title: Option<String>,
    pub status: Option<MangaStatus>,
    pub genres: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<ListMangaQuery> for MangaFilter {
    fn from(query: ListMangaQuery) -> Self {
        let genres = query
            .genres
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();

        MangaFilter {
            title: query.title,
            genres,
            status: query.status,
            limit: query.limit.unwrap_or_default(),
            offset: query.offset.unwrap_or_default(),
        }
        .normalized()
    }
}

/// `period` and `limit` for leaderboards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub period: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreRequest {
    pub genre: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/manga
pub async fn list_manga(
    State(service): State<MangaService>,
    Query(query): Query<ListMangaQuery>,
) -> ApiResult<Response> {
    Ok(cached_json(service.list(query.into()).await?))
}

/// GET /api/v1/manga/popular
pub async fn popular_manga(
    State(service): State<MangaService>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Response> {
    let period = parse_period(query.period.as_deref())?;
    let read = service.popular(period, top_limit(query.limit)).await?;
    Ok(cached_json(read))
}

/// GET /api/v1/manga/:id
pub async fn get_manga(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    Ok(cached_json(service.get(id).await?))
}

/// GET /api/v1/manga/:id/chapters
pub async fn list_chapters(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    Ok(cached_json(service.chapters(id).await?))
}

/// GET /api/v1/manga/:id/genres
pub async fn list_genres(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(service.genres(id).await?))
}

/// POST /api/v1/manga (admin)
pub async fn create_manga(
    State(service): State<MangaService>,
    Json(input): Json<NewManga>,
) -> ApiResult<impl IntoResponse> {
    let manga = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(manga)))
}

/// PUT /api/v1/manga/:id (admin)
pub async fn update_manga(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
    Json(update): Json<MangaUpdate>,
) -> ApiResult<Json<Manga>> {
    Ok(Json(service.update(id, update).await?))
}

/// DELETE /api/v1/manga/:id (admin)
pub async fn delete_manga(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/manga/:id/genres (admin)
pub async fn add_genre(
    State(service): State<MangaService>,
    Path(id): Path<EntityId>,
    Json(request): Json<GenreRequest>,
) -> ApiResult<StatusCode> {
    service.add_genre(id, &request.genre).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/manga/:id/genres/:genre (admin)
pub async fn remove_genre(
    State(service): State<MangaService>,
    Path((id, genre)): Path<(EntityId, String)>,
) -> ApiResult<StatusCode> {
    service.remove_genre(id, &genre).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(auth: &AuthMiddlewareState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_manga).merge(admin_only(auth, post(create_manga))),
        )
        .route("/popular", get(popular_manga))
        .route(
            "/:id",
            get(get_manga).merge(admin_only(auth, put(update_manga).delete(delete_manga))),
        )
        .route("/:id/chapters", get(list_chapters))
        .route(
            "/:id/genres",
            get(list_genres).merge(admin_only(auth, post(add_genre))),
        )
        .route("/:id/genres/:genre", admin_only(auth, delete(remove_genre)))
}
