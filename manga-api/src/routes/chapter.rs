//! Chapter REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use manga_core::{Chapter, ChapterUpdate, EntityId, NewChapter};

use super::{admin_only, cached_json};
use crate::error::ApiResult;
use crate::middleware::AuthMiddlewareState;
use crate::services::ChapterService;
use crate::state::AppState;

/// GET /api/v1/chapters/:id
pub async fn get_chapter(
    State(service): State<ChapterService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    Ok(cached_json(service.get(id).await?))
}

/// GET /api/v1/chapters/:id/pages
pub async fn list_pages(
    State(service): State<ChapterService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    Ok(cached_json(service.pages(id).await?))
}

/// POST /api/v1/chapters (admin)
pub async fn create_chapter(
    State(service): State<ChapterService>,
    Json(input): Json<NewChapter>,
) -> ApiResult<impl IntoResponse> {
    let chapter = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

/// PUT /api/v1/chapters/:id (admin)
pub async fn update_chapter(
    State(service): State<ChapterService>,
    Path(id): Path<EntityId>,
    Json(update): Json<ChapterUpdate>,
) -> ApiResult<Json<Chapter>> {
    Ok(Json(service.update(id, update).await?))
}

/// DELETE /api/v1/chapters/:id (admin)
pub async fn delete_chapter(
    State(service): State<ChapterService>,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router(auth: &AuthMiddlewareState) -> Router<AppState> {
    Router::new()
        .route("/", admin_only(auth, post(create_chapter)))
        .route(
            "/:id",
            get(get_chapter).merge(admin_only(
                auth,
                put(update_chapter).delete(delete_chapter),
            )),
        )
        .route("/:id/pages", get(list_pages))
}
