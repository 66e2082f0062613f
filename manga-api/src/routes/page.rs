//! Page REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use manga_core::{EntityId, NewPage, Page, PageUpdate};

use super::{admin_only, cached_json};
use crate::error::ApiResult;
use crate::middleware::AuthMiddlewareState;
use crate::services::PageService;
use crate::state::AppState;

/// GET /api/v1/pages/:id
pub async fn get_page(
    State(service): State<PageService>,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    Ok(cached_json(service.get(id).await?))
}

/// POST /api/v1/pages (admin)
pub async fn create_page(
    State(service): State<PageService>,
    Json(input): Json<NewPage>,
) -> ApiResult<impl IntoResponse> {
    let page = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// PUT /api/v1/pages/:id (admin)
pub async fn update_page(
    State(service): State<PageService>,
    Path(id): Path<EntityId>,
    Json(update): Json<PageUpdate>,
) -> ApiResult<Json<Page>> {
    Ok(Json(service.update(id, update).await?))
}

/// DELETE /api/v1/pages/:id (admin)
pub async fn delete_page(
    State(service): State<PageService>,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router(auth: &AuthMiddlewareState) -> Router<AppState> {
    Router::new()
        .route("/", admin_only(auth, post(create_page)))
        .route(
            "/:id",
            get(get_page).merge(admin_only(auth, put(update_page).delete(delete_page))),
        )
}
