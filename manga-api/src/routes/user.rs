//! User REST API Routes
//!
//! Registration, login and token refresh are public. Profile endpoints
//! operate on the caller identified by the access token.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use manga_core::{PasswordChange, ProfileUpdate, TokenPair, User, UserCredentials, UserRegistration};
use serde::{Deserialize, Serialize};

use super::authenticated;
use crate::error::ApiResult;
use crate::middleware::{AuthExtractor, AuthMiddlewareState};
use crate::services::{AuthSession, UserService};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/users/register
pub async fn register(
    State(service): State<UserService>,
    Json(registration): Json<UserRegistration>,
) -> ApiResult<impl IntoResponse> {
    let session = service.register(registration).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/users/login
pub async fn login(
    State(service): State<UserService>,
    Json(credentials): Json<UserCredentials>,
) -> ApiResult<Json<AuthSession>> {
    Ok(Json(service.login(credentials).await?))
}

/// POST /api/v1/users/refresh
pub async fn refresh(
    State(service): State<UserService>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(service.refresh(&request.refresh_token).await?))
}

/// GET /api/v1/users/me
pub async fn get_me(
    State(service): State<UserService>,
    auth: AuthExtractor,
) -> ApiResult<Json<User>> {
    Ok(Json(service.profile(auth.user_id).await?))
}

/// PUT /api/v1/users/me
pub async fn update_me(
    State(service): State<UserService>,
    auth: AuthExtractor,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    Ok(Json(service.update_profile(auth.user_id, update).await?))
}

/// PUT /api/v1/users/me/password
pub async fn change_password(
    State(service): State<UserService>,
    auth: AuthExtractor,
    Json(change): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    service.change_password(auth.user_id, change).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users/logout
///
/// Tokens are stateless; the client discards them.
pub async fn logout(auth: AuthExtractor) -> StatusCode {
    tracing::info!(user_id = auth.user_id, "User logged out");
    StatusCode::NO_CONTENT
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(auth: &AuthMiddlewareState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", authenticated(auth, get(get_me).put(update_me)))
        .route("/me/password", authenticated(auth, put(change_password)))
        .route("/logout", authenticated(auth, post(logout)))
}
