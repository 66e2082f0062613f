//! Axum Middleware for Authentication and Authorization
//!
//! - Validates `Authorization: Bearer <access token>` headers
//! - Injects [`AuthContext`] into request extensions
//! - Returns 401 for missing, invalid or expired tokens
//! - Returns 403 when an admin-only route is hit by a regular user

use crate::auth::{AuthContext, TokenService};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use manga_core::MangaError;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub tokens: TokenService,
}

impl AuthMiddlewareState {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTIONS
// ============================================================================

/// Authenticate the request from its bearer token.
///
/// Only access tokens are accepted; a refresh token fails signature
/// verification because it is signed with the other secret.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            AuthMiddlewareError(ApiError::unauthorized(
                "Authentication required: provide Authorization header",
            ))
        })?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthMiddlewareError(ApiError::invalid_token(
            "Authorization header must use Bearer scheme",
        ))
    })?;

    let claims = state.tokens.validate_access(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        AuthMiddlewareError(ApiError::from(MangaError::from(e)))
    })?;

    request.extensions_mut().insert(AuthContext::from(claims));
    Ok(next.run(request).await)
}

/// Reject authenticated callers that are not admins.
///
/// Must be layered inside [`auth_middleware`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthMiddlewareError> {
    let auth = extract_auth_context(&request).map_err(AuthMiddlewareError)?;
    if !auth.is_admin() {
        tracing::warn!(user_id = auth.user_id, "Non-admin hit admin route");
        return Err(AuthMiddlewareError(ApiError::forbidden(
            "Admin role required",
        )));
    }
    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed Axum extractor for the authenticated caller.
///
/// `auth_middleware` must run on the route; without it the extractor
/// answers 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// AuthContext injected by the middleware.
pub fn extract_auth_context(request: &Request) -> ApiResult<&AuthContext> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Auth context missing from request"))
}
