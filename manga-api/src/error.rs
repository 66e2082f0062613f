//! Error Types for the Manga API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum whose wire names match `MangaError::code()`
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use manga_core::{EntityKind, ErrorKind, MangaError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Request is authenticated but the role is insufficient
    Forbidden,

    /// Username/password pair did not match
    InvalidCredentials,

    /// Token is malformed, wrongly signed or otherwise unusable
    JwtInvalid,

    /// Token has expired
    JwtExpired,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationError,

    /// Path or query parameter could not be parsed
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    MangaNotFound,
    ChapterNotFound,
    PageNotFound,
    UserNotFound,

    /// No route matched
    NotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Unique field already taken
    Conflict,

    /// Username or email already registered
    UserAlreadyExists,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Request exceeded its deadline
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized
            | ErrorCode::InvalidCredentials
            | ErrorCode::JwtInvalid
            | ErrorCode::JwtExpired => StatusCode::UNAUTHORIZED,

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationError | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::MangaNotFound
            | ErrorCode::ChapterNotFound
            | ErrorCode::PageNotFound
            | ErrorCode::UserNotFound
            | ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::Conflict | ErrorCode::UserAlreadyExists => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidCredentials => "Invalid username or password",
            ErrorCode::JwtInvalid => "Invalid authentication token",
            ErrorCode::JwtExpired => "Authentication token has expired",

            ErrorCode::ValidationError => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input",

            ErrorCode::MangaNotFound => "Manga not found",
            ErrorCode::ChapterNotFound => "Chapter not found",
            ErrorCode::PageNotFound => "Page not found",
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::NotFound => "Resource not found",

            ErrorCode::Conflict => "Resource already exists",
            ErrorCode::UserAlreadyExists => "User already exists",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field errors and the like)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::JwtInvalid, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::JwtExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM OTHER ERROR TYPES
// ============================================================================

impl From<MangaError> for ApiError {
    fn from(err: MangaError) -> Self {
        let code = match err.kind() {
            ErrorKind::NotFound => match &err {
                MangaError::NotFound { entity, .. } => match entity {
                    EntityKind::Manga => ErrorCode::MangaNotFound,
                    EntityKind::Chapter => ErrorCode::ChapterNotFound,
                    EntityKind::Page => ErrorCode::PageNotFound,
                    EntityKind::User => ErrorCode::UserNotFound,
                },
                _ => ErrorCode::NotFound,
            },
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::Conflict => match &err {
                MangaError::Conflict {
                    entity: EntityKind::User,
                    ..
                } => ErrorCode::UserAlreadyExists,
                _ => ErrorCode::Conflict,
            },
            ErrorKind::Unauthorized => ErrorCode::Unauthorized,
            ErrorKind::InvalidCredentials => ErrorCode::InvalidCredentials,
            ErrorKind::TokenInvalid => ErrorCode::JwtInvalid,
            ErrorKind::TokenExpired => ErrorCode::JwtExpired,
            ErrorKind::Database => {
                tracing::error!(error = %err, "Database error");
                ErrorCode::DatabaseError
            }
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Internal error");
                ErrorCode::InternalError
            }
        };
        ApiError::new(code, err.public_message())
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::database_error("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use manga_core::ValidationError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::JwtExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::MangaNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::UserAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_wire_codes_match_domain_codes() -> Result<(), serde_json::Error> {
        let errors = [
            MangaError::not_found(EntityKind::Manga, 1),
            MangaError::not_found(EntityKind::Chapter, 1),
            MangaError::not_found(EntityKind::Page, 1),
            MangaError::not_found(EntityKind::User, 1),
            MangaError::Validation(ValidationError::RequiredFieldMissing {
                field: "title".to_string(),
            }),
            MangaError::Conflict {
                entity: EntityKind::User,
                field: "username".to_string(),
                value: "reader".to_string(),
            },
            MangaError::unauthorized("no token"),
            MangaError::InvalidCredentials,
            MangaError::token_invalid("bad signature"),
            MangaError::TokenExpired,
            MangaError::Database {
                reason: "relation \"manga\" does not exist".to_string(),
            },
            MangaError::internal("boom"),
        ];

        for err in errors {
            let expected = err.code();
            let api = ApiError::from(err);
            assert_eq!(serde_json::to_value(api.code)?, serde_json::json!(expected));
        }
        Ok(())
    }

    #[test]
    fn test_database_detail_is_hidden() {
        let api = ApiError::from(MangaError::Database {
            reason: "password authentication failed for user \"manga\"".to_string(),
        });
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert_eq!(api.message, "Database operation failed");
        assert!(!api.message.contains("password"));
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_keeps_message() {
        let api = ApiError::from(MangaError::not_found(EntityKind::Chapter, 9));
        assert_eq!(api.code, ErrorCode::ChapterNotFound);
        assert!(api.message.contains('9'));
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({
            "field": "email",
            "constraint": "must be valid email address"
        });

        let err = ApiError::validation_failed("Invalid email").with_details(details.clone());

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.details, Some(details));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::invalid_token("Invalid token");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("JWT_INVALID"));
        assert!(json.contains("Invalid token"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::database_error("Connection failed");
        let display = format!("{}", err);

        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Connection failed"));
    }
}
