//! Error types for catalog operations

use crate::{EntityId, EntityKind};
use thiserror::Error;

/// Authoritative store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: EntityId },

    #[error("{entity} with {field} '{value}' already exists")]
    AlreadyExists {
        entity: EntityKind,
        field: String,
        value: String,
    },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Connection unavailable: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Field {field} must be between {min} and {max} characters")]
    InvalidLength {
        field: String,
        min: usize,
        max: usize,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Discriminator for [`MangaError`], inspected by exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unauthorized,
    InvalidCredentials,
    TokenInvalid,
    TokenExpired,
    Database,
    Internal,
}

/// Master error type for all catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MangaError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: EntityKind, id: EntityId },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} with {field} '{value}' already exists")]
    Conflict {
        entity: EntityKind,
        field: String,
        value: String,
    },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token: {reason}")]
    TokenInvalid { reason: String },

    #[error("Token has expired")]
    TokenExpired,

    /// Carries server-side detail; never rendered to callers.
    #[error("Database error: {reason}")]
    Database { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl MangaError {
    pub fn not_found(entity: EntityKind, id: EntityId) -> Self {
        MangaError::NotFound { entity, id }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        MangaError::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn token_invalid(reason: impl Into<String>) -> Self {
        MangaError::TokenInvalid {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        MangaError::Internal {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MangaError::NotFound { .. } => ErrorKind::NotFound,
            MangaError::Validation(_) => ErrorKind::Validation,
            MangaError::Conflict { .. } => ErrorKind::Conflict,
            MangaError::Unauthorized { .. } => ErrorKind::Unauthorized,
            MangaError::InvalidCredentials => ErrorKind::InvalidCredentials,
            MangaError::TokenInvalid { .. } => ErrorKind::TokenInvalid,
            MangaError::TokenExpired => ErrorKind::TokenExpired,
            MangaError::Database { .. } => ErrorKind::Database,
            MangaError::Internal { .. } | MangaError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            MangaError::NotFound { entity, .. } => match entity {
                EntityKind::Manga => "MANGA_NOT_FOUND",
                EntityKind::Chapter => "CHAPTER_NOT_FOUND",
                EntityKind::Page => "PAGE_NOT_FOUND",
                EntityKind::User => "USER_NOT_FOUND",
            },
            MangaError::Validation(_) => "VALIDATION_ERROR",
            MangaError::Conflict {
                entity: EntityKind::User,
                ..
            } => "USER_ALREADY_EXISTS",
            MangaError::Conflict { .. } => "CONFLICT",
            MangaError::Unauthorized { .. } => "UNAUTHORIZED",
            MangaError::InvalidCredentials => "INVALID_CREDENTIALS",
            MangaError::TokenInvalid { .. } => "JWT_INVALID",
            MangaError::TokenExpired => "JWT_EXPIRED",
            MangaError::Database { .. } => "DATABASE_ERROR",
            MangaError::Internal { .. } | MangaError::Config(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a caller. Backing-store detail is replaced by a
    /// generic message.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Database => "Database operation failed".to_string(),
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<StorageError> for MangaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => MangaError::NotFound { entity, id },
            StorageError::AlreadyExists {
                entity,
                field,
                value,
            } => MangaError::Conflict {
                entity,
                field,
                value,
            },
            StorageError::QueryFailed { reason } | StorageError::ConnectionFailed { reason } => {
                MangaError::Database { reason }
            }
            StorageError::LockPoisoned => MangaError::Internal {
                reason: "storage lock poisoned".to_string(),
            },
        }
    }
}

/// Result type alias for catalog operations.
pub type MangaResult<T> = Result<T, MangaError>;

// =============================================================================
// TESTS
// =============================================================================
