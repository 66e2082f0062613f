//! Manga Core - Entity Types
//!
//! Pure data structures, enums, and the error taxonomy shared by every
//! other crate in the workspace.

use chrono::{DateTime, Utc};

pub mod entities;
pub mod enums;
pub mod error;

/// Identifier assigned by the authoritative store.
pub type EntityId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use entities::*;
pub use enums::{EntityKind, MangaStatus, ParseEnumError, Role, StatsPeriod, SubjectKind};
pub use error::{ConfigError, ErrorKind, MangaError, MangaResult, StorageError, ValidationError};
