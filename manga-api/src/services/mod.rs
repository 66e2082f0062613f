//! Service Layer
//!
//! Catalog, stats and account logic between the HTTP handlers and the
//! stores. Reads go through the cache-aside layer and emit view events;
//! writes hit the authoritative catalog first and then invalidate every
//! cache key they affect.

mod chapter_service;
mod manga_service;
mod page_service;
mod stats_service;
mod user_service;

pub use chapter_service::*;
pub use manga_service::*;
pub use page_service::*;
pub use stats_service::*;
pub use user_service::*;

use std::sync::Arc;

use manga_core::{MangaError, MangaResult};
use manga_storage::{ChapterRepository, MangaRepository, PageRepository, UserRepository};

/// Largest leaderboard a caller may request.
pub const MAX_TOP_LIMIT: usize = 100;

/// Leaderboard size when none is given.
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// The four catalog repositories, usually backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub manga: Arc<dyn MangaRepository>,
    pub chapters: Arc<dyn ChapterRepository>,
    pub pages: Arc<dyn PageRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    /// Share one store across all four repository seams.
    pub fn from_catalog<C>(catalog: C) -> Self
    where
        C: MangaRepository + ChapterRepository + PageRepository + UserRepository + 'static,
    {
        Self::from_shared(Arc::new(catalog))
    }

    /// Like [`from_catalog`](Self::from_catalog), for a store the caller
    /// keeps a handle to.
    pub fn from_shared<C>(catalog: Arc<C>) -> Self
    where
        C: MangaRepository + ChapterRepository + PageRepository + UserRepository + 'static,
    {
        Self {
            manga: catalog.clone(),
            chapters: catalog.clone(),
            pages: catalog.clone(),
            users: catalog,
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

/// `Ok(None)` for a not-found error, so joins can skip vanished rows.
pub(crate) fn found<T>(result: MangaResult<T>) -> MangaResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MangaError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Clamp a requested leaderboard size into `1..=MAX_TOP_LIMIT`.
pub fn top_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(limit) if limit > 0 => usize::try_from(limit)
            .unwrap_or(MAX_TOP_LIMIT)
            .min(MAX_TOP_LIMIT),
        _ => DEFAULT_TOP_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manga_core::EntityKind;

    #[test]
    fn test_top_limit() {
        assert_eq!(top_limit(None), DEFAULT_TOP_LIMIT);
        assert_eq!(top_limit(Some(0)), DEFAULT_TOP_LIMIT);
        assert_eq!(top_limit(Some(-3)), DEFAULT_TOP_LIMIT);
        assert_eq!(top_limit(Some(5)), 5);
        assert_eq!(top_limit(Some(10_000)), MAX_TOP_LIMIT);
    }

    #[test]
    fn test_found() {
        assert_eq!(found(Ok::<_, MangaError>(1)), Ok(Some(1)));
        assert_eq!(
            found::<i32>(Err(MangaError::not_found(EntityKind::Manga, 1))),
            Ok(None)
        );
        assert!(found::<i32>(Err(MangaError::internal("x"))).is_err());
    }
}
