//! Manga Service
//!
//! Cached manga reads plus writes that invalidate every key derived from
//! the changed row.

use manga_core::{
    Chapter, EntityId, EntityKind, Manga, MangaFilter, MangaResult, MangaStat, MangaUpdate,
    NewManga, StatsPeriod, SubjectKind, ValidationError,
};
use manga_storage::{AnalyticsEngine, CacheAside, CacheKey, CacheRead, KeyPattern, ViewEvent};

use super::{Repositories, StatsService};

#[derive(Debug, Clone)]
pub struct MangaService {
    repos: Repositories,
    cache: CacheAside,
    analytics: AnalyticsEngine,
    stats: StatsService,
}

impl MangaService {
    pub fn new(
        repos: Repositories,
        cache: CacheAside,
        analytics: AnalyticsEngine,
        stats: StatsService,
    ) -> Self {
        Self {
            repos,
            cache,
            analytics,
            stats,
        }
    }

    /// Fetch one manga and count the view, whether or not it was cached.
    pub async fn get(&self, id: EntityId) -> MangaResult<CacheRead<Manga>> {
        let read = self
            .cache
            .read(&CacheKey::manga(id), || self.repos.manga.get(id))
            .await?;
        self.analytics.record_view(&ViewEvent::manga(id)).await;
        Ok(read)
    }

    /// List manga. Only unfiltered pages are served from the cache.
    pub async fn list(&self, filter: MangaFilter) -> MangaResult<CacheRead<Vec<Manga>>> {
        let filter = filter.normalized();
        if !filter.is_unfiltered() {
            let rows = self.repos.manga.list(&filter).await?;
            return Ok(CacheRead::from_storage(rows));
        }

        let key = CacheKey::list(EntityKind::Manga, filter.limit, filter.offset);
        self.cache
            .read(&key, || self.repos.manga.list(&filter))
            .await
    }

    /// Chapters of a manga, ordered by number.
    pub async fn chapters(&self, manga_id: EntityId) -> MangaResult<CacheRead<Vec<Chapter>>> {
        self.cache
            .read(&CacheKey::manga_chapters(manga_id), || async {
                self.repos.manga.get(manga_id).await?;
                self.repos.chapters.list_by_manga(manga_id).await
            })
            .await
    }

    /// Cached leaderboard of the most viewed manga for `period`.
    pub async fn popular(
        &self,
        period: StatsPeriod,
        limit: usize,
    ) -> MangaResult<CacheRead<Vec<MangaStat>>> {
        let key_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let key = CacheKey::popular(EntityKind::Manga, period, key_limit);
        self.cache
            .read(&key, || self.stats.top_manga(period, limit))
            .await
    }

    pub async fn create(&self, input: NewManga) -> MangaResult<Manga> {
        input.validate()?;
        let manga = self.repos.manga.create(input).await?;
        self.cache
            .invalidate_pattern(KeyPattern::ListsOf(EntityKind::Manga))
            .await;
        tracing::info!(manga_id = manga.id, title = %manga.title, "Created manga");
        Ok(manga)
    }

    pub async fn update(&self, id: EntityId, update: MangaUpdate) -> MangaResult<Manga> {
        update.validate()?;
        let manga = self.repos.manga.update(id, update).await?;
        self.cache.invalidate(&[CacheKey::manga(id)]).await;
        self.invalidate_listings().await;
        tracing::info!(manga_id = id, "Updated manga");
        Ok(manga)
    }

    /// Delete a manga with its chapters and pages.
    ///
    /// Child ids are collected first so their cached entries can be dropped
    /// once the cascade has run.
    pub async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let chapters = self.repos.chapters.list_by_manga(id).await?;
        let mut keys = vec![CacheKey::manga(id), CacheKey::manga_chapters(id)];
        let mut page_ids = Vec::new();
        for chapter in &chapters {
            keys.push(CacheKey::chapter(chapter.id));
            keys.push(CacheKey::chapter_pages(chapter.id));
            for page in self.repos.pages.list_by_chapter(chapter.id).await? {
                keys.push(CacheKey::page(page.id));
                page_ids.push(page.id);
            }
        }

        self.repos.manga.delete(id).await?;

        self.cache.invalidate(&keys).await;
        self.invalidate_listings().await;
        let chapter_ids: Vec<EntityId> = chapters.iter().map(|chapter| chapter.id).collect();
        self.analytics.forget(SubjectKind::Manga, &[id]).await;
        self.analytics.forget(SubjectKind::Chapter, &chapter_ids).await;
        self.analytics.forget(SubjectKind::Page, &page_ids).await;
        tracing::info!(
            manga_id = id,
            chapters = chapters.len(),
            invalidated = keys.len(),
            "Deleted manga"
        );
        Ok(())
    }

    pub async fn add_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let genre = require_genre(genre)?;
        self.repos.manga.add_genre(id, genre).await?;
        self.invalidate_genres(id).await;
        Ok(())
    }

    pub async fn remove_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let genre = require_genre(genre)?;
        self.repos.manga.remove_genre(id, genre).await?;
        self.invalidate_genres(id).await;
        Ok(())
    }

    pub async fn genres(&self, id: EntityId) -> MangaResult<Vec<String>> {
        self.repos.manga.genres(id).await
    }

    async fn invalidate_genres(&self, id: EntityId) {
        self.cache.invalidate(&[CacheKey::manga(id)]).await;
        self.cache
            .invalidate_pattern(KeyPattern::ListsOf(EntityKind::Manga))
            .await;
    }

    // Leaderboards carry titles, so they go stale with the listings.
    async fn invalidate_listings(&self) {
        self.cache
            .invalidate_pattern(KeyPattern::ListsOf(EntityKind::Manga))
            .await;
        self.cache
            .invalidate_pattern(KeyPattern::PopularOf(EntityKind::Manga))
            .await;
    }
}

fn require_genre(genre: &str) -> Result<&str, ValidationError> {
    let genre = genre.trim();
    if genre.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "genre".to_string(),
        });
    }
    Ok(genre)
}
