//! Chapter Service

use manga_core::{
    Chapter, ChapterUpdate, ChapterWithStats, EntityId, MangaResult, NewChapter, Page,
    SubjectKind,
};
use manga_storage::{AnalyticsEngine, CacheAside, CacheKey, CacheRead, ViewEvent};

use super::Repositories;

#[derive(Debug, Clone)]
pub struct ChapterService {
    repos: Repositories,
    cache: CacheAside,
    analytics: AnalyticsEngine,
}

impl ChapterService {
    pub fn new(repos: Repositories, cache: CacheAside, analytics: AnalyticsEngine) -> Self {
        Self {
            repos,
            cache,
            analytics,
        }
    }

    /// Fetch one chapter with its view count, counting this view against
    /// it and its manga. The count is best-effort and reads 0 when the
    /// ranking store is unreachable.
    pub async fn get(&self, id: EntityId) -> MangaResult<CacheRead<ChapterWithStats>> {
        let read = self
            .cache
            .read(&CacheKey::chapter(id), || self.repos.chapters.get(id))
            .await?;
        self.analytics
            .record_view(&ViewEvent::chapter(id, read.value().manga_id))
            .await;

        let views = match self.analytics.views(SubjectKind::Chapter, id).await {
            Ok(views) => views,
            Err(e) => {
                tracing::warn!(chapter_id = id, error = %e, "Failed to read chapter views");
                0
            }
        };
        Ok(read.map(|chapter| ChapterWithStats { chapter, views }))
    }

    /// Pages of a chapter, ordered by number.
    pub async fn pages(&self, chapter_id: EntityId) -> MangaResult<CacheRead<Vec<Page>>> {
        self.cache
            .read(&CacheKey::chapter_pages(chapter_id), || async {
                self.repos.chapters.get(chapter_id).await?;
                self.repos.pages.list_by_chapter(chapter_id).await
            })
            .await
    }

    pub async fn create(&self, input: NewChapter) -> MangaResult<Chapter> {
        input.validate()?;
        self.repos.manga.get(input.manga_id).await?;
        let chapter = self.repos.chapters.create(input).await?;
        self.cache
            .invalidate(&[CacheKey::manga_chapters(chapter.manga_id)])
            .await;
        tracing::info!(
            chapter_id = chapter.id,
            manga_id = chapter.manga_id,
            number = chapter.number,
            "Created chapter"
        );
        Ok(chapter)
    }

    pub async fn update(&self, id: EntityId, update: ChapterUpdate) -> MangaResult<Chapter> {
        update.validate()?;
        let chapter = self.repos.chapters.update(id, update).await?;
        self.cache
            .invalidate(&[
                CacheKey::chapter(id),
                CacheKey::manga_chapters(chapter.manga_id),
            ])
            .await;
        tracing::info!(chapter_id = id, "Updated chapter");
        Ok(chapter)
    }

    /// Delete a chapter and its pages.
    pub async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let chapter = self.repos.chapters.get(id).await?;
        let pages = self.repos.pages.list_by_chapter(id).await?;

        self.repos.chapters.delete(id).await?;

        let mut keys = vec![
            CacheKey::chapter(id),
            CacheKey::manga_chapters(chapter.manga_id),
            CacheKey::chapter_pages(id),
        ];
        keys.extend(pages.iter().map(|page| CacheKey::page(page.id)));
        self.cache.invalidate(&keys).await;

        let page_ids: Vec<EntityId> = pages.iter().map(|page| page.id).collect();
        self.analytics.forget(SubjectKind::Chapter, &[id]).await;
        self.analytics.forget(SubjectKind::Page, &page_ids).await;
        tracing::info!(chapter_id = id, pages = pages.len(), "Deleted chapter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manga_core::{EntityKind, MangaError};
    use manga_storage::{InMemoryCatalog, InMemoryKvStore, KvStore};
    use manga_test_utils::fixtures::{new_chapter, seed_catalog};
    use std::sync::Arc;

    fn service() -> (Arc<InMemoryCatalog>, Arc<InMemoryKvStore>, ChapterService) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryKvStore::new());
        let service = ChapterService::new(
            Repositories::from_shared(catalog.clone()),
            CacheAside::with_defaults(store.clone()),
            AnalyticsEngine::new(store.clone()),
        );
        (catalog, store, service)
    }

    #[tokio::test]
    async fn test_get_records_chapter_view() -> MangaResult<()> {
        let (catalog, store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let chapter = &seeded.chapters[0];

        assert_eq!(service.get(chapter.id).await?.value().views, 1);
        let second = service.get(chapter.id).await?;
        assert!(second.was_cache_hit());
        assert_eq!(second.value().views, 2);
        assert_eq!(&second.value().chapter, chapter);

        let views = AnalyticsEngine::new(store)
            .views(SubjectKind::Chapter, chapter.id)
            .await
            .unwrap_or_default();
        assert_eq!(views, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_serves_chapter_when_views_unreadable() -> MangaResult<()> {
        let (catalog, store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let id = seeded.chapters[0].id;
        service.get(id).await?;

        store.set_unavailable(true);
        let read = service.get(id).await?;
        assert!(read.was_cache_miss());
        assert_eq!(read.value().views, 0);
        assert_eq!(read.value().chapter.id, id);
        Ok(())
    }

    #[test]
    fn test_chapter_with_stats_serializes_flat() -> Result<(), serde_json::Error> {
        let chapter: Chapter = serde_json::from_value(serde_json::json!({
            "id": 4,
            "manga_id": 2,
            "number": 1.0,
            "title": "Opening",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))?;
        let body = serde_json::to_value(ChapterWithStats { chapter, views: 12 })?;
        assert_eq!(body["id"], 4);
        assert_eq!(body["title"], "Opening");
        assert_eq!(body["views"], 12);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_requires_manga_and_invalidates_listing() -> MangaResult<()> {
        let (catalog, store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let listing = CacheKey::manga_chapters(seeded.manga.id);
        store
            .set(&listing.to_string(), b"[]", std::time::Duration::from_secs(60))
            .await
            .map_err(|e| MangaError::internal(e.to_string()))?;

        service.create(new_chapter(seeded.manga.id, 3.0)).await?;
        assert!(!store.exists(&listing.to_string()).await.unwrap_or(true));

        let orphan = service.create(new_chapter(999, 1.0)).await;
        assert!(matches!(
            orphan,
            Err(MangaError::NotFound {
                entity: EntityKind::Manga,
                id: 999
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_chapter() -> MangaResult<()> {
        let (catalog, _store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let id = seeded.chapters[0].id;
        service.get(id).await?;

        let update = ChapterUpdate {
            title: Some("Renamed".to_string()),
            number: Some(1.5),
        };
        service.update(id, update).await?;

        let read = service.get(id).await?;
        assert!(!read.was_cache_hit());
        assert_eq!(read.value().chapter.title, "Renamed");
        assert_eq!(read.value().chapter.number, 1.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_invalidates_pages() -> MangaResult<()> {
        let (catalog, _store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let id = seeded.chapters[0].id;
        assert_eq!(service.pages(id).await?.value().len(), 3);

        service.delete(id).await?;

        assert!(matches!(
            service.pages(id).await,
            Err(MangaError::NotFound {
                entity: EntityKind::Chapter,
                ..
            })
        ));
        assert_eq!(catalog.page_count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_drops_chapter_and_pages_from_rankings() -> MangaResult<()> {
        let (catalog, store, service) = service();
        let seeded = seed_catalog(&catalog).await?;
        let doomed = &seeded.chapters[0];
        let kept = &seeded.chapters[1];
        service.get(doomed.id).await?;
        service.get(kept.id).await?;
        let analytics = AnalyticsEngine::new(store.clone());
        let page = seeded
            .pages
            .iter()
            .find(|page| page.chapter_id == doomed.id)
            .ok_or_else(|| MangaError::internal("seeded chapter has no pages"))?;
        analytics
            .record_view(&ViewEvent::page(page.id, doomed.id, seeded.manga.id))
            .await;

        service.delete(doomed.id).await?;

        for period in manga_core::StatsPeriod::ALL {
            let chapters = analytics
                .top_n(SubjectKind::Chapter, period, 10)
                .await
                .unwrap_or_default();
            assert_eq!(chapters.iter().map(|r| r.id).collect::<Vec<_>>(), vec![kept.id]);
            assert!(analytics
                .top_n(SubjectKind::Page, period, 10)
                .await
                .unwrap_or_default()
                .is_empty());
        }
        Ok(())
    }
}
