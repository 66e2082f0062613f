//! Page Service

use manga_core::{EntityId, MangaResult, NewPage, Page, PageUpdate, SubjectKind};
use manga_storage::{AnalyticsEngine, CacheAside, CacheKey, CacheRead, ViewEvent};

use super::Repositories;

#[derive(Debug, Clone)]
pub struct PageService {
    repos: Repositories,
    cache: CacheAside,
    analytics: AnalyticsEngine,
}

impl PageService {
    pub fn new(repos: Repositories, cache: CacheAside, analytics: AnalyticsEngine) -> Self {
        Self {
            repos,
            cache,
            analytics,
        }
    }

    /// Fetch one page and count the view against it, its chapter and its
    /// manga.
    pub async fn get(&self, id: EntityId) -> MangaResult<CacheRead<Page>> {
        let read = self
            .cache
            .read(&CacheKey::page(id), || self.repos.pages.get(id))
            .await?;
        let event = self.view_event(read.value()).await?;
        self.analytics.record_view(&event).await;
        Ok(read)
    }

    /// Pages only know their chapter; the manga comes from the (usually
    /// cached) chapter.
    async fn view_event(&self, page: &Page) -> MangaResult<ViewEvent> {
        let chapter_id = page.chapter_id;
        let chapter = self
            .cache
            .read(&CacheKey::chapter(chapter_id), || {
                self.repos.chapters.get(chapter_id)
            })
            .await?;
        Ok(ViewEvent::page(page.id, chapter_id, chapter.value().manga_id))
    }

    pub async fn create(&self, input: NewPage) -> MangaResult<Page> {
        input.validate()?;
        self.repos.chapters.get(input.chapter_id).await?;
        let page = self.repos.pages.create(input).await?;
        self.cache
            .invalidate(&[CacheKey::chapter_pages(page.chapter_id)])
            .await;
        tracing::info!(page_id = page.id, chapter_id = page.chapter_id, "Created page");
        Ok(page)
    }

    /// Update a page, possibly moving it to another chapter. Both the old
    /// and the new chapter's page lists are invalidated.
    pub async fn update(&self, id: EntityId, update: PageUpdate) -> MangaResult<Page> {
        update.validate()?;
        let before = self.repos.pages.get(id).await?;
        if let Some(target) = update.chapter_id {
            self.repos.chapters.get(target).await?;
        }
        let page = self.repos.pages.update(id, update).await?;

        let mut keys = vec![CacheKey::page(id), CacheKey::chapter_pages(before.chapter_id)];
        if page.chapter_id != before.chapter_id {
            keys.push(CacheKey::chapter_pages(page.chapter_id));
        }
        self.cache.invalidate(&keys).await;
        tracing::info!(
            page_id = id,
            from_chapter = before.chapter_id,
            to_chapter = page.chapter_id,
            "Updated page"
        );
        Ok(page)
    }

    pub async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let page = self.repos.pages.get(id).await?;
        self.repos.pages.delete(id).await?;
        self.cache
            .invalidate(&[CacheKey::page(id), CacheKey::chapter_pages(page.chapter_id)])
            .await;
        self.analytics.forget(SubjectKind::Page, &[id]).await;
        tracing::info!(page_id = id, "Deleted page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ChapterService;
    use manga_core::{EntityKind, MangaError};
    use manga_storage::{InMemoryCatalog, InMemoryKvStore, KvStore};
    use manga_test_utils::fixtures::{new_page, seed_catalog};
    use std::sync::Arc;

    struct Harness {
        catalog: Arc<InMemoryCatalog>,
        store: Arc<InMemoryKvStore>,
        pages: PageService,
        chapters: ChapterService,
    }

    fn harness() -> Harness {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryKvStore::new());
        let repos = Repositories::from_shared(catalog.clone());
        let cache = CacheAside::with_defaults(store.clone());
        let analytics = AnalyticsEngine::new(store.clone());
        Harness {
            catalog,
            store,
            pages: PageService::new(repos.clone(), cache.clone(), analytics.clone()),
            chapters: ChapterService::new(repos, cache, analytics),
        }
    }

    #[tokio::test]
    async fn test_get_records_page_view() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let page = &seeded.pages[2];

        let read = h.pages.get(page.id).await?;
        assert_eq!(read.value(), page);

        let views = AnalyticsEngine::new(h.store.clone())
            .views(SubjectKind::Page, page.id)
            .await
            .unwrap_or_default();
        assert_eq!(views, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_view_event_names_chapter_and_manga() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let page = &seeded.pages[0];

        let event = h.pages.view_event(page).await?;
        assert_eq!(event.id, page.id);
        assert_eq!(
            event.parents,
            vec![
                (SubjectKind::Chapter, page.chapter_id),
                (SubjectKind::Manga, seeded.manga.id),
            ]
        );

        // The chapter lookup goes through the shared cache.
        assert!(h
            .store
            .exists(&CacheKey::chapter(page.chapter_id).to_string())
            .await
            .unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invalidates_chapter_pages() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let chapter_id = seeded.chapters[0].id;
        assert_eq!(h.chapters.pages(chapter_id).await?.value().len(), 3);

        h.pages.create(new_page(chapter_id, 4)).await?;

        let read = h.chapters.pages(chapter_id).await?;
        assert!(!read.was_cache_hit());
        assert_eq!(read.value().len(), 4);

        assert!(matches!(
            h.pages.create(new_page(777, 1)).await,
            Err(MangaError::NotFound {
                entity: EntityKind::Chapter,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_move_invalidates_both_chapters() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let from = seeded.chapters[0].id;
        let to = seeded.chapters[1].id;
        let page_id = seeded.pages[0].id;
        h.chapters.pages(from).await?;
        h.chapters.pages(to).await?;

        let update = PageUpdate {
            chapter_id: Some(to),
            number: Some(9),
            ..PageUpdate::default()
        };
        h.pages.update(page_id, update).await?;

        let source = h.chapters.pages(from).await?;
        let target = h.chapters.pages(to).await?;
        assert!(!source.was_cache_hit());
        assert!(!target.was_cache_hit());
        assert_eq!(source.value().len(), 2);
        assert_eq!(target.value().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_move_to_missing_chapter_is_rejected() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let update = PageUpdate {
            chapter_id: Some(404),
            ..PageUpdate::default()
        };
        let result = h.pages.update(seeded.pages[0].id, update).await;
        assert!(matches!(
            result,
            Err(MangaError::NotFound {
                entity: EntityKind::Chapter,
                id: 404
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> MangaResult<()> {
        let h = harness();
        let seeded = seed_catalog(&h.catalog).await?;
        let page = &seeded.pages[0];
        h.pages.get(page.id).await?;

        h.pages.delete(page.id).await?;

        assert!(matches!(
            h.pages.get(page.id).await,
            Err(MangaError::NotFound { .. })
        ));
        assert_eq!(h.chapters.pages(page.chapter_id).await?.value().len(), 2);

        let analytics = AnalyticsEngine::new(h.store.clone());
        let ranked = analytics
            .top_n(SubjectKind::Page, manga_core::StatsPeriod::Daily, 10)
            .await
            .unwrap_or_default();
        assert!(ranked.is_empty());
        assert_eq!(
            analytics.views(SubjectKind::Page, page.id).await.unwrap_or(-1),
            0
        );
        Ok(())
    }
}
