//! Stats Service
//!
//! Leaderboards joined with catalog metadata, per-manga view totals and
//! period resets.

use manga_core::{
    ChapterStat, EntityId, MangaError, MangaResult, MangaStat, PageStat, StatsPeriod,
    SubjectKind,
};
use manga_storage::{AnalyticsEngine, CacheAside, CacheStats, KeyPattern, RankedSubject};

use super::{found, Repositories};

#[derive(Debug, Clone)]
pub struct StatsService {
    repos: Repositories,
    cache: CacheAside,
    analytics: AnalyticsEngine,
}

impl StatsService {
    pub fn new(repos: Repositories, cache: CacheAside, analytics: AnalyticsEngine) -> Self {
        Self {
            repos,
            cache,
            analytics,
        }
    }

    /// Most viewed manga for `period`. Ranked ids that no longer exist in
    /// the catalog are skipped.
    pub async fn top_manga(&self, period: StatsPeriod, limit: usize) -> MangaResult<Vec<MangaStat>> {
        let ranked = self.ranked(SubjectKind::Manga, period, limit).await;
        let mut stats = Vec::with_capacity(ranked.len());
        for row in ranked {
            if let Some(manga) = found(self.repos.manga.get(row.id).await)? {
                stats.push(MangaStat {
                    manga_id: manga.id,
                    title: manga.title,
                    views: row.views(),
                });
            }
        }
        Ok(stats)
    }

    pub async fn top_chapters(
        &self,
        period: StatsPeriod,
        limit: usize,
    ) -> MangaResult<Vec<ChapterStat>> {
        let ranked = self.ranked(SubjectKind::Chapter, period, limit).await;
        let mut stats = Vec::with_capacity(ranked.len());
        for row in ranked {
            if let Some(chapter) = found(self.repos.chapters.get(row.id).await)? {
                stats.push(ChapterStat {
                    chapter_id: chapter.id,
                    manga_id: chapter.manga_id,
                    number: chapter.number,
                    title: chapter.title,
                    views: row.views(),
                });
            }
        }
        Ok(stats)
    }

    pub async fn top_pages(&self, period: StatsPeriod, limit: usize) -> MangaResult<Vec<PageStat>> {
        let ranked = self.ranked(SubjectKind::Page, period, limit).await;
        let mut stats = Vec::with_capacity(ranked.len());
        for row in ranked {
            if let Some(page) = found(self.repos.pages.get(row.id).await)? {
                stats.push(PageStat {
                    page_id: page.id,
                    chapter_id: page.chapter_id,
                    number: page.number,
                    views: row.views(),
                });
            }
        }
        Ok(stats)
    }

    /// Hit and miss counters of the shared cache-aside layer.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Lifetime views of one manga.
    pub async fn manga_views(&self, manga_id: EntityId) -> MangaResult<MangaStat> {
        let manga = self.repos.manga.get(manga_id).await?;
        let views = match self.analytics.views(SubjectKind::Manga, manga_id).await {
            Ok(views) => views,
            Err(e) => {
                tracing::warn!(manga_id, error = %e, "View counter unavailable, reporting zero");
                0
            }
        };
        Ok(MangaStat {
            manga_id: manga.id,
            title: manga.title,
            views,
        })
    }

    /// Clear every ranking set for `period` and drop the cached
    /// leaderboards built from them.
    ///
    /// Unlike reads, a reset that cannot reach the ranking store is an
    /// error: the caller asked for a state change that did not happen.
    pub async fn reset(&self, period: StatsPeriod) -> MangaResult<u64> {
        let removed = self.analytics.reset(period).await.map_err(|e| {
            tracing::error!(period = %period, error = %e, "Failed to reset view rankings");
            MangaError::internal(format!("Failed to reset {} rankings: {}", period, e))
        })?;

        for kind in SubjectKind::ALL {
            self.cache
                .invalidate_pattern(KeyPattern::PopularOf(kind.entity_kind()))
                .await;
        }
        Ok(removed)
    }

    async fn ranked(&self, kind: SubjectKind, period: StatsPeriod, limit: usize) -> Vec<RankedSubject> {
        match self.analytics.top_n(kind, period, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    period = %period,
                    error = %e,
                    "Ranking store unavailable, serving empty leaderboard"
                );
                Vec::new()
            }
        }
    }
}
