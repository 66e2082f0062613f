//! View analytics and period leaderboards.
//!
//! Each (subject kind, period) pair owns one sorted set,
//! `<kind>:top_views:<period>`, mapping subject id to view count. A view
//! bumps the subject in all four period sets plus a lifetime counter
//! `views:<kind>:<id>`. Periods are independent buckets: `daily` is only
//! daily because something outside the service resets it every day.

use std::sync::Arc;

use manga_core::{EntityId, StatsPeriod, SubjectKind};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::kv::KvStore;

/// Sorted-set key for a ranking bucket.
pub fn ranking_key(kind: SubjectKind, period: StatsPeriod) -> String {
    format!("{}:top_views:{}", kind, period)
}

/// Lifetime view counter key for one subject.
pub fn counter_key(kind: SubjectKind, id: EntityId) -> String {
    format!("views:{}:{}", kind, id)
}

/// A single read of a catalog subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub kind: SubjectKind,
    pub id: EntityId,
    /// Enclosing subjects, nearest first. Logged with the event only.
    pub parents: Vec<(SubjectKind, EntityId)>,
}

impl ViewEvent {
    pub fn manga(id: EntityId) -> Self {
        Self {
            kind: SubjectKind::Manga,
            id,
            parents: Vec::new(),
        }
    }

    pub fn chapter(id: EntityId, manga_id: EntityId) -> Self {
        Self {
            kind: SubjectKind::Chapter,
            id,
            parents: vec![(SubjectKind::Manga, manga_id)],
        }
    }

    pub fn page(id: EntityId, chapter_id: EntityId, manga_id: EntityId) -> Self {
        Self {
            kind: SubjectKind::Page,
            id,
            parents: vec![
                (SubjectKind::Chapter, chapter_id),
                (SubjectKind::Manga, manga_id),
            ],
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedSubject {
    pub id: EntityId,
    pub score: f64,
}

impl RankedSubject {
    /// Score as a whole view count.
    pub fn views(&self) -> i64 {
        self.score.round() as i64
    }
}

/// Records views and serves top-N queries from the ranking store.
#[derive(Clone)]
pub struct AnalyticsEngine {
    store: Arc<dyn KvStore>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Count one view in every period and in the lifetime counter.
    ///
    /// Never fails: a store error is logged and the remaining increments
    /// still run.
    pub async fn record_view(&self, event: &ViewEvent) {
        let member = event.id.to_string();
        for period in StatsPeriod::ALL {
            let key = ranking_key(event.kind, period);
            if let Err(e) = self.store.zincr_by(&key, &member, 1.0).await {
                tracing::warn!(
                    kind = %event.kind,
                    id = event.id,
                    period = %period,
                    error = %e,
                    "Failed to record view"
                );
            }
        }

        if let Err(e) = self.store.incr(&counter_key(event.kind, event.id)).await {
            tracing::warn!(
                kind = %event.kind,
                id = event.id,
                error = %e,
                "Failed to bump view counter"
            );
        }

        tracing::trace!(
            kind = %event.kind,
            id = event.id,
            parents = ?event.parents,
            "Recorded view"
        );
    }

    /// The `limit` highest-scored subjects, highest first. Equal scores
    /// order by the store's member ordering. Members that are not integer
    /// ids are skipped.
    pub async fn top_n(
        &self,
        kind: SubjectKind,
        period: StatsPeriod,
        limit: usize,
    ) -> CacheResult<Vec<RankedSubject>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let rows = self
            .store
            .zrevrange_with_scores(&ranking_key(kind, period), 0, stop)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, score)| match member.parse::<EntityId>() {
                Ok(id) => Some(RankedSubject { id, score }),
                Err(_) => {
                    tracing::debug!(kind = %kind, member = %member, "Skipping non-numeric ranking member");
                    None
                }
            })
            .collect())
    }

    /// Lifetime views of one subject (0 when never viewed).
    pub async fn views(&self, kind: SubjectKind, id: EntityId) -> CacheResult<i64> {
        let Some(bytes) = self.store.get(&counter_key(kind, id)).await? else {
            return Ok(0);
        };
        Ok(std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }

    /// Drop deleted subjects from every period's ranking and from the
    /// lifetime counters.
    ///
    /// Never fails: a store error is logged and the remaining removals
    /// still run.
    pub async fn forget(&self, kind: SubjectKind, ids: &[EntityId]) {
        if ids.is_empty() {
            return;
        }
        let members: Vec<String> = ids.iter().map(ToString::to_string).collect();
        for period in StatsPeriod::ALL {
            let key = ranking_key(kind, period);
            if let Err(e) = self.store.zrem(&key, &members).await {
                tracing::warn!(
                    kind = %kind,
                    period = %period,
                    error = %e,
                    "Failed to drop deleted subjects from ranking"
                );
            }
        }

        let counters: Vec<String> = ids.iter().map(|id| counter_key(kind, *id)).collect();
        if let Err(e) = self.store.delete(&counters).await {
            tracing::warn!(kind = %kind, error = %e, "Failed to drop view counters");
        }
        tracing::debug!(kind = %kind, count = ids.len(), "Forgot deleted subjects");
    }

    /// Clear the ranking sets of every subject kind for `period` in one
    /// delete. Other periods and the lifetime counters are untouched.
    pub async fn reset(&self, period: StatsPeriod) -> CacheResult<u64> {
        let keys: Vec<String> = SubjectKind::ALL
            .iter()
            .map(|kind| ranking_key(*kind, period))
            .collect();
        let removed = self.store.delete(&keys).await?;
        tracing::info!(period = %period, removed, "Reset view rankings");
        Ok(removed)
    }
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine").finish_non_exhaustive()
    }
}
