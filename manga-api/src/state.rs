//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use manga_storage::{AnalyticsEngine, CacheAside, KvStore, TtlPolicy};

use crate::auth::TokenService;
use crate::db::PgCatalog;
use crate::middleware::AuthMiddlewareState;
use crate::services::{
    ChapterService, MangaService, PageService, Repositories, StatsService, UserService,
};

/// Liveness and readiness probes.
#[derive(Clone)]
pub struct HealthState {
    /// Cache and ranking store
    pub kv: Arc<dyn KvStore>,
    /// Authoritative store, when it is Postgres
    pub catalog: Option<PgCatalog>,
    /// Shared with the services so hit rates are visible
    pub cache: CacheAside,
    pub start_time: Instant,
}

/// Application-wide state shared across all routes.
///
/// Every service is built once here with its collaborators; handlers pull
/// the one they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub manga: MangaService,
    pub chapters: ChapterService,
    pub pages: PageService,
    pub stats: StatsService,
    pub users: UserService,
    pub auth: AuthMiddlewareState,
    pub health: HealthState,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        kv: Arc<dyn KvStore>,
        ttl: TtlPolicy,
        tokens: TokenService,
    ) -> Self {
        let cache = CacheAside::new(kv.clone(), ttl);
        let analytics = AnalyticsEngine::new(kv.clone());
        let stats = StatsService::new(repos.clone(), cache.clone(), analytics.clone());

        Self {
            manga: MangaService::new(
                repos.clone(),
                cache.clone(),
                analytics.clone(),
                stats.clone(),
            ),
            chapters: ChapterService::new(repos.clone(), cache.clone(), analytics.clone()),
            pages: PageService::new(repos.clone(), cache.clone(), analytics),
            stats,
            users: UserService::new(repos, tokens.clone()),
            auth: AuthMiddlewareState::new(tokens),
            health: HealthState {
                kv,
                catalog: None,
                cache,
                start_time: Instant::now(),
            },
        }
    }

    /// Let the readiness probe check the Postgres pool.
    pub fn with_catalog_probe(mut self, catalog: PgCatalog) -> Self {
        self.health.catalog = Some(catalog);
        self
    }
}

crate::impl_from_ref!(MangaService, manga);
crate::impl_from_ref!(ChapterService, chapters);
crate::impl_from_ref!(PageService, pages);
crate::impl_from_ref!(StatsService, stats);
crate::impl_from_ref!(UserService, users);
crate::impl_from_ref!(HealthState, health);
