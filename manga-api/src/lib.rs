//! Manga API - REST layer for the manga reader
//!
//! Serves the catalog through a cache-aside layer, counts views into
//! per-period leaderboards and manages reader accounts with JWT pairs.
//! Postgres is the authoritative store; Redis holds cached reads and
//! view rankings.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    AccessClaims, AuthContext, FixedClock, JwtClock, RefreshClaims, SystemClock, TokenConfig,
    TokenError, TokenService,
};
pub use config::{AppConfig, ServerConfig};
pub use db::{DbConfig, PgCatalog};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, require_admin, AuthExtractor, AuthMiddlewareState};
pub use routes::create_router;
pub use services::{
    AuthSession, ChapterService, MangaService, PageService, Repositories, StatsService,
    UserService,
};
pub use state::{AppState, HealthState};
pub use telemetry::{init_tracing, TelemetryConfig};
