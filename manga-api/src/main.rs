//! Manga API server binary.

use std::sync::Arc;

use manga_api::{
    create_router, init_tracing, ApiError, ApiResult, AppConfig, AppState, PgCatalog,
    Repositories, TokenService,
};
use manga_storage::{KvStore, RedisKvStore, TtlPolicy};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AppConfig::from_env();
    init_tracing(&config.telemetry)?;
    config.validate()?;

    let catalog = PgCatalog::from_config(&config.db)?;
    catalog.apply_schema().await?;

    let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::from_config(&config.redis).map_err(|e| {
        ApiError::service_unavailable(format!("Failed to create Redis pool: {}", e))
    })?);
    if let Err(e) = kv.ping().await {
        // Reads fall through to Postgres until Redis comes back.
        tracing::warn!(error = %e, "Redis unreachable at startup, serving uncached");
    }

    let tokens = TokenService::new(config.token.clone())?;
    let state = AppState::new(
        Repositories::from_catalog(catalog.clone()),
        kv,
        TtlPolicy::new(),
        tokens,
    )
    .with_catalog_probe(catalog);

    let app = create_router(state, &config.server);

    let addr = config.server.bind_addr()?;
    tracing::info!(%addr, "Starting manga API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
