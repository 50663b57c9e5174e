//! boardwatch-server - GitHub board/issue dashboard backend
//!
//! Mirrors a GitHub Projects-v2 board and a repository issue list,
//! enriches both with LLM-derived annotations behind a durable SQLite
//! cache, and serves the merged result plus live refresh progress over
//! HTTP and SSE.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use boardwatch_common::config::Config;
use boardwatch_server::services::{spawn_cache_sweeper, spawn_retry_worker};
use boardwatch_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting boardwatch-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (env > config file > defaults)
    let config = Config::load()?;

    // Open or create the cache store; fatal when unavailable
    info!("Database: {}", config.database_path.display());
    let db_pool = boardwatch_server::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let state = AppState::new(db_pool.clone(), &config)?;

    // Background timelines: failed-extraction retries and cache sweeps
    spawn_retry_worker(state.retry_queue.clone(), state.gateway.clone());
    spawn_cache_sweeper(db_pool);
    info!("Background workers started (retry, cache sweep)");

    let app = boardwatch_server::build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
