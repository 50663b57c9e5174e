//! boardwatch-server library interface
//!
//! Exposes the application state and router for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::routing::get;
use axum::Router;
use boardwatch_common::config::Config;
use boardwatch_common::events::{Collection, ProgressBus};
use chrono::{DateTime, Utc};
use services::{
    GithubClient, InferenceGateway, OpenAiCompletions, RefreshCoordinator, RetryQueue,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Production gateway over the OpenAI-compatible transport
pub type Gateway = InferenceGateway<OpenAiCompletions>;
/// Production refresh coordinator
pub type Coordinator = RefreshCoordinator<OpenAiCompletions>;

/// Application state shared across handlers and background tasks.
/// Process-scoped context object: the retry queue and progress bus
/// live here, not in globals.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub progress: ProgressBus,
    pub retry_queue: RetryQueue,
    pub gateway: Arc<Gateway>,
    pub roadmap: Arc<Coordinator>,
    pub issues: Arc<Coordinator>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> anyhow::Result<Self> {
        let progress = ProgressBus::new(256);
        let retry_queue = RetryQueue::new();

        let github = Arc::new(GithubClient::new(config.github.clone())?);
        let api = OpenAiCompletions::new(
            &config.inference.base_url,
            &config.inference.api_key,
            &config.inference.model,
        )?;
        let gateway = Arc::new(InferenceGateway::new(api, db.clone(), retry_queue.clone()));

        let roadmap = Arc::new(RefreshCoordinator::new(
            Collection::Roadmap,
            db.clone(),
            progress.clone(),
            github.clone(),
            gateway.clone(),
        ));
        let issues = Arc::new(RefreshCoordinator::new(
            Collection::Issues,
            db.clone(),
            progress.clone(),
            github,
            gateway.clone(),
        ));

        Ok(Self {
            db,
            progress,
            retry_queue,
            gateway,
            roadmap,
            issues,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/roadmap", get(api::get_roadmap))
        .route("/api/issues", get(api::get_issues))
        .route("/api/cache/:collection", get(api::get_cache_info))
        .route("/events/:collection", get(api::progress_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
