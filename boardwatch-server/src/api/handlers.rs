//! Collection and cache-info handlers
//!
//! `GET /api/roadmap` and `GET /api/issues` are synchronous from the
//! caller's perspective: a cold cache blocks through the whole refresh
//! (minutes) while progress streams separately over `/events`.

use crate::error::{ApiError, ApiResult};
use crate::models::CacheInfo;
use crate::{AppState, Coordinator};
use axum::extract::{Path, Query, State};
use axum::Json;
use boardwatch_common::events::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    /// `?refresh=true` forces a full refresh even with a fresh snapshot
    #[serde(default)]
    refresh: bool,
}

fn coordinator_for(state: &AppState, collection: Collection) -> Arc<Coordinator> {
    match collection {
        Collection::Roadmap => state.roadmap.clone(),
        Collection::Issues => state.issues.clone(),
    }
}

fn parse_collection(raw: &str) -> ApiResult<Collection> {
    raw.parse()
        .map_err(|e: boardwatch_common::Error| ApiError::BadRequest(e.to_string()))
}

/// GET /api/roadmap
pub async fn get_roadmap(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.roadmap.get(query.refresh).await?))
}

/// GET /api/issues
pub async fn get_issues(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.issues.get(query.refresh).await?))
}

/// GET /api/cache/:collection
pub async fn get_cache_info(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<Json<CacheInfo>> {
    let collection = parse_collection(&collection)?;
    let info = coordinator_for(&state, collection).cache_info().await?;
    Ok(Json(info))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(json!({
        "status": "ok",
        "service": "boardwatch-server",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
        "retry_queue_depth": state.retry_queue.len(),
        "retry_abandoned": state.retry_queue.abandoned_count(),
    }))
}
