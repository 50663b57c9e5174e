//! Refresh coordination per collection
//!
//! Two states: serving cached, refreshing. A cache hit requires an
//! unexpired snapshot; anything else (force, absence, expiry) runs the
//! full fetch-enrich-save pipeline. An async mutex serializes
//! overlapping refreshes of the same collection: a caller that waited
//! on the guard serves the snapshot written in the meantime instead of
//! starting a second upstream storm. The snapshot is only written on
//! full success, so a failed refresh leaves the previous one servable.

use crate::db::snapshots::{get_snapshot, put_snapshot, Snapshot};
use crate::error::{ApiError, ApiResult};
use crate::models::CacheInfo;
use crate::services::gateway::InferenceGateway;
use crate::services::github::GithubClient;
use crate::services::inference::CompletionApi;
use crate::services::orchestrator::Orchestrator;
use boardwatch_common::events::{Collection, ProgressBus};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Snapshots are served from cache for 24 hours
pub const SNAPSHOT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Whether a snapshot written at `timestamp_ms` is still servable at `now_ms`
pub fn snapshot_is_fresh(timestamp_ms: i64, now_ms: i64) -> bool {
    now_ms - timestamp_ms < SNAPSHOT_TTL_MS
}

pub struct RefreshCoordinator<C: CompletionApi> {
    collection: Collection,
    db: SqlitePool,
    progress: ProgressBus,
    github: Arc<GithubClient>,
    orchestrator: Orchestrator<C>,
    refresh_guard: tokio::sync::Mutex<()>,
    /// Checked between enrichment batches; wired for a future explicit
    /// abort operation, never cancelled today.
    cancel: CancellationToken,
}

impl<C: CompletionApi> RefreshCoordinator<C> {
    pub fn new(
        collection: Collection,
        db: SqlitePool,
        progress: ProgressBus,
        github: Arc<GithubClient>,
        gateway: Arc<InferenceGateway<C>>,
    ) -> Self {
        let orchestrator = Orchestrator::new(github.clone(), gateway, progress.clone());
        Self {
            collection,
            db,
            progress,
            github,
            orchestrator,
            refresh_guard: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Serve the collection: cached snapshot when fresh and not
    /// forced, otherwise a full refresh. Blocks through a cold
    /// refresh; progress streams separately.
    pub async fn get(&self, force: bool) -> ApiResult<serde_json::Value> {
        let request_start = now_ms();

        if !force {
            if let Some(snapshot) = get_snapshot(&self.db, self.collection).await? {
                if snapshot_is_fresh(snapshot.timestamp, request_start) {
                    tracing::debug!(collection = %self.collection, "Serving cached snapshot");
                    return parse_snapshot(&snapshot);
                }
            }
        }

        let _guard = self.refresh_guard.lock().await;

        // A refresh that finished while we waited on the guard covers
        // this request, forced or not.
        if let Some(snapshot) = get_snapshot(&self.db, self.collection).await? {
            if snapshot.timestamp >= request_start
                || (!force && snapshot_is_fresh(snapshot.timestamp, now_ms()))
            {
                return parse_snapshot(&snapshot);
            }
        }

        self.refresh().await
    }

    /// Cache metadata for the client
    pub async fn cache_info(&self) -> ApiResult<CacheInfo> {
        let snapshot = get_snapshot(&self.db, self.collection).await?;
        Ok(match snapshot {
            Some(s) => CacheInfo {
                is_cached: snapshot_is_fresh(s.timestamp, now_ms()),
                last_updated: Some(s.last_updated),
            },
            None => CacheInfo {
                last_updated: None,
                is_cached: false,
            },
        })
    }

    async fn refresh(&self) -> ApiResult<serde_json::Value> {
        let started = std::time::Instant::now();
        tracing::info!(collection = %self.collection, "Starting full refresh");

        let value = match self.collection {
            Collection::Roadmap => {
                let items = self
                    .github
                    .fetch_project_items(&self.progress)
                    .await
                    .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
                let enriched = self.orchestrator.enrich_roadmap(items, &self.cancel).await;
                serde_json::to_value(enriched)
            }
            Collection::Issues => {
                let issues = self
                    .github
                    .fetch_open_issues(&self.progress)
                    .await
                    .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
                let enriched = self.orchestrator.enrich_issues(issues, &self.cancel).await;
                serde_json::to_value(enriched)
            }
        }
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        let total = value.as_array().map(Vec::len).unwrap_or(0);
        self.progress
            .report(self.collection, "Saving snapshot", total, total);
        put_snapshot(&self.db, self.collection, &value.to_string()).await?;
        self.progress
            .report(self.collection, "Refresh complete", total, total);

        tracing::info!(
            collection = %self.collection,
            items = total,
            elapsed_secs = started.elapsed().as_secs(),
            "Refresh complete"
        );

        Ok(value)
    }
}

fn parse_snapshot(snapshot: &Snapshot) -> ApiResult<serde_json::Value> {
    serde_json::from_str(&snapshot.data)
        .map_err(|e| ApiError::Internal(format!("stored snapshot unreadable: {}", e)))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::inference::InferenceError;
    use crate::services::retry::RetryQueue;
    use boardwatch_common::config::GithubConfig;

    /// Backend that must never be reached on cache-hit paths
    struct PanicApi;

    impl CompletionApi for PanicApi {
        async fn complete(&self, _: &str, _: &str) -> Result<String, InferenceError> {
            panic!("inference API called on a cache-hit path");
        }
    }

    async fn test_coordinator(pool: SqlitePool) -> RefreshCoordinator<PanicApi> {
        let github = Arc::new(
            GithubClient::new(GithubConfig {
                token: "test".to_string(),
                owner: "contoso".to_string(),
                repo: "widgets".to_string(),
                project_owner: "contoso".to_string(),
                project_number: 1,
            })
            .unwrap(),
        );
        let gateway = Arc::new(InferenceGateway::new(
            PanicApi,
            pool.clone(),
            RetryQueue::new(),
        ));
        RefreshCoordinator::new(
            Collection::Roadmap,
            pool,
            ProgressBus::new(16),
            github,
            gateway,
        )
    }

    #[test]
    fn snapshot_ttl_boundaries() {
        let written = 1_700_000_000_000_i64;
        let almost = written + SNAPSHOT_TTL_MS - 60_000; // T + 23h59m
        let past = written + SNAPSHOT_TTL_MS + 60_000; // T + 24h01m

        assert!(snapshot_is_fresh(written, almost));
        assert!(!snapshot_is_fresh(written, past));
    }

    #[tokio::test]
    async fn fresh_snapshot_served_without_refresh() {
        let pool = test_pool().await;
        put_snapshot(&pool, Collection::Roadmap, r#"[{"id":"1","title":"cached"}]"#)
            .await
            .unwrap();

        let coordinator = test_coordinator(pool).await;
        let value = coordinator.get(false).await.unwrap();

        assert_eq!(value[0]["title"], "cached");
    }

    #[tokio::test]
    async fn cache_info_reflects_snapshot_state() {
        let pool = test_pool().await;
        let coordinator = test_coordinator(pool.clone()).await;

        let info = coordinator.cache_info().await.unwrap();
        assert!(!info.is_cached);
        assert!(info.last_updated.is_none());

        put_snapshot(&pool, Collection::Roadmap, "[]").await.unwrap();
        let info = coordinator.cache_info().await.unwrap();
        assert!(info.is_cached);
        assert!(info.last_updated.is_some());
    }

    #[tokio::test]
    async fn expired_snapshot_reported_as_uncached() {
        let pool = test_pool().await;
        put_snapshot(&pool, Collection::Roadmap, "[]").await.unwrap();
        sqlx::query("UPDATE collection_snapshots SET timestamp = timestamp - ?")
            .bind(SNAPSHOT_TTL_MS + 1000)
            .execute(&pool)
            .await
            .unwrap();

        let coordinator = test_coordinator(pool).await;
        let info = coordinator.cache_info().await.unwrap();
        assert!(!info.is_cached);
        // lastUpdated still reports the stale write time
        assert!(info.last_updated.is_some());
    }
}
