//! Periodic inference cache sweep
//!
//! The cache table has no per-row eviction; this task deletes entries
//! old enough that no policy would ever serve them again.

use crate::db::cache::sweep_inference;
use crate::services::gateway::SUCCESS_TTL_MS;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Seconds between sweeps
pub const SWEEP_INTERVAL_SECS: u64 = 60 * 60;
/// Entries older than this many success TTLs are deleted
pub const RETENTION_TTLS: i64 = 7;

/// Spawn the hourly cache sweeper
pub fn spawn_cache_sweeper(pool: SqlitePool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let cutoff = chrono::Utc::now().timestamp_millis() - RETENTION_TTLS * SUCCESS_TTL_MS;
            match sweep_inference(&pool, cutoff).await {
                Ok(0) => {}
                Ok(deleted) => {
                    tracing::info!(deleted, "Swept stale inference cache entries");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cache sweep failed");
                }
            }
        }
    })
}
