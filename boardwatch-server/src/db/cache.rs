//! Inference result cache table
//!
//! One row per fingerprint key, upserted on every inference attempt,
//! success or failure. Readers interleave freely with the single
//! writer path; no multi-key transactions.

use sqlx::{Row, SqlitePool};

/// A cached inference attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub result: Option<String>,
    /// Epoch milliseconds of the attempt
    pub timestamp: i64,
    pub failed: bool,
}

impl CacheEntry {
    /// Entry age in milliseconds relative to `now_ms`
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }
}

/// Look up a cached inference attempt by fingerprint key
pub async fn get_inference(pool: &SqlitePool, key: &str) -> Result<Option<CacheEntry>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT key, result, timestamp, failed FROM inference_cache WHERE key = ?",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CacheEntry {
        key: row.get("key"),
        result: row.get("result"),
        timestamp: row.get("timestamp"),
        failed: row.get::<i64, _>("failed") != 0,
    }))
}

/// Record an inference attempt, overwriting any previous entry for the key
pub async fn put_inference(
    pool: &SqlitePool,
    key: &str,
    result: Option<&str>,
    failed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO inference_cache (key, result, timestamp, failed)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            result = excluded.result,
            timestamp = excluded.timestamp,
            failed = excluded.failed
        "#,
    )
    .bind(key)
    .bind(result)
    .bind(chrono::Utc::now().timestamp_millis())
    .bind(failed as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete cache entries older than the given timestamp. Returns the
/// number of rows removed.
pub async fn sweep_inference(pool: &SqlitePool, older_than_ms: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM inference_cache WHERE timestamp < ?")
        .bind(older_than_ms)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
