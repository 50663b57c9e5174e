//! Collection snapshot table
//!
//! One row per collection type, replaced wholesale at the end of every
//! successful refresh. The upsert keeps writes atomic from a reader's
//! point of view: a reader sees the previous complete snapshot or the
//! new one, never a mix.

use boardwatch_common::events::Collection;
use sqlx::{Row, SqlitePool};

/// A stored collection snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub collection: Collection,
    /// JSON-serialized enriched record list
    pub data: String,
    /// Epoch milliseconds of the refresh that wrote this snapshot
    pub timestamp: i64,
    /// Human-readable RFC 3339 refresh time
    pub last_updated: String,
}

impl Snapshot {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }
}

/// Read the current snapshot for a collection, if one exists
pub async fn get_snapshot(
    pool: &SqlitePool,
    collection: Collection,
) -> Result<Option<Snapshot>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT data, timestamp, last_updated FROM collection_snapshots WHERE collection = ?",
    )
    .bind(collection.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Snapshot {
        collection,
        data: row.get("data"),
        timestamp: row.get("timestamp"),
        last_updated: row.get("last_updated"),
    }))
}

/// Replace the snapshot for a collection wholesale, stamping it now
pub async fn put_snapshot(
    pool: &SqlitePool,
    collection: Collection,
    data: &str,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO collection_snapshots (collection, data, timestamp, last_updated)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(collection) DO UPDATE SET
            data = excluded.data,
            timestamp = excluded.timestamp,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(collection.as_str())
    .bind(data)
    .bind(now.timestamp_millis())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
