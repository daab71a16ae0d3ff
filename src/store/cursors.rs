// src/store/cursors.rs

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::models::SyncCursor;
use crate::error::StoreError;

pub struct CursorOps {
    db: SqlitePool,
}

impl CursorOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, channel_id: &str) -> Result<Option<SyncCursor>, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_cursors WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| row_to_cursor(&r)))
    }

    pub async fn get_batch(&self, channel_ids: &[String]) -> Result<HashMap<String, SyncCursor>, StoreError> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = channel_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT * FROM sync_cursors WHERE channel_id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in channel_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db).await?;
        Ok(rows.iter().map(|r| (r.get::<String, _>("channel_id"), row_to_cursor(r))).collect())
    }

    /// Callers are responsible for only ever advancing the cursor (§4.2
    /// invariant); this simply writes the value it is given.
    pub async fn set(&self, channel_id: &str, last_ts: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO sync_cursors (channel_id, last_ts, last_sync_at)
            VALUES (?, ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                last_ts = excluded.last_ts,
                last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(channel_id)
        .bind(last_ts)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

fn row_to_cursor(row: &sqlx::sqlite::SqliteRow) -> SyncCursor {
    SyncCursor {
        channel_id: row.get("channel_id"),
        last_ts: row.get("last_ts"),
        last_sync_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("last_sync_at"))
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    }
}
