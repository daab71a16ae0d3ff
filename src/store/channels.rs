// src/store/channels.rs

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::models::{Channel, ChannelKind};
use crate::error::StoreError;

pub struct ChannelOps {
    db: SqlitePool,
}

impl ChannelOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Upsert a channel. Conflict keyed on `id`, last-write-wins on mutable
    /// fields. `kind` is immutable once observed and so is never updated.
    pub async fn upsert(&self, channel: &Channel) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO channels (id, name, kind, is_archived, is_self_dm, created_at, updated_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_archived = excluded.is_archived,
                is_self_dm = excluded.is_self_dm,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata
            "#,
        )
        .bind(&channel.id)
        .bind(&channel.name)
        .bind(channel.kind.as_str())
        .bind(channel.is_archived)
        .bind(channel.is_self_dm)
        .bind(channel.created_at.map(|t| t.to_rfc3339()))
        .bind(now)
        .bind(channel.metadata.to_string())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| row_to_channel(&r)))
    }

    pub async fn get_all(&self) -> Result<Vec<Channel>, StoreError> {
        let rows = sqlx::query("SELECT * FROM channels").fetch_all(&self.db).await?;
        Ok(rows.iter().map(row_to_channel).collect())
    }

    pub async fn get_batch(&self, ids: &[String]) -> Result<Vec<Channel>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT * FROM channels WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db).await?;
        Ok(rows.iter().map(row_to_channel).collect())
    }

    pub async fn self_dm_channel_ids(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT id FROM channels WHERE is_self_dm = 1")
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
    }
}

fn row_to_channel(row: &sqlx::sqlite::SqliteRow) -> Channel {
    let metadata_raw: String = row.get("metadata");
    Channel {
        id: row.get("id"),
        name: row.get("name"),
        kind: ChannelKind::from_str(&row.get::<String, _>("kind")),
        is_archived: row.get("is_archived"),
        is_self_dm: row.get("is_self_dm"),
        created_at: row
            .get::<Option<String>, _>("created_at")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::json!({})),
    }
}
