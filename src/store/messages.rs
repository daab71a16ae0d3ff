// src/store/messages.rs

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::models::{Message, NewMessage};
use crate::error::StoreError;

pub struct MessageOps {
    db: SqlitePool,
}

impl MessageOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Upsert keyed on `(channel_id, ts)`; last-write-wins on mutable
    /// fields. Returns the surrogate `key`.
    pub async fn upsert(&self, msg: &NewMessage) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let created_at = msg
            .ts
            .parse::<f64>()
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs as i64, 0))
            .map(|t| t.to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO messages (
                channel_id, ts, user_id, text, thread_ts, reply_count,
                is_edited, message_type, created_at, updated_at, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id, ts) DO UPDATE SET
                user_id = excluded.user_id,
                text = excluded.text,
                thread_ts = excluded.thread_ts,
                reply_count = excluded.reply_count,
                is_edited = excluded.is_edited,
                message_type = excluded.message_type,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata
            "#,
        )
        .bind(&msg.channel_id)
        .bind(&msg.ts)
        .bind(&msg.user_id)
        .bind(&msg.text)
        .bind(&msg.thread_ts)
        .bind(msg.reply_count)
        .bind(msg.is_edited)
        .bind(&msg.message_type)
        .bind(created_at)
        .bind(now)
        .bind(msg.metadata.to_string())
        .execute(&self.db)
        .await?;

        let row = sqlx::query("SELECT key FROM messages WHERE channel_id = ? AND ts = ?")
            .bind(&msg.channel_id)
            .bind(&msg.ts)
            .fetch_one(&self.db)
            .await?;
        Ok(row.get("key"))
    }

    /// Parent + replies ordered by `ts` ascending.
    pub async fn get_thread_messages(&self, channel_id: &str, parent_ts: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE channel_id = ? AND (ts = ? OR thread_ts = ?) ORDER BY ts ASC",
        )
        .bind(channel_id)
        .bind(parent_ts)
        .bind(parent_ts)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn get_by_key(&self, key: i64) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query("SELECT * FROM messages WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| row_to_message(&r)))
    }

    /// Case-insensitive substring match over message text, most recent
    /// first.
    pub async fn search_text(&self, query: &str, limit: i64) -> Result<Vec<Message>, StoreError> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE text LIKE ? ESCAPE '\\' ORDER BY ts DESC LIMIT ?",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }
}

pub(super) fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    let metadata_raw: String = row.get("metadata");
    Message {
        key: row.get("key"),
        channel_id: row.get("channel_id"),
        ts: row.get("ts"),
        user_id: row.get("user_id"),
        text: row.get("text"),
        thread_ts: row.get("thread_ts"),
        reply_count: row.get("reply_count"),
        is_edited: row.get("is_edited"),
        message_type: row.get("message_type"),
        created_at: row
            .get::<Option<String>, _>("created_at")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::json!({})),
    }
}
