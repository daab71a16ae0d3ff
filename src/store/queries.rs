// src/store/queries.rs
// Cross-cutting batch and analysis queries that join messages against
// channels, used by status composition and the analyze_messages tool (§4.2).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::messages::row_to_message;
use super::models::{AnnotatedMessage, Message, MetadataPriority, ts_gt};
use crate::error::StoreError;

const DEFAULT_LIMIT: i64 = 50;

/// Messages whose text contains a literal `<@user_id>` mention.
pub async fn get_unread_mentions(
    db: &SqlitePool,
    user_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Message>, StoreError> {
    let pattern = format!("%<@{user_id}>%");
    let rows = match since {
        Some(since) => {
            sqlx::query(
                "SELECT * FROM messages WHERE text LIKE ? AND created_at > ? \
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(&pattern)
            .bind(since.to_rfc3339())
            .bind(DEFAULT_LIMIT)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM messages WHERE text LIKE ? ORDER BY created_at DESC LIMIT ?")
                .bind(&pattern)
                .bind(DEFAULT_LIMIT)
                .fetch_all(db)
                .await?
        }
    };
    Ok(rows.iter().map(row_to_message).collect())
}

/// Recent messages in channels of kind `im`.
pub async fn get_dms(db: &SqlitePool, since: Option<DateTime<Utc>>) -> Result<Vec<Message>, StoreError> {
    let rows = match since {
        Some(since) => {
            sqlx::query(
                "SELECT m.* FROM messages m JOIN channels c ON c.id = m.channel_id \
                 WHERE c.kind = 'im' AND m.created_at > ? ORDER BY m.created_at DESC LIMIT ?",
            )
            .bind(since.to_rfc3339())
            .bind(DEFAULT_LIMIT)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT m.* FROM messages m JOIN channels c ON c.id = m.channel_id \
                 WHERE c.kind = 'im' ORDER BY m.created_at DESC LIMIT ?",
            )
            .bind(DEFAULT_LIMIT)
            .fetch_all(db)
            .await?
        }
    };
    Ok(rows.iter().map(row_to_message).collect())
}

pub struct ThreadReply {
    pub message: Message,
    pub channel_name: Option<String>,
}

/// Threads `user_id` has posted in that have replies from other users since
/// `since`. One pass to find the user's own thread keys, then a query per
/// thread key for replies from others — mirrors the upstream's approach of
/// never needing a self-join across the whole table.
pub async fn get_threads_with_replies(
    db: &SqlitePool,
    user_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<ThreadReply>, StoreError> {
    let own_rows = sqlx::query("SELECT DISTINCT channel_id, thread_ts, ts FROM messages WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(db)
        .await?;

    let mut thread_keys: Vec<(String, String)> = Vec::new();
    for row in &own_rows {
        let channel_id: String = row.get("channel_id");
        let thread_ts: Option<String> = row.get("thread_ts");
        let ts: String = row.get("ts");
        let effective = thread_ts.unwrap_or(ts);
        let key = (channel_id, effective);
        if !thread_keys.contains(&key) {
            thread_keys.push(key);
        }
    }

    if thread_keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for (channel_id, thread_ts) in thread_keys {
        let rows = match since {
            Some(since) => {
                sqlx::query(
                    "SELECT m.*, c.name AS channel_name FROM messages m \
                     JOIN channels c ON c.id = m.channel_id \
                     WHERE m.channel_id = ? AND (m.ts = ? OR m.thread_ts = ?) \
                     AND m.user_id != ? AND m.created_at > ? \
                     ORDER BY m.created_at DESC LIMIT 10",
                )
                .bind(&channel_id)
                .bind(&thread_ts)
                .bind(&thread_ts)
                .bind(user_id)
                .bind(since.to_rfc3339())
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT m.*, c.name AS channel_name FROM messages m \
                     JOIN channels c ON c.id = m.channel_id \
                     WHERE m.channel_id = ? AND (m.ts = ? OR m.thread_ts = ?) \
                     AND m.user_id != ? \
                     ORDER BY m.created_at DESC LIMIT 10",
                )
                .bind(&channel_id)
                .bind(&thread_ts)
                .bind(&thread_ts)
                .bind(user_id)
                .fetch_all(db)
                .await?
            }
        };

        for row in &rows {
            out.push(ThreadReply {
                message: row_to_message(row),
                channel_name: row.get("channel_name"),
            });
        }
    }

    Ok(out)
}

/// For each `(channel_id, thread_ts, mention_ts)` context, whether `user_id`
/// has a message in that thread with `ts > mention_ts`. `thread_ts` absent
/// means the mention itself may be a thread root, so `mention_ts` doubles as
/// the effective thread root in that case.
pub async fn get_user_reply_status_batch(
    db: &SqlitePool,
    user_id: &str,
    mention_contexts: &[(String, Option<String>, String)],
) -> Result<HashMap<String, bool>, StoreError> {
    let mut out = HashMap::new();
    if mention_contexts.is_empty() {
        return Ok(out);
    }

    for (channel_id, thread_ts, mention_ts) in mention_contexts {
        let effective_thread_ts = thread_ts.clone().unwrap_or_else(|| mention_ts.clone());
        let context_key = format!("{channel_id}:{effective_thread_ts}");

        let row = sqlx::query(
            "SELECT key FROM messages WHERE channel_id = ? AND user_id = ? AND ts > ? \
             AND (thread_ts = ? OR ts = ?) LIMIT 1",
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(mention_ts)
        .bind(&effective_thread_ts)
        .bind(&effective_thread_ts)
        .fetch_optional(db)
        .await?;

        out.insert(context_key, row.is_some());
    }

    Ok(out)
}

/// All recent messages for LLM analysis, unfiltered by type or priority,
/// annotated with cheap hints (`is_mention`/`is_dm`/`is_self_dm`/
/// `metadata_priority`) the agent's tool can use or ignore.
pub async fn get_recent_messages_for_analysis(
    db: &SqlitePool,
    user_id: &str,
    since: DateTime<Utc>,
    limit: i64,
    include_own_messages: bool,
) -> Result<Vec<AnnotatedMessage>, StoreError> {
    let rows = if include_own_messages {
        sqlx::query(
            "SELECT m.*, c.kind AS channel_kind, c.is_self_dm AS channel_is_self_dm \
             FROM messages m JOIN channels c ON c.id = m.channel_id \
             WHERE m.created_at > ? ORDER BY m.created_at DESC LIMIT ?",
        )
        .bind(since.to_rfc3339())
        .bind(limit)
        .fetch_all(db)
        .await?
    } else {
        sqlx::query(
            "SELECT m.*, c.kind AS channel_kind, c.is_self_dm AS channel_is_self_dm \
             FROM messages m JOIN channels c ON c.id = m.channel_id \
             WHERE m.created_at > ? AND m.user_id != ? ORDER BY m.created_at DESC LIMIT ?",
        )
        .bind(since.to_rfc3339())
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await?
    };

    let mention_pattern = format!("<@{user_id}>");
    let out = rows
        .iter()
        .map(|row| {
            let message = row_to_message(row);
            let channel_kind: String = row.get("channel_kind");
            let channel_is_self_dm: bool = row.get("channel_is_self_dm");
            let is_dm = channel_kind == "im" && !channel_is_self_dm;
            let is_mention = message
                .text
                .as_deref()
                .is_some_and(|t| t.contains(&mention_pattern));

            let metadata_priority = if is_mention {
                MetadataPriority::Critical
            } else if is_dm {
                MetadataPriority::High
            } else if message.is_thread_reply() {
                MetadataPriority::Medium
            } else {
                MetadataPriority::Low
            };

            AnnotatedMessage {
                message,
                is_mention,
                is_dm,
                is_self_dm: channel_is_self_dm,
                metadata_priority,
            }
        })
        .collect();

    Ok(out)
}

/// True if `candidate_ts` is newer than every cursor value seen so far for
/// that channel — used by the scheduler's needs-sync check (§4.3).
pub fn is_newer_than_cursor(candidate_ts: &str, cursor_ts: Option<&str>) -> bool {
    match cursor_ts {
        Some(cursor) => ts_gt(candidate_ts, cursor),
        None => true,
    }
}
