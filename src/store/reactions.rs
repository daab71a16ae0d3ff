// src/store/reactions.rs

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use super::models::Reaction;
use crate::error::StoreError;

pub struct ReactionOps {
    db: SqlitePool,
}

impl ReactionOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Atomic delete-then-insert within a transaction; set-semantics, full
    /// replacement (never merge) to keep parity with the upstream.
    pub async fn replace(&self, message_key: i64, reactions: &[Reaction]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM reactions WHERE message_key = ?")
            .bind(message_key)
            .execute(&mut *tx)
            .await?;

        for reaction in reactions {
            sqlx::query("INSERT INTO reactions (message_key, name, user_id) VALUES (?, ?, ?)")
                .bind(message_key)
                .bind(&reaction.name)
                .bind(&reaction.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_for_message(&self, message_key: i64) -> Result<Vec<Reaction>, StoreError> {
        let rows = sqlx::query("SELECT name, user_id FROM reactions WHERE message_key = ?")
            .bind(message_key)
            .fetch_all(&self.db)
            .await?;
        Ok(rows
            .iter()
            .map(|r| Reaction {
                name: r.get("name"),
                user_id: r.get("user_id"),
            })
            .collect())
    }

    /// Reactions for several messages at once, grouped `emoji -> [user names]`
    /// via a subsequent join the caller performs; here we return raw rows.
    pub async fn get_for_messages_batch(&self, message_keys: &[i64]) -> Result<HashMap<i64, Vec<Reaction>>, StoreError> {
        if message_keys.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = message_keys.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT message_key, name, user_id FROM reactions WHERE message_key IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for key in message_keys {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.db).await?;
        let mut out: HashMap<i64, Vec<Reaction>> = HashMap::new();
        for row in rows {
            let key: i64 = row.get("message_key");
            out.entry(key).or_default().push(Reaction {
                name: row.get("name"),
                user_id: row.get("user_id"),
            });
        }
        Ok(out)
    }

    /// For each item key `(channel_id, ts)`, the set of acknowledgment
    /// emojis `userId` has reacted with, restricted to `emoji_allowlist`.
    pub async fn get_user_reactions_on_items(
        &self,
        user_id: &str,
        items: &[(String, String)],
        emoji_allowlist: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError> {
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        if items.is_empty() || emoji_allowlist.is_empty() {
            return Ok(out);
        }

        for (channel_id, ts) in items {
            let placeholders = emoji_allowlist.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT r.name FROM reactions r \
                 JOIN messages m ON m.key = r.message_key \
                 WHERE m.channel_id = ? AND m.ts = ? AND r.user_id = ? AND r.name IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(channel_id).bind(ts).bind(user_id);
            for emoji in emoji_allowlist {
                query = query.bind(emoji);
            }
            let rows = query.fetch_all(&self.db).await?;
            if rows.is_empty() {
                continue;
            }
            let emojis: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
            out.insert(format!("{channel_id}:{ts}"), emojis);
        }

        Ok(out)
    }
}
