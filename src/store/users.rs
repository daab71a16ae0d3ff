// src/store/users.rs

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::models::User;
use crate::error::StoreError;

pub struct UserOps {
    db: SqlitePool,
}

impl UserOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, user: &User) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, real_name, display_name, is_bot, updated_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                real_name = excluded.real_name,
                display_name = excluded.display_name,
                is_bot = excluded.is_bot,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.real_name)
        .bind(&user.display_name)
        .bind(user.is_bot)
        .bind(now)
        .bind(user.metadata.to_string())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| row_to_user(&r)))
    }

    pub async fn get_batch(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT * FROM users WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db).await?;
        Ok(rows.iter().map(row_to_user).collect())
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    let metadata_raw: String = row.get("metadata");
    User {
        id: row.get("id"),
        name: row.get("name"),
        real_name: row.get("real_name"),
        display_name: row.get("display_name"),
        is_bot: row.get("is_bot"),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::json!({})),
    }
}
