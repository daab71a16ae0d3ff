// src/store/reminders.rs

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::models::Reminder;
use crate::error::StoreError;

pub struct ReminderOps {
    db: SqlitePool,
}

impl ReminderOps {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, reminder: &Reminder) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO reminders (id, user_id, text, time, complete_ts, recurring, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                time = excluded.time,
                complete_ts = excluded.complete_ts,
                recurring = excluded.recurring,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&reminder.id)
        .bind(&reminder.user_id)
        .bind(&reminder.text)
        .bind(reminder.time.map(|t| t.to_rfc3339()))
        .bind(reminder.complete_ts.map(|t| t.to_rfc3339()))
        .bind(reminder.recurring)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Pending reminders (`complete_ts IS NULL`) for a user.
    pub async fn get_pending(&self, user_id: &str) -> Result<Vec<Reminder>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM reminders WHERE user_id = ? AND complete_ts IS NULL ORDER BY time ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_reminder).collect())
    }
}

fn row_to_reminder(row: &sqlx::sqlite::SqliteRow) -> Reminder {
    Reminder {
        id: row.get("id"),
        user_id: row.get("user_id"),
        text: row.get("text"),
        time: row
            .get::<Option<String>, _>("time")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        complete_ts: row
            .get::<Option<String>, _>("complete_ts")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        recurring: row.get("recurring"),
    }
}
