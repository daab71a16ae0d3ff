// src/store/mod.rs
// Relational + vector persistence façade (§3, §4.2). A thin delegator over
// per-entity operation structs, mirroring the upstream's single-repository
// shape without collapsing every table into one file.

pub mod channels;
pub mod cursors;
pub mod messages;
pub mod models;
pub mod queries;
pub mod reactions;
pub mod reminders;
pub mod schema;
pub mod users;
pub mod vector;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::AppConfig;
use crate::error::StoreError;

use channels::ChannelOps;
use cursors::CursorOps;
use messages::MessageOps;
use models::{AnnotatedMessage, Message};
use queries::ThreadReply;
use reactions::ReactionOps;
use reminders::ReminderOps;
use users::UserOps;
use vector::VectorStore;

pub struct Store {
    db: SqlitePool,
    pub channels: ChannelOps,
    pub users: UserOps,
    pub messages: MessageOps,
    pub reactions: ReactionOps,
    pub cursors: CursorOps,
    pub reminders: ReminderOps,
    pub vectors: VectorStore,
}

impl Store {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        sqlx::query(schema::SCHEMA).execute(&db).await?;

        let vectors = VectorStore::new(
            &config.qdrant.url,
            &config.qdrant.collection,
            config.qdrant.vector_dim,
        )
        .await?;

        Ok(Self {
            channels: ChannelOps::new(db.clone()),
            users: UserOps::new(db.clone()),
            messages: MessageOps::new(db.clone()),
            reactions: ReactionOps::new(db.clone()),
            cursors: CursorOps::new(db.clone()),
            reminders: ReminderOps::new(db.clone()),
            vectors,
            db,
        })
    }

    pub async fn get_unread_mentions(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, StoreError> {
        queries::get_unread_mentions(&self.db, user_id, since).await
    }

    pub async fn get_dms(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Message>, StoreError> {
        queries::get_dms(&self.db, since).await
    }

    pub async fn get_threads_with_replies(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ThreadReply>, StoreError> {
        queries::get_threads_with_replies(&self.db, user_id, since).await
    }

    pub async fn get_user_reply_status_batch(
        &self,
        user_id: &str,
        mention_contexts: &[(String, Option<String>, String)],
    ) -> Result<HashMap<String, bool>, StoreError> {
        queries::get_user_reply_status_batch(&self.db, user_id, mention_contexts).await
    }

    pub async fn get_recent_messages_for_analysis(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
        include_own_messages: bool,
    ) -> Result<Vec<AnnotatedMessage>, StoreError> {
        queries::get_recent_messages_for_analysis(&self.db, user_id, since, limit, include_own_messages).await
    }
}
