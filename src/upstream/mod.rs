// src/upstream/mod.rs

//! The upstream messaging API, gated by [`crate::rate_gate::RateGate`].

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

pub use client::HttpUpstreamClient;

/// One conversation as returned by `conversations.list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    pub name: Option<String>,
    pub user: Option<String>,
    pub is_im: bool,
    pub is_mpim: bool,
    pub is_private: bool,
    pub is_archived: bool,
    pub created: Option<i64>,
    pub unread_count: i64,
    /// ts of the most recent message in this conversation, if any.
    pub latest_ts: Option<String>,
}

/// A raw message payload from `conversations.history` / `conversations.replies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub reactions: Vec<RawReaction>,
}

fn default_message_type() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReaction {
    pub name: String,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUser {
    pub id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReminder {
    pub id: String,
    pub text: Option<String>,
    pub time: Option<i64>,
    pub complete_ts: Option<i64>,
    #[serde(default)]
    pub recurring: bool,
}

/// A page of history or thread replies, newest-first as the upstream
/// actually returns them.
pub struct MessagePage {
    pub messages: Vec<RawMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// The upstream messaging API surface this core depends on. One method per
/// §6 rate-limit tier row.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn auth_test(&self) -> Result<String, UpstreamError>;
    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, UpstreamError>;
    async fn channel_history(
        &self,
        channel_id: &str,
        oldest: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, UpstreamError>;
    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<RawMessage>, UpstreamError>;
    async fn user_info(&self, user_id: &str) -> Result<RawUser, UpstreamError>;
    async fn user_list(&self) -> Result<Vec<RawUser>, UpstreamError>;
    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<RawMessage>, UpstreamError>;
    async fn reminders_list(&self, user_id: &str) -> Result<Vec<RawReminder>, UpstreamError>;

    /// Render a permalink for a message, optionally scoped to a thread.
    fn message_link(&self, channel_id: &str, message_ts: &str, thread_ts: Option<&str>) -> String;
}
