// src/agent/tools/get_thread.rs
// `get_thread` — fetch a full thread by channel/thread_ts or by a message
// link, optionally refreshing reactions from the upstream first (§4.5).
// Grounded on `original_source/slack_assistant/agent/tools/thread_tool.py`
// (accepts either `channel_id`+`thread_ts` or `message_link`, whose parsing
// is already ported into `formatting::parse_message_link`); the
// refresh-then-persist path follows `sync_worker`'s
// `persist_message`/`reactions.replace` pattern.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::formatting::{format_text, parse_message_link};
use crate::store::models::{NewMessage, Reaction};

#[derive(Debug, Serialize)]
struct ThreadMessageView {
    ts: String,
    user: String,
    text: String,
    is_parent: bool,
}

pub struct GetThreadTool {
    state: Arc<AgentState>,
}

impl GetThreadTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }

    /// Resolves `(channel_id, thread_ts)` from the tool's input, preferring
    /// an explicit channel/thread pair and falling back to parsing a
    /// message link. A link pointing at a reply is rooted at that
    /// message's own `thread_ts` field, looked up in the store.
    async fn resolve_target(&self, input: &Value) -> anyhow::Result<(String, String)> {
        if let (Some(channel_id), Some(thread_ts)) = (
            input.get("channel_id").and_then(Value::as_str),
            input.get("thread_ts").and_then(Value::as_str),
        ) {
            return Ok((channel_id.to_string(), thread_ts.to_string()));
        }

        let link = input
            .get("message_link")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("must provide channel_id+thread_ts or message_link"))?;
        let (channel_id, message_ts) =
            parse_message_link(link).ok_or_else(|| anyhow::anyhow!("could not parse message_link"))?;

        let thread_ts = self
            .state
            .store
            .messages
            .get_thread_messages(&channel_id, &message_ts)
            .await?
            .into_iter()
            .find(|m| m.ts == message_ts)
            .and_then(|m| m.thread_ts)
            .unwrap_or(message_ts);

        Ok((channel_id, thread_ts))
    }

    async fn refresh_reactions(&self, channel_id: &str, thread_ts: &str) -> anyhow::Result<()> {
        let channel_id_owned = channel_id.to_string();
        let thread_ts_owned = thread_ts.to_string();
        let replies = self
            .state
            .rate_gate
            .execute("conversations.replies", || {
                let upstream = self.state.upstream.clone();
                let channel_id = channel_id_owned.clone();
                let thread_ts = thread_ts_owned.clone();
                async move { upstream.thread_replies(&channel_id, &thread_ts).await }
            })
            .await?;

        for msg in &replies {
            let new_msg = NewMessage {
                channel_id: channel_id.to_string(),
                ts: msg.ts.clone(),
                user_id: msg.user.clone(),
                text: msg.text.clone(),
                thread_ts: msg.thread_ts.clone(),
                reply_count: msg.reply_count,
                is_edited: msg.is_edited,
                message_type: msg.message_type.clone(),
                metadata: serde_json::json!({}),
            };
            let key = self.state.store.messages.upsert(&new_msg).await?;

            let reactions: Vec<Reaction> = msg
                .reactions
                .iter()
                .flat_map(|r| {
                    r.users.iter().map(move |u| Reaction {
                        name: r.name.clone(),
                        user_id: u.clone(),
                    })
                })
                .collect();
            self.state.store.reactions.replace(key, &reactions).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Tool for GetThreadTool {
    fn name(&self) -> &'static str {
        "get_thread"
    }

    fn description(&self) -> &'static str {
        "Fetch every message in a thread, given either a channel_id + thread_ts or a message link."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string"},
                "thread_ts": {"type": "string"},
                "message_link": {"type": "string", "description": "A permalink to any message in the thread."},
                "refresh_reactions": {"type": "boolean", "description": "Re-fetch from upstream to pick up new reactions first. Defaults to false."}
            }
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let (channel_id, thread_ts) = self.resolve_target(&input).await?;

        if input.get("refresh_reactions").and_then(Value::as_bool).unwrap_or(false) {
            self.refresh_reactions(&channel_id, &thread_ts).await?;
        }

        let messages = self.state.store.messages.get_thread_messages(&channel_id, &thread_ts).await?;
        if messages.is_empty() {
            return Ok(json!({ "channel_id": channel_id, "thread_ts": thread_ts, "messages": [] }));
        }

        let mut entities = crate::formatting::CollectedEntities::default();
        for m in &messages {
            entities.merge(crate::formatting::collect_entities(m.text.as_deref()));
            if let Some(uid) = &m.user_id {
                entities.user_ids.insert(uid.clone());
            }
        }
        let context = self.state.resolver.resolve(&entities).await?;

        let out: Vec<ThreadMessageView> = messages
            .iter()
            .map(|m| ThreadMessageView {
                ts: m.ts.clone(),
                user: m
                    .user_id
                    .as_deref()
                    .map(|id| context.get_user_name(id))
                    .unwrap_or_else(|| "unknown".to_string()),
                text: format_text(m.text.as_deref(), &context),
                is_parent: m.ts == thread_ts,
            })
            .collect();

        Ok(json!({ "channel_id": channel_id, "thread_ts": thread_ts, "messages": out }))
    }
}
