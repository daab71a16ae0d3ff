// src/agent/tools/find_context.rs
// `find_context` — find messages related to a given one by semantic
// similarity, for pulling in background before answering a question about
// it (§4.5). Grounded on
// `original_source/slack_assistant/agent/tools/context_tool.py`, which
// wraps the same absent `SearchService`; the k-NN-over-the-message's-own-
// embedding approach is grounded directly in the spec's description of
// `find_context` plus `VectorStore::knn`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::formatting::format_text;

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
struct ContextHit {
    channel_id: String,
    channel: String,
    message_ts: String,
    user: String,
    text: String,
    score: f32,
}

pub struct FindContextTool {
    state: Arc<AgentState>,
}

impl FindContextTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for FindContextTool {
    fn name(&self) -> &'static str {
        "find_context"
    }

    fn description(&self) -> &'static str {
        "Find messages related to a given one (by channel_id + message_ts) by semantic \
         similarity, for background before answering a question about it."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string"},
                "message_ts": {"type": "string"},
                "limit": {"type": "integer", "description": "Maximum results. Defaults to 10."}
            },
            "required": ["channel_id", "message_ts"]
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let channel_id = input
            .get("channel_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("channel_id is required"))?;
        let message_ts = input
            .get("message_ts")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("message_ts is required"))?;
        let limit = input.get("limit").and_then(Value::as_u64).map(|n| n as usize).unwrap_or(DEFAULT_LIMIT);

        let source_messages = self.state.store.messages.get_thread_messages(channel_id, message_ts).await?;
        let source = source_messages
            .into_iter()
            .find(|m| m.ts == message_ts)
            .ok_or_else(|| anyhow::anyhow!("message not found"))?;
        let source_key = source.key;

        let text = source
            .text
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("message has no text to embed"))?;
        let query_vec = self.state.embeddings.embed(text).await?;

        // Over-fetch by one to absorb the source message itself showing up
        // as its own nearest neighbor.
        let hits = self.state.store.vectors.knn(&query_vec, limit + 1).await?;

        let mut entities = crate::formatting::CollectedEntities::default();
        let mut candidates = Vec::new();
        for (key, score) in hits {
            if key == source_key {
                continue;
            }
            if let Some(message) = self.state.store.messages.get_by_key(key).await? {
                entities.merge(crate::formatting::collect_entities(message.text.as_deref()));
                if let Some(uid) = &message.user_id {
                    entities.user_ids.insert(uid.clone());
                }
                entities.channel_ids.insert(message.channel_id.clone());
                candidates.push((message, score));
            }
        }
        let context = self.state.resolver.resolve(&entities).await?;

        let mut out: Vec<ContextHit> = candidates
            .into_iter()
            .map(|(message, score)| ContextHit {
                channel_id: message.channel_id.clone(),
                channel: context.get_channel_name(&message.channel_id),
                message_ts: message.ts.clone(),
                user: message
                    .user_id
                    .as_deref()
                    .map(|id| context.get_user_name(id))
                    .unwrap_or_else(|| "unknown".to_string()),
                text: format_text(message.text.as_deref(), &context),
                score,
            })
            .collect();
        out.truncate(limit);

        Ok(json!({ "count": out.len(), "results": out }))
    }
}
