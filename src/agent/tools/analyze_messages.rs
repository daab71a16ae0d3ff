// src/agent/tools/analyze_messages.rs
// `analyze_messages` — the primary tool: recent messages with full
// rendered context for the model to reason about directly, rather than a
// pre-bucketed summary (§4.5). Grounded on
// `original_source/slack_assistant/agent/tools/analysis_tool.py`
// (`repository.get_recent_messages_for_analysis`, `exclude_analyzed`
// filter against the session's analyzed keys, user-id collection from
// senders + mentions, batch resolution, text truncation, link generation).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::formatting::{CollectedEntities, collect_entities, format_text};

const DEFAULT_SINCE_HOURS: f64 = 24.0;
const DEFAULT_LIMIT: i64 = 50;
const DEFAULT_TEXT_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct AnalyzedMessage {
    channel_id: String,
    channel: String,
    message_ts: String,
    thread_ts: Option<String>,
    user: String,
    text: String,
    link: String,
    is_mention: bool,
    is_dm: bool,
    is_self_dm: bool,
    metadata_priority: String,
    already_analyzed: bool,
}

pub struct AnalyzeMessagesTool {
    state: Arc<AgentState>,
}

impl AnalyzeMessagesTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for AnalyzeMessagesTool {
    fn name(&self) -> &'static str {
        "analyze_messages"
    }

    fn description(&self) -> &'static str {
        "Pull recent messages (mentions, DMs, thread replies) with full rendered context \
         so you can judge what actually needs attention. This is the primary way to check \
         what's going on; prefer it over get_status."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "since_hours": {"type": "number", "description": "How many hours back to look. Defaults to 24."},
                "limit": {"type": "integer", "description": "Maximum messages to return. Defaults to 50."},
                "include_own_messages": {"type": "boolean", "description": "Include the user's own messages. Defaults to false."},
                "exclude_analyzed": {"type": "boolean", "description": "Skip messages already analyzed this session. Defaults to true."},
                "text_limit": {"type": "integer", "description": "Max characters per message text. Defaults to 500."}
            }
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let since_hours = input.get("since_hours").and_then(Value::as_f64).unwrap_or(DEFAULT_SINCE_HOURS);
        let limit = input.get("limit").and_then(Value::as_i64).unwrap_or(DEFAULT_LIMIT);
        let include_own_messages = input.get("include_own_messages").and_then(Value::as_bool).unwrap_or(false);
        let exclude_analyzed = input.get("exclude_analyzed").and_then(Value::as_bool).unwrap_or(true);
        let text_limit = input
            .get("text_limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_TEXT_LIMIT);

        let since = Utc::now() - Duration::seconds((since_hours * 3600.0) as i64);

        let messages = self
            .state
            .store
            .get_recent_messages_for_analysis(&self.state.user_id, since, limit, include_own_messages)
            .await?;

        let analyzed_keys = self.state.session.lock().await.analyzed_keys();

        let mut filtered = messages;
        if exclude_analyzed {
            filtered.retain(|m| !analyzed_keys.contains(&format!("{}:{}", m.message.channel_id, m.message.ts)));
        }

        let mut entities = CollectedEntities::default();
        for m in &filtered {
            entities.merge(collect_entities(m.message.text.as_deref()));
            if let Some(uid) = &m.message.user_id {
                entities.user_ids.insert(uid.clone());
            }
            entities.channel_ids.insert(m.message.channel_id.clone());
        }
        let context = self.state.resolver.resolve(&entities).await?;

        let out: Vec<AnalyzedMessage> = filtered
            .into_iter()
            .map(|m| {
                let rendered = format_text(m.message.text.as_deref(), &context);
                let text = truncate(&rendered, text_limit);
                let user = m
                    .message
                    .user_id
                    .as_deref()
                    .map(|id| context.get_user_name(id))
                    .unwrap_or_else(|| "unknown".to_string());
                let channel = context.get_channel_name(&m.message.channel_id);
                let link = self.state.upstream.message_link(
                    &m.message.channel_id,
                    &m.message.ts,
                    m.message.thread_ts.as_deref(),
                );
                let already_analyzed = analyzed_keys.contains(&format!("{}:{}", m.message.channel_id, m.message.ts));

                AnalyzedMessage {
                    channel_id: m.message.channel_id.clone(),
                    channel,
                    message_ts: m.message.ts.clone(),
                    thread_ts: m.message.thread_ts.clone(),
                    user,
                    text,
                    link,
                    is_mention: m.is_mention,
                    is_dm: m.is_dm,
                    is_self_dm: m.is_self_dm,
                    metadata_priority: format!("{:?}", m.metadata_priority).to_lowercase(),
                    already_analyzed,
                }
            })
            .collect();

        Ok(json!({ "count": out.len(), "messages": out }))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}...")
    }
}
