// src/agent/tools/manage_session.rs
// `manage_session` — track what's already been reviewed, deferred, or
// acted on this session, set a current focus, and save a running summary
// (§4.5, §4.6). Grounded on
// `original_source/slack_assistant/agent/tools/session_tool.py`: each
// mark_item_* action is idempotent (returns `already_processed: true`
// without re-adding if the key is already recorded).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::persistence::session::ItemDisposition;

pub struct ManageSessionTool {
    state: Arc<AgentState>,
}

impl ManageSessionTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }

    async fn mark_item(&self, input: &Value, disposition: ItemDisposition) -> anyhow::Result<Value> {
        let channel_id = input
            .get("channel_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("channel_id is required"))?
            .to_string();
        let message_ts = input
            .get("message_ts")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("message_ts is required"))?
            .to_string();
        let thread_ts = input.get("thread_ts").and_then(Value::as_str).map(str::to_string);
        let notes = input.get("notes").and_then(Value::as_str).map(str::to_string);

        let mut session = self.state.session.lock().await;
        if session.is_item_processed(&channel_id, &message_ts) {
            return Ok(json!({ "already_processed": true }));
        }

        session.add_processed_item(channel_id, message_ts, disposition, thread_ts, notes);
        drop(session);
        self.state.save_session().await?;

        Ok(json!({ "already_processed": false, "marked": true }))
    }
}

#[async_trait]
impl Tool for ManageSessionTool {
    fn name(&self) -> &'static str {
        "manage_session"
    }

    fn description(&self) -> &'static str {
        "Track what's been reviewed, deferred, or acted on this session, set the current \
         focus, and save a running summary. Actions: get_session_info, mark_item_reviewed, \
         mark_item_deferred, mark_item_acted_on, set_focus, save_summary, get_processed_items."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["get_session_info", "mark_item_reviewed", "mark_item_deferred", "mark_item_acted_on", "set_focus", "save_summary", "get_processed_items"]
                },
                "channel_id": {"type": "string"},
                "message_ts": {"type": "string"},
                "thread_ts": {"type": "string"},
                "notes": {"type": "string"},
                "focus": {"type": "string", "description": "For set_focus."},
                "summary_text": {"type": "string", "description": "For save_summary."},
                "key_topics": {"type": "array", "items": {"type": "string"}, "description": "For save_summary."},
                "pending_follow_ups": {"type": "array", "items": {"type": "string"}, "description": "For save_summary."}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let action = input
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("action is required"))?;

        match action {
            "get_session_info" => {
                let session = self.state.session.lock().await;
                Ok(json!({ "summary": session.summary_text() }))
            }
            "mark_item_reviewed" => self.mark_item(&input, ItemDisposition::Reviewed).await,
            "mark_item_deferred" => self.mark_item(&input, ItemDisposition::Deferred).await,
            "mark_item_acted_on" => self.mark_item(&input, ItemDisposition::ActedOn).await,
            "set_focus" => {
                let focus = input.get("focus").and_then(Value::as_str).map(str::to_string);
                let mut session = self.state.session.lock().await;
                session.current_focus = focus;
                session.touch();
                drop(session);
                self.state.save_session().await?;
                Ok(json!({ "set": true }))
            }
            "save_summary" => {
                let summary_text = input.get("summary_text").and_then(Value::as_str).unwrap_or("").to_string();
                let key_topics = input
                    .get("key_topics")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let pending_follow_ups = input
                    .get("pending_follow_ups")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();

                let mut session = self.state.session.lock().await;
                session.conversation_summary = Some(crate::persistence::session::ConversationSummary {
                    summary_text,
                    key_topics,
                    pending_follow_ups,
                });
                session.touch();
                drop(session);
                self.state.save_session().await?;
                Ok(json!({ "saved": true }))
            }
            "get_processed_items" => {
                let session = self.state.session.lock().await;
                Ok(json!({ "processed_items": session.processed_items }))
            }
            other => Err(anyhow::anyhow!("unknown action: {other}")),
        }
    }
}
