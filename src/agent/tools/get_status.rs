// src/agent/tools/get_status.rs
// `get_status` — legacy bucketed summary of unread mentions, DMs, and
// thread replies (§4.5). Grounded on
// `original_source/slack_assistant/agent/tools/status_tool.py`, which wraps
// `StatusService` and returns summary counts plus per-priority item lists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use super::Tool;
use crate::agent::priority::get_status;
use crate::agent::state::AgentState;

pub struct GetStatusTool {
    state: Arc<AgentState>,
}

impl GetStatusTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for GetStatusTool {
    fn name(&self) -> &'static str {
        "get_status"
    }

    fn description(&self) -> &'static str {
        "Get a quick prioritized summary of unread mentions, DMs, and thread replies. \
         Legacy tool — prefer analyze_messages for anything beyond a quick count."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "since_hours": {
                    "type": "number",
                    "description": "How many hours back to look. Defaults to 24."
                },
                "include_processed": {
                    "type": "boolean",
                    "description": "Include items already marked reviewed/deferred/acted-on this session. Defaults to false."
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let since_hours = input.get("since_hours").and_then(Value::as_f64).unwrap_or(24.0);
        let include_processed = input
            .get("include_processed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let since = Some(Utc::now() - Duration::seconds((since_hours * 3600.0) as i64));

        let prefs = self.state.prefs.lock().await.clone();
        let session = self.state.session.lock().await.clone();

        let status = get_status(
            &self.state.store,
            &self.state.resolver,
            &self.state.user_id,
            since,
            &prefs,
            &session,
            include_processed,
        )
        .await?;

        Ok(serde_json::to_value(status)?)
    }
}
