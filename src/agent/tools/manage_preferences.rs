// src/agent/tools/manage_preferences.rs
// `manage_preferences` — read or edit custom prioritization rules,
// remembered facts, and emoji acknowledgment patterns (§4.5, §4.6).
// Grounded on `original_source/slack_assistant/agent/tools/prefs_tool.py`
// for the get_all/add_rule/remove_rule/add_fact/remove_fact actions. That
// file has no emoji-pattern actions even though `EmojiPattern` exists in
// the preference model and the spec calls for add_emoji_pattern/
// remove_emoji_pattern; those two actions are added fresh here, backed by
// `PreferenceSet::upsert_emoji_pattern`/`remove_emoji_pattern` (normalizing
// the emoji name and clamping `priority_adjustment` to [-2, 2]).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::persistence::preferences::{UserFact, UserRule};

pub struct ManagePreferencesTool {
    state: Arc<AgentState>,
}

impl ManagePreferencesTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for ManagePreferencesTool {
    fn name(&self) -> &'static str {
        "manage_preferences"
    }

    fn description(&self) -> &'static str {
        "Read or edit the user's custom prioritization rules, remembered facts, and emoji \
         acknowledgment patterns. Actions: get_all, add_rule, remove_rule, add_fact, \
         remove_fact, add_emoji_pattern, remove_emoji_pattern."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["get_all", "add_rule", "remove_rule", "add_fact", "remove_fact", "add_emoji_pattern", "remove_emoji_pattern"]
                },
                "description": {"type": "string", "description": "Rule description, for add_rule."},
                "content": {"type": "string", "description": "Fact content, for add_fact."},
                "id": {"type": "string", "description": "Rule or fact id, for remove_rule/remove_fact."},
                "emoji": {"type": "string", "description": "Emoji name (with or without colons), for add/remove_emoji_pattern."},
                "meaning": {"type": "string", "description": "What this emoji means, for add_emoji_pattern."},
                "marks_as_handled": {"type": "boolean", "description": "Whether this emoji counts as acknowledgment, for add_emoji_pattern."},
                "priority_adjustment": {"type": "integer", "description": "Priority delta in [-2, 2], for add_emoji_pattern."}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let action = input
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("action is required"))?;

        let mut prefs = self.state.prefs.lock().await;

        let result = match action {
            "get_all" => json!({
                "rules": prefs.rules,
                "facts": prefs.facts,
                "emoji_patterns": prefs.emoji_patterns,
            }),
            "add_rule" => {
                let description = input
                    .get("description")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("description is required"))?;
                let rule = UserRule::new(description.to_string());
                let id = rule.id.clone();
                prefs.rules.push(rule);
                json!({ "id": id, "added": true })
            }
            "remove_rule" => {
                let id = input.get("id").and_then(Value::as_str).ok_or_else(|| anyhow::anyhow!("id is required"))?;
                let before = prefs.rules.len();
                prefs.rules.retain(|r| r.id != id);
                json!({ "removed": prefs.rules.len() < before })
            }
            "add_fact" => {
                let content = input
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("content is required"))?;
                let fact = UserFact::new(content.to_string());
                let id = fact.id.clone();
                prefs.facts.push(fact);
                json!({ "id": id, "added": true })
            }
            "remove_fact" => {
                let id = input.get("id").and_then(Value::as_str).ok_or_else(|| anyhow::anyhow!("id is required"))?;
                let before = prefs.facts.len();
                prefs.facts.retain(|f| f.id != id);
                json!({ "removed": prefs.facts.len() < before })
            }
            "add_emoji_pattern" => {
                let emoji = input
                    .get("emoji")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("emoji is required"))?;
                let meaning = input.get("meaning").and_then(Value::as_str).unwrap_or("").to_string();
                let marks_as_handled = input.get("marks_as_handled").and_then(Value::as_bool).unwrap_or(false);
                let priority_adjustment =
                    input.get("priority_adjustment").and_then(Value::as_i64).unwrap_or(0) as i32;
                prefs.upsert_emoji_pattern(emoji, meaning, marks_as_handled, priority_adjustment);
                json!({ "added": true })
            }
            "remove_emoji_pattern" => {
                let emoji = input
                    .get("emoji")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("emoji is required"))?;
                json!({ "removed": prefs.remove_emoji_pattern(emoji) })
            }
            other => return Err(anyhow::anyhow!("unknown action: {other}")),
        };

        if action != "get_all" {
            self.state.pref_storage.save(&prefs)?;
        }

        Ok(result)
    }
}
