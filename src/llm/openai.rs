// src/llm/openai.rs
// OpenAI chat-completions wire format (§4.5), grounded on
// `original_source/slack_assistant/agent/llm/openai.py`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{ConversationContent, ConversationMessage, LlmProvider, LlmResponse, Role, TokenUsage, ToolCall, ToolSpec};

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    /// A single conversation message can expand into more than one wire
    /// message: an assistant turn with both text and tool calls becomes one
    /// assistant message, but a `tool_result` block always becomes its own
    /// separate `tool` message.
    fn to_wire_messages(msg: &ConversationMessage) -> Vec<Value> {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let mut out = Vec::new();
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in &msg.content {
            match block {
                ConversationContent::Text { text } => text_parts.push(text.clone()),
                ConversationContent::ToolUse { id, name, input } => {
                    tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()},
                    }));
                }
                ConversationContent::ToolResult { tool_use_id, content, is_error } => {
                    let content = if *is_error { format!("Error: {content}") } else { content.clone() };
                    out.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content}));
                }
            }
        }

        if !tool_calls.is_empty() {
            out.push(json!({
                "role": "assistant",
                "content": if text_parts.is_empty() { Value::Null } else { json!(text_parts.join("\n")) },
                "tool_calls": tool_calls,
            }));
        } else if !text_parts.is_empty() {
            out.push(json!({"role": role, "content": text_parts.join("\n")}));
        }

        out
    }

    fn parse_response(body: &Value) -> anyhow::Result<LlmResponse> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| anyhow::anyhow!("openai response had no choices"))?;
        let message = &choice["message"];

        let text = message["content"].as_str().map(|s| s.to_string());

        let mut tool_calls = Vec::new();
        for tc in message["tool_calls"].as_array().cloned().unwrap_or_default() {
            let arguments = tc["function"]["arguments"].as_str().unwrap_or("{}");
            tool_calls.push(ToolCall {
                id: tc["id"].as_str().unwrap_or_default().to_string(),
                name: tc["function"]["name"].as_str().unwrap_or_default().to_string(),
                input: serde_json::from_str(arguments).unwrap_or(Value::Null),
            });
        }

        Ok(LlmResponse {
            text,
            tool_calls,
            stop_reason: choice["finish_reason"].as_str().unwrap_or("stop").to_string(),
            usage: TokenUsage {
                input_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[ConversationMessage],
        system: &str,
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> anyhow::Result<LlmResponse> {
        let mut wire_messages = Vec::new();
        if !system.is_empty() {
            wire_messages.push(json!({"role": "system", "content": system}));
        }
        for msg in messages {
            wire_messages.extend(Self::to_wire_messages(msg));
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": wire_messages,
        });

        if !tools.is_empty() {
            body["tools"] = json!(
                tools
                    .iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": {"name": t.name, "description": t.description, "parameters": t.input_schema},
                    }))
                    .collect::<Vec<_>>()
            );
            body["tool_choice"] = json!("auto");
        }

        debug!(messages = wire_messages.len(), "sending request to openai");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Self::parse_response(&response)
    }
}
