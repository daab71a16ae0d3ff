// src/llm/anthropic.rs
// Anthropic Messages API wire format (§4.5), grounded on
// `original_source/slack_assistant/agent/llm/anthropic.py`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{ConversationContent, ConversationMessage, LlmProvider, LlmResponse, Role, TokenUsage, ToolCall, ToolSpec};

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    fn to_wire_message(msg: &ConversationMessage) -> Value {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content: Vec<Value> = msg
            .content
            .iter()
            .map(|c| match c {
                ConversationContent::Text { text } => json!({"type": "text", "text": text}),
                ConversationContent::ToolUse { id, name, input } => {
                    json!({"type": "tool_use", "id": id, "name": name, "input": input})
                }
                ConversationContent::ToolResult { tool_use_id, content, is_error } => {
                    json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": content, "is_error": is_error})
                }
            })
            .collect();
        json!({"role": role, "content": content})
    }

    fn parse_response(body: &Value) -> anyhow::Result<LlmResponse> {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in body["content"].as_array().cloned().unwrap_or_default() {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        text_parts.push(text.to_string());
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(LlmResponse {
            text: if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) },
            tool_calls,
            stop_reason: body["stop_reason"].as_str().unwrap_or("end_turn").to_string(),
            usage: TokenUsage {
                input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(
        &self,
        messages: &[ConversationMessage],
        system: &str,
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> anyhow::Result<LlmResponse> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": messages.iter().map(Self::to_wire_message).collect::<Vec<_>>(),
        });

        if !system.is_empty() {
            body["system"] = json!(system);
        }

        if !tools.is_empty() {
            body["tools"] = json!(
                tools
                    .iter()
                    .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.input_schema}))
                    .collect::<Vec<_>>()
            );
        }

        debug!(messages = messages.len(), "sending request to anthropic");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Self::parse_response(&response)
    }
}
