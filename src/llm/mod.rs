// src/llm/mod.rs
// Provider-agnostic language model interface, tagged conversation content,
// and a factory selecting the wire format the configured model speaks
// (§4.5).

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::config::{LlmConfig, LlmProviderKind};

/// A tool call the model is requesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// One piece of a conversation message's content. A single turn may carry
/// plain text, a request to invoke a tool, or the result of one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationContent {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: Vec<ConversationContent>,
}

impl ConversationMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ConversationContent::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ConversationContent::Text { text: text.into() }],
        }
    }

    /// True if every content item is a bare tool result — these don't
    /// count toward the turn budget a summarization threshold tracks
    /// (§4.5).
    pub fn is_tool_result_only(&self) -> bool {
        !self.content.is_empty()
            && self
                .content
                .iter()
                .all(|c| matches!(c, ConversationContent::ToolResult { .. }))
    }
}

/// A tool definition in the JSON-schema shape every provider's function
/// calling API expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The model's reply: any text produced plus any tool calls it wants run.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: String,
    pub usage: TokenUsage,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Provider-agnostic language model interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(
        &self,
        messages: &[ConversationMessage],
        system: &str,
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> anyhow::Result<LlmResponse>;

    /// Produce a short, unstructured completion with no tool access —
    /// used for summarization (§4.5).
    async fn complete_text(&self, prompt: &str, max_tokens: u32) -> anyhow::Result<String> {
        let response = self
            .complete(&[ConversationMessage::user_text(prompt)], "", &[], max_tokens)
            .await?;
        Ok(response.text.unwrap_or_default())
    }
}

/// Builds the provider configured in [`LlmConfig`].
pub fn build_provider(config: &LlmConfig) -> std::sync::Arc<dyn LlmProvider> {
    match config.provider {
        LlmProviderKind::Anthropic => {
            std::sync::Arc::new(AnthropicProvider::new(config.api_key.clone(), config.model.clone(), config.host.clone()))
        }
        LlmProviderKind::OpenAi => {
            std::sync::Arc::new(OpenAiProvider::new(config.api_key.clone(), config.model.clone(), config.host.clone()))
        }
    }
}
