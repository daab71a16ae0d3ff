// src/agent/summarize.rs
// Keeps a conversation's token footprint bounded by periodically folding its
// oldest turns into a running summary, instead of ever truncating outright
// (§4.5). Turn counting, summarize/merge prompts, and the truncation
// fallback all follow the upstream assistant's progressive-summarization
// design; the struct shape (holding an `Arc<dyn LlmProvider>`, exposing
// async methods) follows the teacher's summarization strategies.

use std::sync::Arc;

use tracing::warn;

use crate::config::ContextConfig;
use crate::llm::{ConversationContent, ConversationMessage, LlmProvider, Role};

const FALLBACK_TRUNCATE_MESSAGES: usize = 20;
const SUMMARY_PREFIX: &str = "[Context Summary from earlier in conversation]";
const SUMMARY_SUFFIX: &str = "[End of summary]";

const SUMMARIZE_PROMPT_TEMPLATE: &str = r#"Summarize the following conversation excerpt in 200 words or fewer. \
Focus on what was discussed, what decisions or conclusions were reached, and \
any open follow-ups. Write it as plain prose, not a transcript.

{transcript}"#;

const MERGE_PROMPT_TEMPLATE: &str = r#"Merge this new summary with the prior summary of the same conversation. \
Prioritize recent information over old when they conflict. Keep it to 250 \
words or fewer.

Prior summary:
{prior}

New summary:
{new}"#;

/// Bounds a conversation's message list by summarizing old turns once the
/// turn count crosses a threshold, keeping a trailing window of recent
/// turns verbatim.
pub struct SummarizingConversationManager {
    llm: Arc<dyn LlmProvider>,
    config: ContextConfig,
    messages: Vec<ConversationMessage>,
    summary: Option<String>,
}

impl SummarizingConversationManager {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ContextConfig) -> Self {
        Self {
            llm,
            config,
            messages: Vec::new(),
            summary: None,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary = None;
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// The messages to actually send the model: the running summary (if
    /// any), prepended as a single user turn, followed by the live history.
    pub fn build_messages(&self) -> Vec<ConversationMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(summary) = &self.summary {
            out.push(ConversationMessage::user_text(format!(
                "{SUMMARY_PREFIX}\n{summary}\n{SUMMARY_SUFFIX}"
            )));
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    /// A message starts a new turn unless it's a user message made up
    /// entirely of tool results (those continue the turn that issued the
    /// tool calls).
    fn starts_turn(message: &ConversationMessage) -> bool {
        message.role == Role::User && !message.is_tool_result_only()
    }

    fn turn_start_indices(&self) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| Self::starts_turn(m))
            .map(|(i, _)| i)
            .collect()
    }

    fn turn_count(&self) -> usize {
        self.turn_start_indices().len()
    }

    /// Summarizes everything before the trailing `max_recent_turns` window
    /// if the turn count has crossed `summarize_threshold`. Falls back to a
    /// flat truncation to the last [`FALLBACK_TRUNCATE_MESSAGES`] messages
    /// if summarization itself fails, so a flaky model call never grows the
    /// conversation unbounded.
    pub async fn maybe_summarize(&mut self) {
        if self.turn_count() <= self.config.summarize_threshold {
            return;
        }

        let turn_starts = self.turn_start_indices();
        let keep_from = turn_starts[turn_starts.len() - self.config.max_recent_turns.min(turn_starts.len())];
        if keep_from == 0 {
            return;
        }

        let to_summarize = &self.messages[..keep_from];
        match self.summarize_range(to_summarize).await {
            Ok(new_summary) => {
                let merged = match &self.summary {
                    Some(prior) => self.merge_summaries(prior, &new_summary).await.unwrap_or(new_summary),
                    None => new_summary,
                };
                self.summary = Some(merged);
                self.messages.drain(..keep_from);
            }
            Err(e) => {
                warn!(error = %e, "summarization failed, falling back to truncation");
                if self.messages.len() > FALLBACK_TRUNCATE_MESSAGES {
                    let drop = self.messages.len() - FALLBACK_TRUNCATE_MESSAGES;
                    self.messages.drain(..drop);
                }
            }
        }
    }

    async fn summarize_range(&self, messages: &[ConversationMessage]) -> anyhow::Result<String> {
        let transcript = format_messages_for_summary(messages);
        let prompt = SUMMARIZE_PROMPT_TEMPLATE.replace("{transcript}", &transcript);
        self.llm.complete_text(&prompt, self.config.max_summary_tokens).await
    }

    async fn merge_summaries(&self, prior: &str, new: &str) -> anyhow::Result<String> {
        let prompt = MERGE_PROMPT_TEMPLATE.replace("{prior}", prior).replace("{new}", new);
        // Merge budget is 1.2x the summarize budget, the same ratio as the
        // original's hardcoded 500/600 split, scaled to the configured knob.
        let merge_budget = self.config.max_summary_tokens + self.config.max_summary_tokens / 5;
        self.llm.complete_text(&prompt, merge_budget).await
    }
}

/// Renders messages as `role (kind): text`, truncated per-line so a huge
/// tool result can't blow the summarization prompt's own budget.
fn format_messages_for_summary(messages: &[ConversationMessage]) -> String {
    let mut lines = Vec::with_capacity(messages.len());
    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        for content in &message.content {
            let (kind, text, limit) = match content {
                ConversationContent::Text { text } => ("text", text.as_str(), 500),
                ConversationContent::ToolUse { name, input, .. } => {
                    lines.push(format!("{role} (tool_use {name}): {}", truncate(&input.to_string(), 300)));
                    continue;
                }
                ConversationContent::ToolResult { content, .. } => ("tool_result", content.as_str(), 300),
            };
            lines.push(format!("{role} ({kind}): {}", truncate(text, limit)));
        }
    }
    lines.join("\n")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::{LlmResponse, TokenUsage, ToolSpec};

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn complete(
            &self,
            _messages: &[ConversationMessage],
            _system: &str,
            _tools: &[ToolSpec],
            _max_tokens: u32,
        ) -> anyhow::Result<LlmResponse> {
            Ok(LlmResponse {
                text: Some("stub".to_string()),
                tool_calls: vec![],
                stop_reason: "end_turn".to_string(),
                usage: TokenUsage::default(),
            })
        }

        async fn complete_text(&self, _prompt: &str, _max_tokens: u32) -> anyhow::Result<String> {
            Ok("a short summary".to_string())
        }
    }

    fn config() -> ContextConfig {
        ContextConfig {
            max_recent_turns: 2,
            summarize_threshold: 3,
            max_summary_tokens: 500,
        }
    }

    #[tokio::test]
    async fn does_not_summarize_below_threshold() {
        let mut mgr = SummarizingConversationManager::new(Arc::new(StubLlm), config());
        mgr.push(ConversationMessage::user_text("hi"));
        mgr.push(ConversationMessage::assistant_text("hello"));
        mgr.maybe_summarize().await;
        assert!(mgr.summary().is_none());
        assert_eq!(mgr.messages().len(), 2);
    }

    #[tokio::test]
    async fn summarizes_past_threshold_and_keeps_recent_window() {
        let mut mgr = SummarizingConversationManager::new(Arc::new(StubLlm), config());
        for i in 0..5 {
            mgr.push(ConversationMessage::user_text(format!("turn {i}")));
            mgr.push(ConversationMessage::assistant_text(format!("reply {i}")));
        }
        mgr.maybe_summarize().await;
        assert!(mgr.summary().is_some());
        // 2 recent turns kept, 2 messages each.
        assert_eq!(mgr.messages().len(), 4);
    }

    #[test]
    fn tool_result_only_message_does_not_start_a_turn() {
        let msg = ConversationMessage {
            role: Role::User,
            content: vec![ConversationContent::ToolResult {
                tool_use_id: "1".to_string(),
                content: "ok".to_string(),
                is_error: false,
            }],
        };
        assert!(!SummarizingConversationManager::starts_turn(&msg));
    }
}
