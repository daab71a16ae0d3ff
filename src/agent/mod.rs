// src/agent/mod.rs
// Bounded tool-calling conversation loop (§4.5). Grounded on
// `original_source/slack_assistant/agent/controller.py`'s
// `AgentController`: build the system prompt, send the conversation plus
// tool specs to the model, execute any tool calls the model requests, loop
// until it stops asking for tools or a hard iteration cap is hit. Unlike
// the original, which only registers five of the seven tools it has
// implementations for, every tool here is registered — treated as
// completing an omission rather than replicating it.

pub mod priority;
pub mod prompt;
pub mod state;
pub mod summarize;
pub mod tools;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::error::AgentError;
use crate::llm::{ConversationContent, ConversationMessage, LlmProvider, Role};

use state::AgentState;
use summarize::SummarizingConversationManager;
use tools::ToolRegistry;

const MAX_ITERATIONS: u32 = 10;
const MAX_RESPONSE_TOKENS: u32 = 4096;
const FALLBACK_APOLOGY: &str =
    "I wasn't able to finish working through that in time — could you ask again, maybe more narrowly?";

#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub tool_calls_made: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub struct Agent {
    llm: Arc<dyn LlmProvider>,
    state: Arc<AgentState>,
    tools: ToolRegistry,
    conversation: SummarizingConversationManager,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmProvider>, state: Arc<AgentState>, context_config: ContextConfig) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(tools::get_status::GetStatusTool::new(state.clone())));
        tools.register(Arc::new(tools::analyze_messages::AnalyzeMessagesTool::new(state.clone())));
        tools.register(Arc::new(tools::get_thread::GetThreadTool::new(state.clone())));
        tools.register(Arc::new(tools::search::SearchTool::new(state.clone())));
        tools.register(Arc::new(tools::find_context::FindContextTool::new(state.clone())));
        tools.register(Arc::new(tools::manage_preferences::ManagePreferencesTool::new(state.clone())));
        tools.register(Arc::new(tools::manage_session::ManageSessionTool::new(state.clone())));

        let conversation = SummarizingConversationManager::new(llm.clone(), context_config);

        Self {
            llm,
            state,
            tools,
            conversation,
        }
    }

    /// Clears the live conversation and sends the initial status prompt,
    /// mirroring `AgentController.initialize`.
    pub async fn initialize(&mut self) -> Result<AgentResponse, AgentError> {
        self.conversation.clear();
        self.process_message(prompt::INITIAL_STATUS_PROMPT).await
    }

    async fn build_system_prompt(&self) -> String {
        let session = self.state.session.lock().await;
        let prefs = self.state.prefs.lock().await;

        let session_context = prompt::format_session_context(
            session.current_focus.as_deref(),
            session.conversation_summary.as_ref().map(|s| s.summary_text.as_str()),
            session.age_hours(),
        );
        let emoji_patterns = prompt::format_emoji_patterns(&prefs.emoji_patterns);

        prompt::build_system_prompt(&session_context, &emoji_patterns, "", &prefs.rules_text(), &prefs.facts_text())
    }

    /// Runs the bounded tool-calling loop for one user turn.
    pub async fn process_message(&mut self, user_input: &str) -> Result<AgentResponse, AgentError> {
        self.conversation.push(ConversationMessage::user_text(user_input));

        let mut tool_calls_made = 0u32;
        let mut input_tokens = 0u32;
        let mut output_tokens = 0u32;
        let mut last_text = String::new();

        for iteration in 0..MAX_ITERATIONS {
            let system = self.build_system_prompt().await;
            let tool_specs = self.tools.tool_specs();
            let messages = self.conversation.build_messages();

            let response = self
                .llm
                .complete(&messages, &system, &tool_specs, MAX_RESPONSE_TOKENS)
                .await?;

            input_tokens += response.usage.input_tokens;
            output_tokens += response.usage.output_tokens;

            let mut assistant_content = Vec::new();
            if let Some(text) = &response.text {
                if !text.is_empty() {
                    assistant_content.push(ConversationContent::Text { text: text.clone() });
                    last_text = text.clone();
                }
            }
            for call in &response.tool_calls {
                assistant_content.push(ConversationContent::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                });
            }

            if !assistant_content.is_empty() {
                self.conversation.push(ConversationMessage {
                    role: Role::Assistant,
                    content: assistant_content,
                });
            }

            if !response.has_tool_calls() {
                self.conversation.maybe_summarize().await;
                return Ok(AgentResponse {
                    text: last_text,
                    tool_calls_made,
                    input_tokens,
                    output_tokens,
                });
            }

            let mut tool_results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                tool_calls_made += 1;
                debug!(iteration, tool = %call.name, "agent invoking tool");

                let (content, is_error) = match self.tools.execute(&call.name, call.input.clone()).await {
                    Ok(value) => (value.to_string(), false),
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "tool execution failed");
                        (format!("Error executing tool: {e}"), true)
                    }
                };

                tool_results.push(ConversationContent::ToolResult {
                    tool_use_id: call.id.clone(),
                    content,
                    is_error,
                });
            }

            self.conversation.push(ConversationMessage {
                role: Role::User,
                content: tool_results,
            });
        }

        self.conversation.maybe_summarize().await;
        let text = if last_text.is_empty() { FALLBACK_APOLOGY.to_string() } else { last_text };
        Ok(AgentResponse {
            text,
            tool_calls_made,
            input_tokens,
            output_tokens,
        })
    }
}
