// src/agent/tools/mod.rs
// Tool trait + registry the conversation loop dispatches function calls
// through (§4.5). Shape (name/description/input_schema/execute,
// register/get/get_all/execute) follows the upstream's
// `BaseTool`/`ToolRegistry`.

pub mod analyze_messages;
pub mod find_context;
pub mod get_status;
pub mod get_thread;
pub mod manage_preferences;
pub mod manage_session;
pub mod search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::AgentError;
use crate::llm::ToolSpec;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> anyhow::Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn get_all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// Tool definitions in the shape every LLM provider's function-calling
    /// API expects.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, input: Value) -> anyhow::Result<Value> {
        let tool = self.get(name).ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "executing tool");
        tool.execute(input).await
    }
}
