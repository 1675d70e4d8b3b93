//! Tool registry - owns the tool table and dispatches calls

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    AcceptCookiesTool, CheckLoggedInTool, ClickRoleTool, ClickTextTool, ClickTool, CountTool, CurrentUrlTool,
    ExistsTextTool, ExistsTool, FillLabelTool, FillRoleTool, FinalizeTool, GetConfigTool, GetSecretTool, GotoTool,
    InvokeSubagentTool, ModalClickTextTool, ModalCloseTool, ModalExistsTool, ModalFillLabelTool, ModalPressKeyTool,
    PressKeyTool, PressTool, QueryTextTool, RequestInputTool, ScreenshotTool, Tool, ToolEnv, ToolError, TypeTool,
    WaitNetworkIdleTool, WaitTextTool,
};
use crate::domain::Observation;
use crate::llm::{ToolCall, ToolDefinition};

/// Name-to-tool dispatch table
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the full browser tool catalog
    pub fn standard() -> Self {
        let mut registry = Self::new();

        // Navigation
        registry.register(GotoTool);
        registry.register(WaitNetworkIdleTool);
        registry.register(CurrentUrlTool);

        // Queries
        registry.register(ExistsTool);
        registry.register(CountTool);
        registry.register(QueryTextTool);
        registry.register(ExistsTextTool);
        registry.register(WaitTextTool);
        registry.register(CheckLoggedInTool);

        // Interaction
        registry.register(ClickTool);
        registry.register(TypeTool);
        registry.register(PressTool);
        registry.register(PressKeyTool);
        registry.register(ClickTextTool);
        registry.register(ClickRoleTool);
        registry.register(FillLabelTool);
        registry.register(FillRoleTool);
        registry.register(AcceptCookiesTool);
        registry.register(ScreenshotTool);

        // Dialog-scoped
        registry.register(ModalExistsTool);
        registry.register(ModalClickTextTool);
        registry.register(ModalFillLabelTool);
        registry.register(ModalPressKeyTool);
        registry.register(ModalCloseTool);

        // Config and secrets
        registry.register(GetConfigTool);
        registry.register(GetSecretTool);

        // Control
        registry.register(RequestInputTool);
        registry.register(FinalizeTool);
        registry.register(InvokeSubagentTool);

        registry
    }

    /// Empty registry (for custom tool sets)
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    fn definition(tool: &dyn Tool) -> ToolDefinition {
        ToolDefinition::new(tool.name(), tool.description(), tool.input_schema())
    }

    /// All tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| Self::definition(t.as_ref())).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Definitions for the named tools, in the order given; unknown names are skipped
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| Self::definition(t.as_ref()))
            .collect()
    }

    pub fn waits_for_human(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.waits_for_human())
    }

    /// Execute a tool call. Never fails: every error becomes an `ok:false` observation.
    pub async fn dispatch(&self, call: &ToolCall, env: &ToolEnv) -> Observation {
        match self.execute(call, env).await {
            Ok(obs) => obs,
            Err(e) => {
                log::debug!("Tool {} failed: {}", call.name, e);
                Observation::failure(e.to_string())
            }
        }
    }

    async fn execute(&self, call: &ToolCall, env: &ToolEnv) -> Result<Observation, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        tool.execute(call.input.clone(), env).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
