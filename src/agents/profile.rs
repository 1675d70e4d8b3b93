//! Agent profiles: a prompt template plus the tools the agent may call

use serde_json::{Value, json};

use crate::config::GlobalConfig;
use crate::error::{AgentError, Result};
use crate::prompt::PromptLibrary;
use crate::tools::{INVOKE_SUBAGENT, ToolRegistry};

/// A named agent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: &'static str,
    /// Prompt template name
    pub prompt: &'static str,
    /// May delegate to other agents through `invoke_subagent`
    pub delegates: bool,
}

impl AgentProfile {
    pub const AUTHENTICATION: AgentProfile = AgentProfile {
        name: "authentication",
        prompt: "authentication",
        delegates: false,
    };

    pub const SHOPPING: AgentProfile = AgentProfile {
        name: "shopping",
        prompt: "shopping",
        delegates: true,
    };

    pub const ALL: &'static [AgentProfile] = &[Self::AUTHENTICATION, Self::SHOPPING];

    pub fn by_name(name: &str) -> Option<AgentProfile> {
        Self::ALL.iter().copied().find(|p| p.name == name)
    }

    pub fn require(name: &str) -> Result<AgentProfile> {
        Self::by_name(name).ok_or_else(|| AgentError::Config(format!("unknown agent: {}", name)))
    }

    /// Every registered tool, minus `invoke_subagent` for agents that do not delegate
    pub fn allowed_tools(&self, registry: &ToolRegistry) -> Vec<String> {
        registry
            .names()
            .into_iter()
            .filter(|name| self.delegates || name != INVOKE_SUBAGENT)
            .collect()
    }

    /// Template variables. Never carries secret values, only their names.
    pub fn prompt_context(&self, config: &GlobalConfig, store: &str) -> Value {
        let store_config = config.store(store);
        let login_id = store_config
            .and_then(|s| s.login_id_env.as_deref())
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default();
        let secret_ref = store_config
            .and_then(|s| s.password_secret.clone())
            .unwrap_or_default();
        json!({
            "agent": self.name,
            "store": store,
            "loginId": login_id,
            "secretRef": secret_ref,
        })
    }

    pub fn system_prompt(&self, prompts: &PromptLibrary, config: &GlobalConfig, store: &str) -> Result<String> {
        prompts.system_prompt(self.prompt, &self.prompt_context(config, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(AgentProfile::by_name("shopping"), Some(AgentProfile::SHOPPING));
        assert!(AgentProfile::by_name("checkout").is_none());
        assert!(matches!(AgentProfile::require("checkout"), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_authentication_cannot_delegate() {
        let registry = ToolRegistry::standard();
        let tools = AgentProfile::AUTHENTICATION.allowed_tools(&registry);
        assert!(!tools.iter().any(|t| t == INVOKE_SUBAGENT));
        assert!(tools.iter().any(|t| t == "finalize"));
        assert_eq!(tools.len(), registry.names().len() - 1);
    }

    #[test]
    fn test_shopping_may_delegate() {
        let tools = AgentProfile::SHOPPING.allowed_tools(&ToolRegistry::standard());
        assert!(tools.iter().any(|t| t == INVOKE_SUBAGENT));
    }

    #[test]
    fn test_prompt_context_has_no_secret_value() {
        let context = AgentProfile::AUTHENTICATION.prompt_context(&GlobalConfig::default(), "coop_se");
        assert_eq!(context["secretRef"], "COOP_PASSWORD");
        assert_eq!(context["store"], "coop_se");
    }

    #[test]
    fn test_system_prompt_renders() {
        let prompt = AgentProfile::SHOPPING
            .system_prompt(&PromptLibrary::builtin(), &GlobalConfig::default(), "coop_se")
            .unwrap();
        assert!(prompt.contains("stores.coop_se.default_postcode"));
    }
}
