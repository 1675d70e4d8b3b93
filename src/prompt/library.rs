//! Built-in agent prompts with optional on-disk overrides

use serde::Serialize;

use super::{PromptLoader, PromptRenderer};
use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};

/// Shared operating rules prepended to every agent prompt
pub const GLOBAL_PROMPT: &str = "global";

const BUILTIN: &[(&str, &str)] = &[
    ("global", include_str!("../../prompts/global.md")),
    ("authentication", include_str!("../../prompts/authentication.md")),
    ("shopping", include_str!("../../prompts/shopping.md")),
    ("conversation", include_str!("../../prompts/conversation.md")),
];

/// Resolves prompt templates by name and renders system prompts.
///
/// A `<name>.md` file in the override directory wins over the built-in text.
pub struct PromptLibrary {
    overrides: Option<PromptLoader>,
    renderer: PromptRenderer,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        Self {
            overrides: None,
            renderer: PromptRenderer::new(),
        }
    }

    pub fn with_overrides(loader: PromptLoader) -> Self {
        Self {
            overrides: Some(loader),
            renderer: PromptRenderer::new(),
        }
    }

    /// Built-in prompts, overridden from `agents.prompts_dir` when it is set
    pub fn from_config(agents: &AgentsConfig) -> Self {
        match &agents.prompts_dir {
            Some(dir) => {
                log::info!("Prompt overrides from {}", dir.display());
                Self::with_overrides(PromptLoader::new(dir))
            }
            None => Self::builtin(),
        }
    }

    /// Raw template text for `name`
    pub fn template(&self, name: &str) -> Result<String> {
        if let Some(loader) = &self.overrides
            && loader.exists(name)
        {
            log::debug!("Using prompt override {:?} for {}", loader.templates_dir(), name);
            return loader.load(name);
        }
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| AgentError::Config(format!("No prompt template named '{}'", name)))
    }

    /// Global rules followed by the agent's rendered template
    pub fn system_prompt<T: Serialize>(&self, agent: &str, context: &T) -> Result<String> {
        let global = self.template(GLOBAL_PROMPT)?;
        let agent_prompt = self.renderer.render(&self.template(agent)?, context)?;
        Ok(format!("{}\n\n{}", global.trim(), agent_prompt.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_authentication_prompt() {
        let library = PromptLibrary::builtin();
        let prompt = library
            .system_prompt(
                "authentication",
                &json!({"loginId": "anna@example.com", "secretRef": "COOP_PASSWORD"}),
            )
            .unwrap();
        assert!(prompt.starts_with("# Operating rules"));
        assert!(prompt.contains("anna@example.com"));
        assert!(prompt.contains("`COOP_PASSWORD`"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_unknown_prompt() {
        let library = PromptLibrary::builtin();
        assert!(matches!(library.template("checkout"), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_from_config_reads_prompts_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("authentication.md"), "Log in as {{loginId}}").unwrap();

        let mut agents = AgentsConfig::default();
        let builtin = PromptLibrary::from_config(&agents);
        assert!(!builtin.template("authentication").unwrap().starts_with("Log in as"));

        agents.prompts_dir = Some(dir.path().to_path_buf());
        let library = PromptLibrary::from_config(&agents);
        let prompt = library
            .system_prompt("authentication", &json!({"loginId": "anna@example.com"}))
            .unwrap();
        assert!(prompt.ends_with("Log in as anna@example.com"));
    }

    #[test]
    fn test_override_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shopping.md"), "Only buy {{item}}").unwrap();
        let library = PromptLibrary::with_overrides(PromptLoader::new(dir.path()));

        let prompt = library.system_prompt("shopping", &json!({"item": "mjölk"})).unwrap();
        assert!(prompt.ends_with("Only buy mjölk"));
        // No override for global, built-in used
        assert!(prompt.starts_with("# Operating rules"));
    }
}
