//! Prompt Renderer - Render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{AgentError, Result};

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render empty
        handlebars.set_strict_mode(false);
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render a template string with any serializable context
    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| AgentError::Config(format!("Failed to render template: {}", e)))
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| AgentError::Config(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a previously registered template
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| AgentError::Config(format!("Failed to render template '{}': {}", name, e)))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_render_simple() {
        let renderer = PromptRenderer::new();
        let mut context = HashMap::new();
        context.insert("loginId", "anna@example.com");
        let result = renderer.render("Log in as {{loginId}}.", &context).unwrap();
        assert_eq!(result, "Log in as anna@example.com.");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let renderer = PromptRenderer::new();
        let result = renderer.render("Secret: {{secretRef}}", &json!({})).unwrap();
        assert_eq!(result, "Secret: ");
    }

    #[test]
    fn test_no_html_escape() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render("Click {{label}}", &json!({"label": "<Köp & betala>"}))
            .unwrap();
        assert_eq!(result, "Click <Köp & betala>");
    }

    #[test]
    fn test_named_templates() {
        let mut renderer = PromptRenderer::new();
        assert!(!renderer.has_template("auth"));
        renderer.register_template("auth", "Use {{secretRef}}").unwrap();
        assert!(renderer.has_template("auth"));
        let result = renderer.render_named("auth", &json!({"secretRef": "COOP_PASSWORD"})).unwrap();
        assert_eq!(result, "Use COOP_PASSWORD");
    }

    #[test]
    fn test_invalid_template() {
        let mut renderer = PromptRenderer::new();
        assert!(matches!(
            renderer.register_template("bad", "{{#if}}"),
            Err(AgentError::Config(_))
        ));
    }
}
