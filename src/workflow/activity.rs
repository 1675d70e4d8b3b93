//! The unit of work a workflow wraps

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::control::WorkflowControl;
use super::retry::ActivityError;
use crate::config::DEFAULT_STORE;
use crate::domain::RunResult;

/// Goal payload a workflow is started with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
    /// Generated when absent
    #[serde(default)]
    pub run_id: Option<String>,
    /// Agent profile name (`authentication`, `shopping`)
    pub agent: String,
    pub goal: String,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub step_budget: Option<u32>,
}

impl WorkflowPayload {
    pub fn new(agent: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            goal: goal.into(),
            ..Default::default()
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.step_budget = Some(budget);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn store_name(&self) -> &str {
        self.store.as_deref().unwrap_or(DEFAULT_STORE)
    }
}

/// One attempt at running a payload to a result.
///
/// The control doubles as the step gate, so pause and cancel reach the runner.
#[async_trait]
pub trait RunActivity: Send + Sync {
    async fn execute(
        &self,
        run_id: &str,
        payload: &WorkflowPayload,
        control: Arc<WorkflowControl>,
    ) -> Result<RunResult, ActivityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let payload: WorkflowPayload =
            serde_json::from_str(r#"{"agent": "authentication", "goal": "Log in"}"#).unwrap();
        assert!(payload.run_id.is_none());
        assert_eq!(payload.store_name(), "coop_se");
        assert!(payload.step_budget.is_none());
    }

    #[test]
    fn test_payload_builder() {
        let payload = WorkflowPayload::new("shopping", "Buy milk")
            .with_run_id("r1")
            .with_store("coop_se")
            .with_budget(20)
            .with_debug(true);
        assert_eq!(payload.run_id.as_deref(), Some("r1"));
        assert_eq!(payload.step_budget, Some(20));
        assert_eq!(payload.debug, Some(true));
    }
}
