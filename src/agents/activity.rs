//! The run activity: open an environment, run an agent profile on it

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::AgentProfile;
use crate::browser::EnvironmentFactory;
use crate::config::GlobalConfig;
use crate::domain::RunResult;
use crate::error::{AgentError, Result};
use crate::events::EventPublisher;
use crate::hitl::HumanIoBroker;
use crate::prompt::PromptLibrary;
use crate::runner::{AgentRunner, RunFailure, RunRequest, StepGate};
use crate::tools::{SubAgentInvoker, ToolEnv};
use crate::workflow::{ActivityError, RunActivity, WorkflowControl, WorkflowPayload};

/// Runs one agent profile per workflow attempt.
pub struct AgentActivity {
    runner: Arc<AgentRunner>,
    prompts: Arc<PromptLibrary>,
    factory: Arc<dyn EnvironmentFactory>,
    config: Arc<GlobalConfig>,
    broker: Arc<HumanIoBroker>,
    events: Arc<dyn EventPublisher>,
    artifacts_dir: PathBuf,
}

impl AgentActivity {
    pub fn new(
        runner: Arc<AgentRunner>,
        prompts: Arc<PromptLibrary>,
        factory: Arc<dyn EnvironmentFactory>,
        config: Arc<GlobalConfig>,
        broker: Arc<HumanIoBroker>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            runner,
            prompts,
            factory,
            config,
            broker,
            events,
            artifacts_dir: PathBuf::from("logs"),
        }
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }
}

#[async_trait]
impl RunActivity for AgentActivity {
    async fn execute(
        &self,
        run_id: &str,
        payload: &WorkflowPayload,
        control: Arc<WorkflowControl>,
    ) -> std::result::Result<RunResult, ActivityError> {
        let profile = AgentProfile::require(&payload.agent).map_err(|e| ActivityError::Permanent(e.to_string()))?;
        let store_name = payload.store_name();
        let store = self
            .config
            .store(store_name)
            .ok_or_else(|| ActivityError::Permanent(format!("unknown store: {}", store_name)))?;
        let system_prompt = profile
            .system_prompt(&self.prompts, &self.config, store_name)
            .map_err(|e| ActivityError::Permanent(e.to_string()))?;

        let page = self
            .factory
            .open(store)
            .await
            .map_err(|e| ActivityError::Retryable(format!("environment setup failed: {}", e)))?;

        let env = ToolEnv::new(
            page,
            store_name,
            run_id,
            self.config.clone(),
            self.broker.clone(),
            self.events.clone(),
        )
        .with_artifacts_dir(self.artifacts_dir.clone());

        let subagents = SubAgents {
            runner: self.runner.clone(),
            prompts: self.prompts.clone(),
            env: env.clone(),
            gate: control.clone(),
            debug: payload.debug,
        };
        let env = env.with_subagents(Arc::new(subagents));

        let mut request = RunRequest::new(
            profile.name,
            system_prompt,
            payload.goal.clone(),
            profile.allowed_tools(self.runner.registry()),
        );
        request.step_budget = payload.step_budget;
        request.debug = payload.debug;

        self.runner
            .run(&request, &env, control.as_ref())
            .await
            .map_err(classify)
    }
}

/// Model failures before any tool ran are safe to retry
fn classify(failure: RunFailure) -> ActivityError {
    if failure.tool_calls_executed == 0 {
        ActivityError::Retryable(failure.to_string())
    } else {
        ActivityError::Permanent(failure.to_string())
    }
}

/// Runs sub-agents inline on the parent's page, run id and step gate
struct SubAgents {
    runner: Arc<AgentRunner>,
    prompts: Arc<PromptLibrary>,
    /// Parent environment without an invoker, so sub-agents cannot nest
    env: ToolEnv,
    gate: Arc<WorkflowControl>,
    debug: Option<bool>,
}

#[async_trait]
impl SubAgentInvoker for SubAgents {
    async fn invoke(&self, name: &str, goal: &str) -> Result<RunResult> {
        let profile = AgentProfile::require(name)?;
        let system_prompt = profile.system_prompt(&self.prompts, &self.env.config, &self.env.store)?;
        let mut request = RunRequest::new(
            profile.name,
            system_prompt,
            goal,
            profile.allowed_tools(self.runner.registry()),
        )
        .as_subagent();
        request.debug = self.debug;

        log::info!("Run {}: invoking sub-agent {}", self.env.run_id, name);
        let gate: &dyn StepGate = self.gate.as_ref();
        self.runner
            .run(&request, &self.env, gate)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))
    }
}
