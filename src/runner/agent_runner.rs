//! Agent runner - the step loop behind every agent run.
//!
//! The AgentRunner drives one agent against one page until the agent calls
//! `finalize`, the tool-call budget runs out, the model stops proposing
//! actions, or the step gate cancels the run.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::gate::{GateDecision, StepGate};
use super::guardrails::{self, Redactor};
use super::transcript::{CONTEXT_AUTO_OBSERVE, KNOWN_RESOLUTION, Transcript};
use crate::browser::{describe_dialog, find_dialog, observe};
use crate::config::AgentsConfig;
use crate::domain::{AgentEvent, FinalStatus, Observation, RunResult, TraceEntry};
use crate::id::generate_call_id;
use crate::llm::{CompletionRequest, LlmClient, LlmError, ToolCall};
use crate::memory::{ExperienceStore, MODAL_KIND, ObstacleSignature, RecipeStep};
use crate::tools::{FINALIZE, GET_CONFIG, INVOKE_SUBAGENT, REQUEST_INPUT, ToolEnv, ToolError, ToolRegistry};

const ESCALATION_HINT: &str = "Progress is blocked. If the dialog or error cannot be resolved with the \
     available tools, call request_input(kind='modal_help') and describe what you see.";

/// Tools whose successful calls are never kept in a dialog recipe
const NON_RECIPE_TOOLS: &[&str] = &[FINALIZE, REQUEST_INPUT, INVOKE_SUBAGENT, "get_secret", "screenshot"];

/// Runner settings, usually derived from `AgentsConfig`.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Model override; the client default is used when unset
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Deadline for each tool call (human-input tools excepted)
    pub per_step_timeout: Duration,
    /// Tool-call budget when the request names none
    pub default_budget: u32,
    /// Consecutive turns without an executed tool before the run stalls
    pub max_idle_steps: u32,
    /// Keep a trace in the run result
    pub debug: bool,
}

impl From<&AgentsConfig> for RunnerConfig {
    fn from(config: &AgentsConfig) -> Self {
        Self {
            model: Some(config.model.clone()).filter(|m| !m.is_empty()),
            temperature: Some(config.temperature),
            per_step_timeout: config.per_step_timeout(),
            default_budget: config.max_total_steps,
            max_idle_steps: config.max_idle_steps.max(1),
            debug: config.debug,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&AgentsConfig::default())
    }
}

/// One agent run to execute.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Agent profile name (for logs)
    pub agent: String,
    pub system_prompt: String,
    /// First user message
    pub goal: String,
    pub allowed_tools: Vec<String>,
    pub step_budget: Option<u32>,
    /// Sub-agents never get `invoke_subagent`
    pub is_subagent: bool,
    /// Overrides `RunnerConfig::debug`
    pub debug: Option<bool>,
}

impl RunRequest {
    pub fn new(
        agent: impl Into<String>,
        system_prompt: impl Into<String>,
        goal: impl Into<String>,
        allowed_tools: Vec<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            system_prompt: system_prompt.into(),
            goal: goal.into(),
            allowed_tools,
            step_budget: None,
            is_subagent: false,
            debug: None,
        }
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.step_budget = Some(budget);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn as_subagent(mut self) -> Self {
        self.is_subagent = true;
        self
    }
}

/// A run that ended because the model could not be reached.
#[derive(Debug, thiserror::Error)]
#[error("model call failed after {tool_calls_executed} tool calls: {error}")]
pub struct RunFailure {
    #[source]
    pub error: LlmError,
    /// Side-effecting calls already made; zero means a retry is safe
    pub tool_calls_executed: u32,
}

/// Bookkeeping for one run
struct RunState {
    step: u32,
    spent: u32,
    idle: u32,
    consecutive_failures: u32,
    last_config_value: Option<String>,
    /// Dialog currently blocking the page
    obstacle: Option<ObstacleSignature>,
    /// Successful calls made while `obstacle` was present
    pending_recipe: Vec<RecipeStep>,
    /// Consecutive steps that started with the same dialog
    dialog_steps: u32,
    /// Signatures whose known resolution was already surfaced
    surfaced: HashSet<String>,
    escalated: bool,
    redactor: Redactor,
    trace: Option<Vec<TraceEntry>>,
}

impl RunState {
    fn new(debug: bool) -> Self {
        Self {
            step: 0,
            spent: 0,
            idle: 0,
            consecutive_failures: 0,
            last_config_value: None,
            obstacle: None,
            pending_recipe: Vec::new(),
            dialog_steps: 0,
            surfaced: HashSet::new(),
            escalated: false,
            redactor: Redactor::new(),
            trace: debug.then(Vec::new),
        }
    }
}

/// AgentRunner executes agent runs step by step.
///
/// Each step:
/// 1. Asks the step gate whether to continue (may suspend while paused)
/// 2. Checks the tool-call budget and the stall guard
/// 3. Inspects the page for a blocking dialog (known resolutions, recipes, hints)
/// 4. Calls the model with the transcript and the allowed tool definitions
/// 5. Executes the proposed calls in order, or auto-observes when there are none
/// 6. Ends the run on a successful `finalize`
pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    memory: Arc<ExperienceStore>,
    config: RunnerConfig,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, memory: Arc<ExperienceStore>) -> Self {
        Self::with_config(llm, registry, memory, RunnerConfig::default())
    }

    pub fn with_config(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        memory: Arc<ExperienceStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            memory,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the agent until it finalizes or a guard ends the run.
    pub async fn run(&self, request: &RunRequest, env: &ToolEnv, gate: &dyn StepGate) -> Result<RunResult, RunFailure> {
        let run_id = env.run_id.as_str();
        let budget = request.step_budget.unwrap_or(self.config.default_budget);
        let allowed = self.allowed_tools(request);
        let allowed_set: HashSet<String> = allowed.iter().cloned().collect();
        let tools = self.registry.definitions_for(&allowed);

        log::info!(
            "Starting run {} (agent={}, budget={}, tools={}{})",
            run_id,
            request.agent,
            budget,
            tools.len(),
            if request.is_subagent { ", subagent" } else { "" }
        );

        reset_session(env).await;

        let mut state = RunState::new(request.debug.unwrap_or(self.config.debug));
        let mut transcript = Transcript::new(&request.goal);

        loop {
            if gate.checkpoint(run_id).await == GateDecision::Cancel {
                log::info!("Run {} cancelled after {} tool calls", run_id, state.spent);
                return Ok(RunResult::cancelled(run_id, state.spent).with_trace(state.trace));
            }
            if state.spent >= budget {
                log::info!("Run {} exhausted its budget of {}", run_id, budget);
                return Ok(RunResult::budget_exceeded(run_id, budget).with_trace(state.trace));
            }
            if state.idle >= self.config.max_idle_steps {
                log::info!("Run {} stalled after {} idle steps", run_id, state.idle);
                return Ok(RunResult::stalled(run_id, state.idle, state.spent).with_trace(state.trace));
            }

            state.step += 1;
            self.inspect_page(env, &mut state, &mut transcript).await;

            let mut completion = CompletionRequest::new(request.system_prompt.clone()).with_tools(tools.clone());
            completion.messages = transcript.messages().to_vec();
            if let Some(model) = &self.config.model {
                completion = completion.with_model(model.clone());
            }
            if let Some(temperature) = self.config.temperature {
                completion = completion.with_temperature(temperature);
            }

            let response = self.llm.complete(completion).await.map_err(|error| {
                log::warn!("Run {}: model call failed at step {}: {}", run_id, state.step, error);
                RunFailure {
                    error,
                    tool_calls_executed: state.spent,
                }
            })?;

            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .enumerate()
                .map(|(index, call)| {
                    let mut call = call.clone();
                    if call.id.is_empty() {
                        call.id = generate_call_id(state.step, index);
                    }
                    call
                })
                .collect();

            log::debug!(
                "agent.decision {}",
                json!({
                    "run_id": run_id,
                    "step": state.step,
                    "content": response.content,
                    "tool_calls": calls
                        .iter()
                        .map(|c| json!({"name": c.name, "args": state.redactor.scrub(&c.input)}))
                        .collect::<Vec<_>>(),
                    "terminate": response.terminate,
                })
            );
            transcript.push_assistant(&response, &calls);

            if calls.is_empty() {
                if response.terminate {
                    log::debug!("Run {}: terminate without finalize ignored", run_id);
                }
                self.auto_observe(env, &mut transcript).await;
                state.idle += 1;
                continue;
            }

            let spent_before = state.spent;
            for call in calls {
                if state.spent >= budget {
                    transcript.push_tool_result(&call.id, &Observation::failure("step budget exhausted"));
                    continue;
                }
                if let Some(status) = self
                    .handle_call(call, &allowed_set, env, &mut state, &mut transcript)
                    .await
                {
                    log::info!(
                        "Run {} finalized with status {} after {} tool calls",
                        run_id,
                        status.status,
                        state.spent
                    );
                    return Ok(RunResult::finalized(run_id, status, state.spent).with_trace(state.trace));
                }
            }

            if state.spent > spent_before {
                state.idle = 0;
            } else {
                state.idle += 1;
            }
        }
    }

    /// Allowed tools that exist in the registry, minus `invoke_subagent` for sub-agents
    fn allowed_tools(&self, request: &RunRequest) -> Vec<String> {
        request
            .allowed_tools
            .iter()
            .filter(|name| !(request.is_subagent && name.as_str() == INVOKE_SUBAGENT))
            .filter(|name| self.registry.has_tool(name))
            .cloned()
            .collect()
    }

    /// Check, execute and record one tool call. Returns the final status on a successful `finalize`.
    async fn handle_call(
        &self,
        mut call: ToolCall,
        allowed: &HashSet<String>,
        env: &ToolEnv,
        state: &mut RunState,
        transcript: &mut Transcript,
    ) -> Option<FinalStatus> {
        let obs = match guardrails::check(&call, allowed) {
            Err(e) => {
                log::warn!("Run {}: rejected {}: {}", env.run_id, call.name, e);
                Observation::failure(e.to_string())
            }
            Ok(()) => {
                if guardrails::substitute_fill_value(&mut call, state.last_config_value.as_deref()) {
                    log::debug!("Run {}: filled empty value of {} from get_config", env.run_id, call.name);
                }
                log::debug!(
                    "tool.exec {}",
                    json!({
                        "run_id": env.run_id,
                        "step": state.step,
                        "tool": call.name,
                        "args": state.redactor.scrub(&call.input),
                    })
                );
                state.spent += 1;
                self.dispatch(&call, env).await
            }
        };

        state.redactor.learn(&call.name, &obs);
        let shown_args = state.redactor.scrub(&call.input);
        let shown_obs = state.redactor.scrub_observation(&obs);

        log::debug!(
            "tool.result {}",
            json!({
                "run_id": env.run_id,
                "step": state.step,
                "tool": call.name,
                "result": shown_obs,
            })
        );
        env.events
            .publish(AgentEvent::tool_result(&env.run_id, &call.name, &shown_args, &shown_obs));
        if let Some(trace) = state.trace.as_mut() {
            trace.push(TraceEntry {
                step: state.step,
                tool: call.name.clone(),
                args: shown_args.clone(),
                observation: shown_obs,
            });
        }
        transcript.push_tool_result(&call.id, &obs);

        if !obs.ok {
            state.consecutive_failures += 1;
            return None;
        }
        state.consecutive_failures = 0;

        if call.name == GET_CONFIG {
            state.last_config_value = config_value(&obs);
        }
        if state.obstacle.is_some() && !NON_RECIPE_TOOLS.contains(&call.name.as_str()) {
            state.pending_recipe.push(RecipeStep::new(call.name.clone(), shown_args));
        }
        (call.name == FINALIZE).then(|| FinalStatus::from_observation(&obs))
    }

    /// Run the tool under the per-step timeout unless it waits for a human
    async fn dispatch(&self, call: &ToolCall, env: &ToolEnv) -> Observation {
        if self.registry.waits_for_human(&call.name) {
            return self.registry.dispatch(call, env).await;
        }
        let after = self.config.per_step_timeout;
        match tokio::time::timeout(after, self.registry.dispatch(call, env)).await {
            Ok(obs) => obs,
            Err(_) => {
                let err = ToolError::Timeout {
                    tool: call.name.clone(),
                    after,
                    detail: guardrails::primary_arg(&call.input),
                };
                log::warn!("Run {}: {}", env.run_id, err);
                Observation::failure(err.to_string())
            }
        }
    }

    /// Per-step dialog handling: surface known resolutions, record recipes, escalate.
    async fn inspect_page(&self, env: &ToolEnv, state: &mut RunState, transcript: &mut Transcript) {
        let page = env.page.as_ref();

        match find_dialog(page).await {
            Some(dialog) => {
                let (title, text) = describe_dialog(page, &dialog).await;
                let signature = ObstacleSignature::from_dialog(&page.url(), title.as_deref(), text.as_deref());
                let key = signature.key();

                if state.obstacle.as_ref().is_some_and(|s| s.key() == key) {
                    state.dialog_steps += 1;
                } else {
                    if !state.pending_recipe.is_empty() {
                        log::debug!("Run {}: dialog changed, dropping pending recipe", env.run_id);
                    }
                    state.pending_recipe.clear();
                    state.dialog_steps = 1;
                }

                if !state.surfaced.contains(&key) {
                    if let Some(recipe) = self.memory.retrieve(MODAL_KIND, &signature) {
                        log::info!("Run {}: known resolution for dialog {}", env.run_id, key);
                        transcript.push_context(KNOWN_RESOLUTION, &json!({"signature": signature, "recipe": recipe}));
                        state.surfaced.insert(key);
                    }
                }
                state.obstacle = Some(signature);
            }
            None => {
                if let Some(signature) = state.obstacle.take() {
                    let recipe = mem::take(&mut state.pending_recipe);
                    if !recipe.is_empty() {
                        log::info!(
                            "Run {}: dialog resolved in {} steps, recording recipe",
                            env.run_id,
                            recipe.len()
                        );
                        self.memory.record(MODAL_KIND, &signature, recipe);
                    }
                }
                state.dialog_steps = 0;
            }
        }

        let stuck = state.dialog_steps >= 2 || state.consecutive_failures >= 2;
        if stuck && !state.escalated {
            transcript.push_hint(ESCALATION_HINT);
        }
        state.escalated = stuck;
    }

    async fn auto_observe(&self, env: &ToolEnv, transcript: &mut Transcript) {
        let snapshot = observe(env.page.as_ref()).await;
        let data = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
        env.events.publish(AgentEvent::auto_observe(&env.run_id, data.clone()));
        transcript.push_context(CONTEXT_AUTO_OBSERVE, &data);
    }
}

/// Clear cookies and web storage before a run. Failures are logged only.
async fn reset_session(env: &ToolEnv) {
    if let Err(e) = env.page.clear_cookies().await {
        log::warn!("Run {}: failed to clear cookies: {}", env.run_id, e);
    }
    if let Err(e) = env.page.clear_storage().await {
        log::warn!("Run {}: failed to clear storage: {}", env.run_id, e);
    }
}

/// `value` of a `get_config` observation as text
fn config_value(obs: &Observation) -> Option<String> {
    match obs.data.get("value")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
