//! Conversation workflow: one customer message in, one reply out.
//!
//! Each message goes through the conversation model. When it asks for an
//! agent, the task runs as a workflow on the shared [`WorkflowHost`], the
//! session context is updated from the result, and the model gets a
//! follow-up turn to report back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent::ConversationAgent;
use super::decision::{AgentDelegation, NextAction};
use super::state::{ConversationState, SessionContext};
use crate::agents::AgentProfile;
use crate::domain::RunResult;
use crate::error::Result;
use crate::id::generate_run_id;
use crate::llm::Message;
use crate::workflow::{WorkflowFailure, WorkflowHost, WorkflowPayload};

/// Extra attempts for a delegation whose workflow failed
pub const MAX_DELEGATION_RETRIES: u32 = 1;

/// Prefix of the follow-up turn after a delegated run
pub const AGENT_COMPLETED: &str = "[AGENT_COMPLETED]";

/// Answer to one customer message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationReply {
    pub message: String,
    pub session_context: SessionContext,
    pub next_action: NextAction,
}

/// How a delegated task ended
#[derive(Debug, Clone, PartialEq)]
pub enum Delegation {
    Finished(RunResult),
    Failed(WorkflowFailure),
}

impl Delegation {
    /// Status reported to the conversation model
    pub fn status(&self) -> String {
        match self {
            Delegation::Finished(result) => result
                .result
                .as_ref()
                .map(|s| s.status.clone())
                .unwrap_or_else(|| result.outcome.to_string()),
            Delegation::Failed(_) => "failed".to_string(),
        }
    }
}

pub struct ConversationWorkflow {
    id: String,
    agent: ConversationAgent,
    host: Arc<WorkflowHost>,
    store: Option<String>,
    state: ConversationState,
    runs: u32,
}

impl ConversationWorkflow {
    pub fn new(agent: ConversationAgent, host: Arc<WorkflowHost>) -> Self {
        Self {
            id: generate_run_id(),
            agent,
            host,
            store: None,
            state: ConversationState::default(),
            runs: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Store used when the task payload names none
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Continue a conversation from saved state
    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.state = state;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Handle one customer message
    pub async fn handle(&mut self, user_message: &str) -> Result<ConversationReply> {
        tracing::info!(conversation_id = %self.id, "Customer message received");
        self.state.remember(Message::user(user_message));

        let earlier = &self.state.history[..self.state.history.len() - 1];
        let decision = self
            .agent
            .decide(user_message, earlier, &self.state.session, self.state.clarification_count)
            .await?;

        if decision.asks_clarification() {
            self.state.clarification_count += 1;
        } else {
            self.state.clarification_count = 0;
        }

        if decision.needs_human_escalation {
            tracing::warn!(
                conversation_id = %self.id,
                clarifications = self.state.clarification_count,
                "Conversation needs a person"
            );
            return Ok(self.reply(decision.conversation_response, NextAction::HumanEscalationNeeded));
        }

        let message = if decision.delegates() {
            let agent = decision.agent_delegation.agent_type.clone().unwrap_or_default();
            let delegation = self.delegate(&agent, &decision.agent_delegation).await?;
            if let Delegation::Finished(result) = &delegation {
                self.state.session.absorb(&agent, result);
            }

            let follow_up = self
                .agent
                .decide(
                    &format!("{} {}", AGENT_COMPLETED, delegation.status()),
                    &self.state.history,
                    &self.state.session,
                    0,
                )
                .await?;
            follow_up.conversation_response
        } else {
            decision.conversation_response.clone()
        };

        Ok(self.reply(message, decision.next_action))
    }

    fn reply(&mut self, message: String, next_action: NextAction) -> ConversationReply {
        self.state.remember(Message::assistant(message.clone()));
        ConversationReply {
            message,
            session_context: self.state.session.clone(),
            next_action,
        }
    }

    /// Run the task as a workflow, retrying a failed workflow once
    async fn delegate(&mut self, agent: &str, delegation: &AgentDelegation) -> Result<Delegation> {
        let task = delegation.task_payload.as_ref();
        let goal = goal_for(agent, task);
        let store = task
            .and_then(|p| p.get("store"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.store.clone());

        loop {
            self.runs += 1;
            let run_id = format!("{}-{}-{}", self.id, agent, self.runs);
            let mut payload = WorkflowPayload::new(agent, goal.clone()).with_run_id(run_id.clone());
            if let Some(store) = &store {
                payload = payload.with_store(store.clone());
            }
            // The cart is read back from the shopping trace
            if agent == AgentProfile::SHOPPING.name {
                payload = payload.with_debug(true);
            }

            tracing::info!(conversation_id = %self.id, run_id = %run_id, agent = %agent, "Delegating to agent");
            self.host.start(payload)?;
            let outcome = self.host.result(&run_id).await?;
            self.host.forget(&run_id)?;

            let retries = self.state.agent_retries.entry(agent.to_string()).or_insert(0);
            match outcome {
                Ok(result) => {
                    *retries = 0;
                    return Ok(Delegation::Finished(result));
                }
                Err(failure) if *retries < MAX_DELEGATION_RETRIES => {
                    *retries += 1;
                    tracing::warn!(run_id = %run_id, agent = %agent, failure = %failure, "Delegated run failed, retrying");
                }
                Err(failure) => {
                    *retries = 0;
                    tracing::error!(run_id = %run_id, agent = %agent, failure = %failure, "Delegated run failed");
                    return Ok(Delegation::Failed(failure));
                }
            }
        }
    }
}

/// Goal text for an agent run from the model's task payload
fn goal_for(agent: &str, task: Option<&Value>) -> String {
    if let Some(goal) = task.and_then(|p| p.get("goal")).and_then(Value::as_str) {
        return goal.to_string();
    }
    let list = task.and_then(|p| p.get("shopping_list"));
    match (agent, list) {
        ("shopping", Some(Value::Array(items))) => {
            let items: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect();
            format!("Add these items to the cart: {}", items.join(", "))
        }
        ("shopping", Some(Value::String(text))) => format!("Add these items to the cart: {}", text),
        ("authentication", _) => "Log in to the store".to_string(),
        _ => format!("Complete this task: {}", task.cloned().unwrap_or(Value::Null)),
    }
}
