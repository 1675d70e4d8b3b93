//! Step-level events broadcast to passive consumers (UI, logs).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Observation;
use crate::hitl::InputKind;
use crate::workflow::WorkflowState;

/// Event type constants
pub mod event_types {
    pub const TOOL_RESULT: &str = "tool_result";
    pub const AUTO_OBSERVE: &str = "auto_observe";
    pub const AWAITING_HUMAN: &str = "awaiting_human";
    pub const HUMAN_INPUT: &str = "human_input";
    pub const WORKFLOW_STATE: &str = "workflow_state";
}

/// An event emitted while a run progresses.
///
/// Human-input values are never carried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolResult {
        run_id: String,
        tool: String,
        args: Value,
        result: Observation,
    },
    AutoObserve {
        run_id: String,
        data: Value,
    },
    AwaitingHuman {
        run_id: String,
        kind: InputKind,
        prompt: String,
    },
    HumanInput {
        run_id: String,
        kind: InputKind,
    },
    WorkflowState {
        run_id: String,
        from: WorkflowState,
        to: WorkflowState,
    },
}

impl AgentEvent {
    /// Create a tool_result event
    pub fn tool_result(run_id: &str, tool: &str, args: &Value, result: &Observation) -> Self {
        AgentEvent::ToolResult {
            run_id: run_id.to_string(),
            tool: tool.to_string(),
            args: args.clone(),
            result: result.clone(),
        }
    }

    /// Create an auto_observe event
    pub fn auto_observe(run_id: &str, data: Value) -> Self {
        AgentEvent::AutoObserve {
            run_id: run_id.to_string(),
            data,
        }
    }

    /// Create an awaiting_human event
    pub fn awaiting_human(run_id: &str, kind: InputKind, prompt: &str) -> Self {
        AgentEvent::AwaitingHuman {
            run_id: run_id.to_string(),
            kind,
            prompt: prompt.to_string(),
        }
    }

    /// Create a human_input event
    pub fn human_input(run_id: &str, kind: InputKind) -> Self {
        AgentEvent::HumanInput {
            run_id: run_id.to_string(),
            kind,
        }
    }

    /// Create a workflow_state event
    pub fn workflow_state(run_id: &str, from: WorkflowState, to: WorkflowState) -> Self {
        AgentEvent::WorkflowState {
            run_id: run_id.to_string(),
            from,
            to,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::ToolResult { .. } => event_types::TOOL_RESULT,
            AgentEvent::AutoObserve { .. } => event_types::AUTO_OBSERVE,
            AgentEvent::AwaitingHuman { .. } => event_types::AWAITING_HUMAN,
            AgentEvent::HumanInput { .. } => event_types::HUMAN_INPUT,
            AgentEvent::WorkflowState { .. } => event_types::WORKFLOW_STATE,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            AgentEvent::ToolResult { run_id, .. }
            | AgentEvent::AutoObserve { run_id, .. }
            | AgentEvent::AwaitingHuman { run_id, .. }
            | AgentEvent::HumanInput { run_id, .. }
            | AgentEvent::WorkflowState { run_id, .. } => run_id,
        }
    }
}
