//! Workflow states and control signals

use serde::{Deserialize, Serialize};

/// Lifecycle state of one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Cancelled | WorkflowState::Completed | WorkflowState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Running => "running",
            WorkflowState::Paused => "paused",
            WorkflowState::Cancelled => "cancelled",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }

    /// State after `signal`. Signals that do not apply leave the state unchanged.
    pub fn apply(self, signal: Signal) -> WorkflowState {
        match (self, signal) {
            (WorkflowState::Running, Signal::Pause) => WorkflowState::Paused,
            (WorkflowState::Paused, Signal::Resume) => WorkflowState::Running,
            (state, Signal::Cancel) if !state.is_terminal() => WorkflowState::Cancelled,
            (state, _) => state,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Pause,
    Resume,
    Cancel,
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Signal::Pause),
            "resume" => Ok(Signal::Resume),
            "cancel" => Ok(Signal::Cancel),
            other => Err(format!("unknown signal: {}", other)),
        }
    }
}
