//! Run result types.
//!
//! A run always ends in a structured `RunResult`, even when it did not succeed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Observation;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The agent called `finalize`
    Finalized,
    /// The tool-call budget ran out before `finalize`
    BudgetExceeded,
    /// Too many consecutive turns without an executed tool
    Stalled,
    /// The workflow was cancelled at a step boundary
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Finalized => "finalized",
            RunOutcome::BudgetExceeded => "budget_exceeded",
            RunOutcome::Stalled => "stalled",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `finalize` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinalStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl FinalStatus {
    /// Read the status fields echoed back by a successful `finalize` observation
    pub fn from_observation(obs: &Observation) -> Self {
        let field = |key: &str| obs.str_field(key).map(str::to_string);
        Self {
            status: field("status").unwrap_or_default(),
            provider: field("provider"),
            error: field("error"),
            screenshot: field("screenshot").or_else(|| obs.screenshot.clone()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One executed or rejected tool call, kept when debug tracing is on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    pub step: u32,
    pub tool: String,
    pub args: Value,
    pub observation: Observation,
}

/// Terminal result of one decision-loop execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub run_id: String,
    /// True only when the run ended through `finalize`
    pub terminated: bool,
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<FinalStatus>,
    pub reason: String,
    /// Tool calls that actually executed
    pub steps_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
}

impl RunResult {
    pub fn finalized(run_id: &str, status: FinalStatus, steps_used: u32) -> Self {
        Self {
            run_id: run_id.to_string(),
            terminated: true,
            outcome: RunOutcome::Finalized,
            reason: format!("finalized with status {}", status.status),
            result: Some(status),
            steps_used,
            trace: None,
        }
    }

    pub fn budget_exceeded(run_id: &str, budget: u32) -> Self {
        Self::unfinished(
            run_id,
            RunOutcome::BudgetExceeded,
            format!("step budget of {} exhausted without finalize", budget),
            budget,
        )
    }

    pub fn stalled(run_id: &str, idle_steps: u32, steps_used: u32) -> Self {
        Self::unfinished(
            run_id,
            RunOutcome::Stalled,
            format!("no tool executed in {} consecutive steps", idle_steps),
            steps_used,
        )
    }

    pub fn cancelled(run_id: &str, steps_used: u32) -> Self {
        Self::unfinished(run_id, RunOutcome::Cancelled, "cancelled".to_string(), steps_used)
    }

    fn unfinished(run_id: &str, outcome: RunOutcome, reason: String, steps_used: u32) -> Self {
        Self {
            run_id: run_id.to_string(),
            terminated: false,
            outcome,
            result: None,
            reason,
            steps_used,
            trace: None,
        }
    }

    /// Re-label a result whose workflow was cancelled before it settled.
    ///
    /// The finalize payload, step count and trace are kept for inspection,
    /// but the run no longer counts as terminated.
    pub fn into_cancelled(self) -> Self {
        if self.outcome == RunOutcome::Cancelled {
            return self;
        }
        Self {
            terminated: false,
            outcome: RunOutcome::Cancelled,
            reason: format!("cancelled after run {}", self.outcome),
            ..self
        }
    }

    pub fn with_trace(mut self, trace: Option<Vec<TraceEntry>>) -> Self {
        self.trace = trace;
        self
    }

    /// Finalized with status `success`
    pub fn is_success(&self) -> bool {
        self.terminated && self.result.as_ref().is_some_and(FinalStatus::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(serde_json::to_string(&RunOutcome::BudgetExceeded).unwrap(), "\"budget_exceeded\"");
        assert_eq!(RunOutcome::Stalled.to_string(), "stalled");
    }

    #[test]
    fn test_final_status_from_observation() {
        let obs = Observation::ok_data(json!({"status": "success", "provider": "bankid"}));
        let status = FinalStatus::from_observation(&obs);
        assert_eq!(status.status, "success");
        assert_eq!(status.provider.as_deref(), Some("bankid"));
        assert!(status.error.is_none());
        assert!(status.is_success());
    }

    #[test]
    fn test_finalized_result() {
        let status = FinalStatus {
            status: "failed".to_string(),
            error: Some("captcha".to_string()),
            ..Default::default()
        };
        let result = RunResult::finalized("run-1", status, 4);
        assert!(result.terminated);
        assert_eq!(result.outcome, RunOutcome::Finalized);
        assert_eq!(result.steps_used, 4);
        assert!(!result.is_success());
    }

    #[test]
    fn test_budget_exceeded_result() {
        let result = RunResult::budget_exceeded("run-1", 12);
        assert!(!result.terminated);
        assert!(result.result.is_none());
        assert_eq!(result.steps_used, 12);
        assert!(result.reason.contains("12"));
    }

    #[test]
    fn test_into_cancelled_keeps_final_status() {
        let status = FinalStatus {
            status: "success".to_string(),
            ..Default::default()
        };
        let result = RunResult::finalized("run-1", status, 3).into_cancelled();
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(!result.terminated);
        assert!(!result.is_success());
        assert_eq!(result.result.as_ref().map(|s| s.status.as_str()), Some("success"));
        assert_eq!(result.steps_used, 3);
        assert_eq!(result.reason, "cancelled after run finalized");

        let already = RunResult::cancelled("run-1", 1);
        assert_eq!(already.clone().into_cancelled(), already);
    }

    #[test]
    fn test_trace_omitted_when_absent() {
        let value = serde_json::to_value(RunResult::cancelled("run-1", 2)).unwrap();
        assert!(value.get("trace").is_none());
        assert_eq!(value["outcome"], "cancelled");
    }
}
