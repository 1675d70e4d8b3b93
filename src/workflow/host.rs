//! In-process workflow host.
//!
//! WorkflowHost starts each workflow as a tokio task, keeps its control
//! handle for signals, and exposes the outcome once the task settles.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use super::activity::{RunActivity, WorkflowPayload};
use super::control::WorkflowControl;
use super::retry::{RetryPolicy, WorkflowFailure};
use super::state::{Signal, WorkflowState};
use crate::domain::{RunOutcome, RunResult};
use crate::error::{AgentError, Result};
use crate::events::EventPublisher;
use crate::hitl::{HumanIoBroker, InputKind};
use crate::id::generate_run_id;

/// Settled result of a workflow
pub type WorkflowOutcome = std::result::Result<RunResult, WorkflowFailure>;

struct WorkflowHandle {
    control: Arc<WorkflowControl>,
    outcome: watch::Receiver<Option<WorkflowOutcome>>,
}

/// Registry of workflows keyed by run id
pub struct WorkflowHost {
    activity: Arc<dyn RunActivity>,
    policy: RetryPolicy,
    broker: Arc<HumanIoBroker>,
    events: Arc<dyn EventPublisher>,
    workflows: DashMap<String, WorkflowHandle>,
}

impl WorkflowHost {
    pub fn new(
        activity: Arc<dyn RunActivity>,
        policy: RetryPolicy,
        broker: Arc<HumanIoBroker>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            activity,
            policy,
            broker,
            events,
            workflows: DashMap::new(),
        }
    }

    pub fn broker(&self) -> &Arc<HumanIoBroker> {
        &self.broker
    }

    /// Start a workflow and return its run id. Must be called within a tokio runtime.
    pub fn start(&self, payload: WorkflowPayload) -> Result<String> {
        let run_id = payload.run_id.clone().unwrap_or_else(generate_run_id);
        let control = Arc::new(WorkflowControl::new(&run_id, self.broker.clone(), self.events.clone()));
        let (tx, rx) = watch::channel(None);

        match self.workflows.entry(run_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AgentError::InvalidState(format!("workflow {} already exists", run_id)));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(WorkflowHandle {
                    control: control.clone(),
                    outcome: rx,
                });
            }
        }

        tracing::info!(run_id = %run_id, agent = %payload.agent, "Workflow started");
        let activity = self.activity.clone();
        let policy = self.policy.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            // A panicking activity must still settle the workflow
            let attempts = {
                let control = control.clone();
                let id = id.clone();
                tokio::spawn(async move { run_with_retry(activity.as_ref(), &policy, &control, &id, &payload).await })
            };
            let outcome = match attempts.await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(run_id = %id, error = %error, "Run activity aborted");
                    Err(WorkflowFailure {
                        message: format!("run activity aborted: {}", error),
                        classification: "permanent".to_string(),
                    })
                }
            };
            let outcome = settle(&control, &id, outcome);
            let state = match &outcome {
                Ok(result) if result.outcome == RunOutcome::Cancelled => WorkflowState::Cancelled,
                Ok(_) => WorkflowState::Completed,
                Err(_) => WorkflowState::Failed,
            };
            control.finish(state);
            tx.send_replace(Some(outcome));
        });

        Ok(run_id)
    }

    /// Apply a signal; idempotent. Returns the state afterwards.
    pub fn signal(&self, run_id: &str, signal: Signal) -> Result<WorkflowState> {
        Ok(self.control(run_id)?.signal(signal))
    }

    pub fn pause(&self, run_id: &str) -> Result<WorkflowState> {
        self.signal(run_id, Signal::Pause)
    }

    pub fn resume(&self, run_id: &str) -> Result<WorkflowState> {
        self.signal(run_id, Signal::Resume)
    }

    pub fn cancel(&self, run_id: &str) -> Result<WorkflowState> {
        self.signal(run_id, Signal::Cancel)
    }

    pub fn state(&self, run_id: &str) -> Result<WorkflowState> {
        Ok(self.control(run_id)?.state())
    }

    /// Wait for the workflow to settle
    pub async fn result(&self, run_id: &str) -> Result<WorkflowOutcome> {
        let mut rx = self
            .workflows
            .get(run_id)
            .map(|handle| handle.outcome.clone())
            .ok_or_else(|| AgentError::RunNotFound(run_id.to_string()))?;

        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AgentError::Workflow(format!("workflow {} ended without a result", run_id)))?;
        settled
            .clone()
            .ok_or_else(|| AgentError::Workflow(format!("workflow {} has no result", run_id)))
    }

    /// Deliver a human submission to the run's pending request
    pub fn submit_input(&self, run_id: &str, kind: InputKind, value: &str) -> bool {
        self.broker.submit_input(run_id, kind, value)
    }

    /// Drop a settled workflow's control handle and result.
    ///
    /// Returns false for an unknown run; a workflow still in flight is an error.
    pub fn forget(&self, run_id: &str) -> Result<bool> {
        match self.workflows.entry(run_id.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(_) => Ok(false),
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                if entry.get().outcome.borrow().is_none() {
                    return Err(AgentError::InvalidState(format!("workflow {} has not settled", run_id)));
                }
                entry.remove();
                log::debug!("Forgot workflow {}", run_id);
                Ok(true)
            }
        }
    }

    /// Drop every settled workflow; returns how many were removed
    pub fn forget_settled(&self) -> usize {
        let before = self.workflows.len();
        self.workflows.retain(|_, handle| handle.outcome.borrow().is_none());
        before - self.workflows.len()
    }

    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn control(&self, run_id: &str) -> Result<Arc<WorkflowControl>> {
        self.workflows
            .get(run_id)
            .map(|handle| handle.control.clone())
            .ok_or_else(|| AgentError::RunNotFound(run_id.to_string()))
    }
}

/// Once cancelled, a workflow settles as cancelled whatever the last attempt
/// returned, so state and outcome agree.
fn settle(control: &WorkflowControl, run_id: &str, outcome: WorkflowOutcome) -> WorkflowOutcome {
    if !control.is_cancelled() {
        return outcome;
    }
    match outcome {
        Ok(result) => Ok(result.into_cancelled()),
        Err(failure) => {
            tracing::info!(run_id = %run_id, failure = %failure, "Failure after cancel reported as cancelled");
            Ok(RunResult::cancelled(run_id, 0))
        }
    }
}

/// Run the activity, retrying retryable failures with backoff until the policy
/// gives up or the workflow is cancelled.
async fn run_with_retry(
    activity: &dyn RunActivity,
    policy: &RetryPolicy,
    control: &Arc<WorkflowControl>,
    run_id: &str,
    payload: &WorkflowPayload,
) -> WorkflowOutcome {
    let mut attempt = 1;
    loop {
        let error = match activity.execute(run_id, payload, control.clone()).await {
            Ok(result) => {
                tracing::info!(run_id = %run_id, outcome = %result.outcome, steps = result.steps_used, "Run finished");
                return Ok(result);
            }
            Err(error) => error,
        };

        if control.is_cancelled() {
            return Ok(RunResult::cancelled(run_id, 0));
        }
        if !policy.should_retry(attempt, &error) {
            tracing::error!(
                run_id = %run_id,
                attempt = attempt,
                classification = error.classification(),
                error = %error,
                "Run failed"
            );
            return Err(WorkflowFailure::from(&error));
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(run_id = %run_id, attempt = attempt, delay_ms = delay.as_millis() as u64, error = %error, "Retrying run");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = control.cancelled() => return Ok(RunResult::cancelled(run_id, 0)),
        }
        attempt += 1;
    }
}
