//! Per-workflow control state shared by the host and the running activity

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::state::{Signal, WorkflowState};
use crate::domain::AgentEvent;
use crate::events::EventPublisher;
use crate::hitl::HumanIoBroker;
use crate::runner::{GateDecision, StepGate};

/// Current state of one workflow plus the transitions applied to it.
///
/// Signals are advisory: the runner observes them at step boundaries through
/// the `StepGate` impl, so an in-flight tool call always finishes. Cancelling
/// also releases a pending human-input wait of the run.
pub struct WorkflowControl {
    run_id: String,
    state: watch::Sender<WorkflowState>,
    broker: Arc<HumanIoBroker>,
    events: Arc<dyn EventPublisher>,
}

impl WorkflowControl {
    pub fn new(run_id: &str, broker: Arc<HumanIoBroker>, events: Arc<dyn EventPublisher>) -> Self {
        let (state, _) = watch::channel(WorkflowState::Running);
        Self {
            run_id: run_id.to_string(),
            state,
            broker,
            events,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> WorkflowState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == WorkflowState::Cancelled
    }

    /// Apply a signal. Returns the state afterwards; no-op signals change nothing.
    pub fn signal(&self, signal: Signal) -> WorkflowState {
        let next = self.transition(|current| current.apply(signal));
        if next == WorkflowState::Cancelled && self.broker.cancel(&self.run_id) {
            log::info!("Released pending human input of cancelled run {}", self.run_id);
        }
        next
    }

    /// Move to a terminal state unless one was already reached.
    ///
    /// Returns false when the workflow had already terminated.
    pub fn finish(&self, to: WorkflowState) -> bool {
        let mut applied = false;
        self.transition(|current| {
            if current.is_terminal() {
                return current;
            }
            applied = true;
            to
        });
        applied
    }

    /// Resolves once the workflow is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in self, so the channel cannot close while awaited
        let _ = rx.wait_for(|state| *state == WorkflowState::Cancelled).await;
    }

    fn transition(&self, next: impl FnOnce(WorkflowState) -> WorkflowState) -> WorkflowState {
        let mut change = None;
        self.state.send_if_modified(|current| {
            let to = next(*current);
            if to == *current {
                return false;
            }
            change = Some((*current, to));
            *current = to;
            true
        });

        if let Some((from, to)) = change {
            tracing::info!(run_id = %self.run_id, from = %from, to = %to, "Workflow state changed");
            self.events.publish(AgentEvent::workflow_state(&self.run_id, from, to));
        }
        self.state()
    }
}

#[async_trait]
impl StepGate for WorkflowControl {
    /// Suspends while paused; cancels once the workflow left `Running`.
    async fn checkpoint(&self, _run_id: &str) -> GateDecision {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| *state != WorkflowState::Paused).await {
            Ok(state) => *state,
            Err(_) => return GateDecision::Cancel,
        };
        match state {
            WorkflowState::Running => GateDecision::Continue,
            _ => GateDecision::Cancel,
        }
    }
}
