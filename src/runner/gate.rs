//! Step-boundary control

use async_trait::async_trait;

/// What the runner should do at a step boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Cancel,
}

/// Consulted by the runner before every step.
///
/// An implementation may suspend `checkpoint` for as long as the run is
/// paused; the runner executes nothing while it waits.
#[async_trait]
pub trait StepGate: Send + Sync {
    async fn checkpoint(&self, run_id: &str) -> GateDecision;
}

/// Gate that never pauses or cancels (for tests and sub-agents run inline)
pub struct AlwaysContinue;

#[async_trait]
impl StepGate for AlwaysContinue {
    async fn checkpoint(&self, _run_id: &str) -> GateDecision {
        GateDecision::Continue
    }
}
