//! Runner module - the agent decision loop.
//!
//! This module provides the step loop that executes one agent run:
//! - AgentRunner for driving a model against a page through typed tools
//! - Guardrails applied to every proposed tool call
//! - StepGate for pause/cancel control at step boundaries

mod agent_runner;
mod gate;
pub mod guardrails;
mod transcript;

pub use agent_runner::{AgentRunner, RunFailure, RunRequest, RunnerConfig};
pub use gate::{AlwaysContinue, GateDecision, StepGate};
pub use transcript::{CONTEXT_AUTO_OBSERVE, CONTEXT_HINT, KNOWN_RESOLUTION, Transcript};
