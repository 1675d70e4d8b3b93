//! Domain types for cartpilot
//!
//! This module contains the records that flow between the engine's parts:
//! - Observation: result of one tool call
//! - RunResult: terminal result of a run (outcome, final status, trace)
//! - AgentEvent: step-level events for passive consumers

pub mod event;
pub mod observation;
pub mod outcome;

pub use event::{AgentEvent, event_types};
pub use observation::Observation;
pub use outcome::{FinalStatus, RunOutcome, RunResult, TraceEntry};
