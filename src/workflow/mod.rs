//! Workflow module - durable-style wrapper around one agent run.
//!
//! This module provides:
//! - WorkflowState and Signal (pause/resume/cancel) transitions
//! - WorkflowControl, the per-run control handle that gates runner steps
//! - RetryPolicy and ActivityError classification
//! - WorkflowHost, the in-process registry that starts and signals workflows

mod activity;
mod control;
mod host;
mod retry;
mod state;

pub use activity::{RunActivity, WorkflowPayload};
pub use control::WorkflowControl;
pub use host::{WorkflowHost, WorkflowOutcome};
pub use retry::{ActivityError, RetryPolicy, WorkflowFailure};
pub use state::{Signal, WorkflowState};
