//! cartpilot - an agent execution engine for web shopping
//!
//! A model drives a browser page through typed tools until it finalizes,
//! runs out of budget or is cancelled. Runs are wrapped in a workflow that
//! retries failed attempts and accepts pause/resume/cancel signals, and can
//! block on a human for OTPs or missing details. A conversation layer on top
//! turns customer messages into agent runs.

pub mod agents;
pub mod browser;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod events;
pub mod hitl;
pub mod id;
pub mod llm;
pub mod memory;
pub mod prompt;
pub mod runner;
pub mod tools;
pub mod workflow;

pub use error::{AgentError, Result};
