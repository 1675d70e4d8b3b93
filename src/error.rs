//! Error types for cartpilot
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in the engine
#[derive(Debug, Error)]
pub enum AgentError {
    /// No workflow or run registered under this id
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Browser/page error
    #[error("Browser error: {0}")]
    Browser(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Experience memory error
    #[error("Memory error: {0}")]
    Memory(String),

    /// Workflow orchestration error
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AgentError>;
