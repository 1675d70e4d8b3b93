//! Tool system for agent runs
//!
//! Every action the model can take against the page is a named tool with a
//! typed argument struct. Tools are collected in a `ToolRegistry`, which turns
//! every outcome (including unknown names and bad arguments) into an
//! `Observation`.

mod config_tools;
mod env;
mod finalize;
mod interaction;
mod modal;
mod navigation;
mod query;
mod registry;
mod request_input;
mod subagent;

pub use config_tools::{GetConfigTool, GetSecretTool};
pub use env::{SubAgentInvoker, ToolEnv};
pub use finalize::FinalizeTool;
pub use interaction::{
    AcceptCookiesTool, ClickRoleTool, ClickTextTool, ClickTool, FillLabelTool, FillRoleTool, PressKeyTool, PressTool,
    ScreenshotTool, TypeTool,
};
pub use modal::{ModalClickTextTool, ModalCloseTool, ModalExistsTool, ModalFillLabelTool, ModalPressKeyTool};
pub use navigation::{CurrentUrlTool, GotoTool, WaitNetworkIdleTool};
pub use query::{CheckLoggedInTool, CountTool, ExistsTextTool, ExistsTool, QueryTextTool, WaitTextTool};
pub use registry::ToolRegistry;
pub use request_input::RequestInputTool;
pub use subagent::InvokeSubagentTool;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::browser::BrowserError;
use crate::domain::Observation;

/// Tool names with special handling in the runner
pub const FINALIZE: &str = "finalize";
pub const REQUEST_INPUT: &str = "request_input";
pub const INVOKE_SUBAGENT: &str = "invoke_subagent";
pub const GET_CONFIG: &str = "get_config";

/// Why a tool call did not produce a regular observation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArgs { tool: String, message: String },

    #[error("tool not allowed: {0}")]
    NotAllowed(String),

    #[error("policy violation: {tool} arguments contain an unresolved placeholder")]
    PlaceholderViolation { tool: String },

    #[error("{}", timeout_message(.tool, .after, .detail.as_deref()))]
    Timeout {
        tool: String,
        after: Duration,
        detail: Option<String>,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("{0}")]
    Failed(String),
}

fn timeout_message(tool: &str, after: &Duration, detail: Option<&str>) -> String {
    let secs = after.as_secs_f64();
    let after = if secs.fract() == 0.0 {
        format!("{}s", after.as_secs())
    } else {
        format!("{}ms", after.as_millis())
    };
    match detail {
        Some(detail) => format!("{} timed out after {} ({})", tool, after, detail),
        None => format!("{} timed out after {}", tool, after),
    }
}

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the model's function name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Blocks on a person; such tools are bounded by their own deadline
    fn waits_for_human(&self) -> bool {
        false
    }

    /// Execute the tool
    async fn execute(&self, input: Value, env: &ToolEnv) -> Result<Observation, ToolError>;
}

/// A tool with a typed argument struct.
///
/// Arguments are decoded before `call`; unknown fields are rejected by the
/// `deny_unknown_fields` on each `Args` type.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Args: DeserializeOwned + Send;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    fn waits_for_human(&self) -> bool {
        false
    }

    async fn call(&self, args: Self::Args, env: &ToolEnv) -> eyre::Result<Observation>;
}

#[async_trait]
impl<T: TypedTool> Tool for T {
    fn name(&self) -> &'static str {
        TypedTool::name(self)
    }

    fn description(&self) -> &'static str {
        TypedTool::description(self)
    }

    fn input_schema(&self) -> Value {
        TypedTool::input_schema(self)
    }

    fn waits_for_human(&self) -> bool {
        TypedTool::waits_for_human(self)
    }

    async fn execute(&self, input: Value, env: &ToolEnv) -> Result<Observation, ToolError> {
        // Models send `null` for tools without parameters
        let input = if input.is_null() { Value::Object(Default::default()) } else { input };
        let args: T::Args = serde_json::from_value(input).map_err(|e| ToolError::InvalidArgs {
            tool: TypedTool::name(self).to_string(),
            message: e.to_string(),
        })?;
        self.call(args, env).await.map_err(|e| match e.downcast::<BrowserError>() {
            Ok(browser) => ToolError::Browser(browser),
            Err(other) => ToolError::Failed(format!("{:#}", other)),
        })
    }
}

/// Arguments of tools that take none
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_delay_ms() -> u64 {
    10
}
