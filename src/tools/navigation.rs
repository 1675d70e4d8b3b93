//! Navigation tools: goto, wait_network_idle, current_url

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{NoArgs, ToolEnv, TypedTool};
use crate::browser::LoadState;
use crate::domain::Observation;

const GOTO_SETTLE: Duration = Duration::from_secs(30);

pub struct GotoTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GotoArgs {
    url: String,
}

#[async_trait]
impl TypedTool for GotoTool {
    type Args = GotoArgs;

    fn name(&self) -> &'static str {
        "goto"
    }

    fn description(&self) -> &'static str {
        "Navigate to a URL and wait for the page to settle."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL"}
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: GotoArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        env.page.goto(&args.url).await?;
        if let Err(e) = env.page.wait_for_load_state(LoadState::NetworkIdle, GOTO_SETTLE).await {
            log::debug!("Page did not reach network idle after goto {}: {}", args.url, e);
        }
        Ok(Observation::ok().with("url", env.page.url()))
    }
}

pub struct WaitNetworkIdleTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitNetworkIdleArgs {
    #[serde(default = "default_idle_timeout_ms")]
    timeout_ms: u64,
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

#[async_trait]
impl TypedTool for WaitNetworkIdleTool {
    type Args = WaitNetworkIdleArgs;

    fn name(&self) -> &'static str {
        "wait_network_idle"
    }

    fn description(&self) -> &'static str {
        "Wait until the page has no network activity."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 30000)"}
            },
            "additionalProperties": false
        })
    }

    async fn call(&self, args: WaitNetworkIdleArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let timeout = Duration::from_millis(args.timeout_ms);
        Ok(match env.page.wait_for_load_state(LoadState::NetworkIdle, timeout).await {
            Ok(()) => Observation::ok(),
            Err(e) => Observation::failure(e.to_string()),
        })
    }
}

pub struct CurrentUrlTool;

#[async_trait]
impl TypedTool for CurrentUrlTool {
    type Args = NoArgs;

    fn name(&self) -> &'static str {
        "current_url"
    }

    fn description(&self) -> &'static str {
        "Return the URL of the current page."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "additionalProperties": false})
    }

    async fn call(&self, _args: NoArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        Ok(Observation::ok().with("url", env.page.url()))
    }
}
