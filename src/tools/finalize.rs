//! finalize tool - the agent's explicit end-of-run signal

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolEnv, TypedTool};
use crate::domain::Observation;

pub struct FinalizeTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinalizeArgs {
    status: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    screenshot: Option<String>,
}

#[async_trait]
impl TypedTool for FinalizeTool {
    type Args = FinalizeArgs;

    fn name(&self) -> &'static str {
        "finalize"
    }

    fn description(&self) -> &'static str {
        "End the run with a final status (success or failed) and optional details."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "description": "success or failed"},
                "provider": {"type": "string", "description": "Login provider used, if any"},
                "error": {"type": "string", "description": "What went wrong"},
                "screenshot": {"type": "string", "description": "Path of a supporting screenshot"}
            },
            "required": ["status"],
            "additionalProperties": false
        })
    }

    // Echoes the status back; the runner turns it into the run result
    async fn call(&self, args: FinalizeArgs, _env: &ToolEnv) -> eyre::Result<Observation> {
        let mut obs = Observation::ok().with("status", args.status);
        for (key, value) in [
            ("provider", args.provider),
            ("error", args.error),
            ("screenshot", args.screenshot),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                obs = obs.with(key, value);
            }
        }
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakePage;
    use crate::domain::FinalStatus;
    use crate::tools::Tool;
    use crate::tools::testing::env_with;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_finalize_echoes_status() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = FinalizeTool
            .execute(json!({"status": "failed", "error": "captcha", "provider": ""}), &env)
            .await
            .unwrap();
        assert!(obs.ok);

        let status = FinalStatus::from_observation(&obs);
        assert_eq!(status.status, "failed");
        assert_eq!(status.error.as_deref(), Some("captcha"));
        assert!(status.provider.is_none());
    }

    #[tokio::test]
    async fn test_finalize_requires_status() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        assert!(FinalizeTool.execute(json!({}), &env).await.is_err());
    }
}
