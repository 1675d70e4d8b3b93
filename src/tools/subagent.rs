//! invoke_subagent tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolEnv, TypedTool};
use crate::domain::Observation;

pub struct InvokeSubagentTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvokeSubagentArgs {
    name: String,
    goal: String,
}

#[async_trait]
impl TypedTool for InvokeSubagentTool {
    type Args = InvokeSubagentArgs;

    fn name(&self) -> &'static str {
        "invoke_subagent"
    }

    fn description(&self) -> &'static str {
        "Run a specialised agent (e.g. authentication) on the current page and return its result."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Agent name"},
                "goal": {"type": "string", "description": "Goal for the agent"}
            },
            "required": ["name", "goal"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: InvokeSubagentArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let Some(invoker) = &env.subagents else {
            return Ok(Observation::failure("invoke_subagent not configured"));
        };
        let result = invoker.invoke(&args.name, &args.goal).await?;
        Ok(Observation::ok().with("result", serde_json::to_value(result)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakePage;
    use crate::domain::{FinalStatus, RunResult};
    use crate::tools::testing::env_with;
    use crate::tools::{SubAgentInvoker, Tool};
    use std::sync::Arc;

    struct StubInvoker;

    #[async_trait]
    impl SubAgentInvoker for StubInvoker {
        async fn invoke(&self, name: &str, _goal: &str) -> crate::Result<RunResult> {
            let status = FinalStatus {
                status: "success".to_string(),
                provider: Some(name.to_string()),
                ..Default::default()
            };
            Ok(RunResult::finalized("sub-1", status, 3))
        }
    }

    #[tokio::test]
    async fn test_not_configured() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = InvokeSubagentTool
            .execute(json!({"name": "authentication", "goal": "log in"}), &env)
            .await
            .unwrap();
        assert!(!obs.ok);
    }

    #[tokio::test]
    async fn test_invokes_subagent() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/"))).with_subagents(Arc::new(StubInvoker));
        let obs = InvokeSubagentTool
            .execute(json!({"name": "authentication", "goal": "log in"}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(obs.data["result"]["outcome"], "finalized");
        assert_eq!(obs.data["result"]["result"]["provider"], "authentication");
    }
}
