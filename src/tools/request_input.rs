//! request_input tool - block the run until a person answers

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolEnv, TypedTool};
use crate::domain::{AgentEvent, Observation};
use crate::hitl::InputKind;

pub struct RequestInputTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestInputArgs {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

fn default_kind() -> String {
    InputKind::Generic.as_str().to_string()
}

#[async_trait]
impl TypedTool for RequestInputTool {
    type Args = RequestInputArgs;

    fn name(&self) -> &'static str {
        "request_input"
    }

    fn description(&self) -> &'static str {
        "Ask the user for input and wait for the answer. Use modal_help when stuck on a dialog, \
         email_continue when a login link or code was sent by e-mail."
    }

    fn input_schema(&self) -> Value {
        let kinds: Vec<&str> = InputKind::ALL.iter().map(InputKind::as_str).collect();
        json!({
            "type": "object",
            "properties": {
                "kind": {"type": "string", "enum": kinds, "description": "Kind of input needed (default: generic)"},
                "prompt": {"type": "string", "description": "What to tell the user"},
                "timeout_seconds": {"type": "integer", "description": "How long to wait"}
            },
            "additionalProperties": false
        })
    }

    fn waits_for_human(&self) -> bool {
        true
    }

    async fn call(&self, args: RequestInputArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let kind: InputKind = match args.kind.parse() {
            Ok(kind) => kind,
            Err(e) => return Ok(Observation::failure(e)),
        };
        let timeout = env.config.agents.human_input_wait(args.timeout_seconds);

        env.events
            .publish(AgentEvent::awaiting_human(&env.run_id, kind, &args.prompt));
        match env
            .broker
            .wait_for_input(&env.run_id, kind, &args.prompt, timeout)
            .await
        {
            Ok(value) => {
                env.events.publish(AgentEvent::human_input(&env.run_id, kind));
                Ok(Observation::ok().with("value", value))
            }
            Err(e) => Ok(Observation::failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakePage;
    use crate::events::BroadcastPublisher;
    use crate::tools::Tool;
    use crate::tools::testing::env_with_events;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_request_input_round_trip_events() {
        let events = Arc::new(BroadcastPublisher::new(16));
        let mut rx = events.subscribe();
        let env = env_with_events(Arc::new(FakePage::new("https://www.coop.se/")), events);
        let broker = env.broker.clone();

        let waiter = {
            let env = env.clone();
            tokio::spawn(async move {
                RequestInputTool
                    .execute(json!({"kind": "email_continue", "prompt": "Open the link"}), &env)
                    .await
            })
        };

        let awaiting = rx.recv().await.unwrap();
        assert_eq!(awaiting.event_type(), "awaiting_human");
        while broker.pending("test-run").is_none() {
            tokio::task::yield_now().await;
        }
        assert!(broker.submit_input("test-run", InputKind::EmailContinue, "done"));

        let obs = waiter.await.unwrap().unwrap();
        assert_eq!(obs.str_field("value"), Some("done"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "human_input");
        assert!(!serde_json::to_string(&received).unwrap().contains("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_input_timeout_is_failure() {
        let env = env_with_events(
            Arc::new(FakePage::new("https://www.coop.se/")),
            Arc::new(BroadcastPublisher::new(4)),
        );
        let obs = RequestInputTool
            .execute(json!({"kind": "confirm", "timeout_seconds": 5}), &env)
            .await
            .unwrap();
        assert!(!obs.ok);
        assert!(obs.error.unwrap().contains("timed out after 5s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_input_huge_timeout_is_capped() {
        let env = env_with_events(
            Arc::new(FakePage::new("https://www.coop.se/")),
            Arc::new(BroadcastPublisher::new(4)),
        );
        let broker = env.broker.clone();
        let waiter = {
            let env = env.clone();
            tokio::spawn(async move {
                RequestInputTool
                    .execute(json!({"kind": "confirm", "timeout_seconds": u64::MAX}), &env)
                    .await
            })
        };

        let pending = loop {
            if let Some(pending) = broker.pending("test-run") {
                break pending;
            }
            tokio::task::yield_now().await;
        };
        assert!(pending.remaining_ms <= 3_600_000);

        let obs = waiter.await.unwrap().unwrap();
        assert!(!obs.ok);
        assert!(obs.error.unwrap().contains("timed out after 3600s"));
    }

    #[tokio::test]
    async fn test_request_input_unknown_kind() {
        let env = env_with_events(
            Arc::new(FakePage::new("https://www.coop.se/")),
            Arc::new(BroadcastPublisher::new(4)),
        );
        let obs = RequestInputTool.execute(json!({"kind": "sms"}), &env).await.unwrap();
        assert!(!obs.ok);
        assert_eq!(obs.error.as_deref(), Some("unknown input kind: sms"));
    }
}
