//! Read-only page queries

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{NoArgs, ToolEnv, TypedTool, default_timeout_ms};
use crate::browser::{Locator, WaitState};
use crate::domain::Observation;

pub struct ExistsTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorArgs {
    selector: String,
}

fn selector_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "selector": {"type": "string", "description": "CSS selector"}
        },
        "required": ["selector"],
        "additionalProperties": false
    })
}

#[async_trait]
impl TypedTool for ExistsTool {
    type Args = SelectorArgs;

    fn name(&self) -> &'static str {
        "exists"
    }

    fn description(&self) -> &'static str {
        "Check whether any element matches a CSS selector."
    }

    fn input_schema(&self) -> Value {
        selector_schema()
    }

    async fn call(&self, args: SelectorArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let count = env.page.count(&Locator::css(args.selector)).await?;
        Ok(Observation::ok().with("exists", count > 0))
    }
}

pub struct CountTool;

#[async_trait]
impl TypedTool for CountTool {
    type Args = SelectorArgs;

    fn name(&self) -> &'static str {
        "count"
    }

    fn description(&self) -> &'static str {
        "Count the elements matching a CSS selector."
    }

    fn input_schema(&self) -> Value {
        selector_schema()
    }

    async fn call(&self, args: SelectorArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let count = env.page.count(&Locator::css(args.selector)).await?;
        Ok(Observation::ok().with("count", count))
    }
}

pub struct QueryTextTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryTextArgs {
    selector: String,
    #[serde(default = "default_max_len")]
    max_len: usize,
}

fn default_max_len() -> usize {
    200
}

#[async_trait]
impl TypedTool for QueryTextTool {
    type Args = QueryTextArgs;

    fn name(&self) -> &'static str {
        "query_text"
    }

    fn description(&self) -> &'static str {
        "Read the text of the first element matching a CSS selector."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string", "description": "CSS selector"},
                "max_len": {"type": "integer", "description": "Maximum characters returned (default: 200)"}
            },
            "required": ["selector"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: QueryTextArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let text = env
            .page
            .text_content(&Locator::css(args.selector))
            .await?
            .unwrap_or_default();
        let text: String = text.chars().take(args.max_len).collect();
        Ok(Observation::ok().with("text", text.trim()))
    }
}

pub struct ExistsTextTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExistsTextArgs {
    text: String,
    #[serde(default)]
    exact: bool,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[async_trait]
impl TypedTool for ExistsTextTool {
    type Args = ExistsTextArgs;

    fn name(&self) -> &'static str {
        "exists_text"
    }

    fn description(&self) -> &'static str {
        "Check whether text is on the page. With timeout_ms, wait for it to become visible."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "exact": {"type": "boolean", "description": "Match the whole text (default: false)"},
                "timeout_ms": {"type": "integer", "description": "Wait up to this long for the text to appear"}
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: ExistsTextArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::text(args.text, args.exact);
        let exists = match args.timeout_ms.filter(|ms| *ms > 0) {
            Some(ms) => env
                .page
                .wait_for(&locator, WaitState::Visible, Duration::from_millis(ms))
                .await
                .is_ok(),
            None => env.page.count(&locator).await? > 0,
        };
        Ok(Observation::ok().with("exists", exists))
    }
}

pub struct WaitTextTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitTextArgs {
    text: String,
    #[serde(default)]
    exact: bool,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

#[async_trait]
impl TypedTool for WaitTextTool {
    type Args = WaitTextArgs;

    fn name(&self) -> &'static str {
        "wait_text"
    }

    fn description(&self) -> &'static str {
        "Wait until text is visible on the page."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "exact": {"type": "boolean"},
                "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 60000)"}
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: WaitTextArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::text(args.text, args.exact);
        let timeout = Duration::from_millis(args.timeout_ms);
        Ok(match env.page.wait_for(&locator, WaitState::Visible, timeout).await {
            Ok(()) => Observation::ok(),
            Err(e) => Observation::failure(e.to_string()),
        })
    }
}

pub struct CheckLoggedInTool;

#[async_trait]
impl TypedTool for CheckLoggedInTool {
    type Args = NoArgs;

    fn name(&self) -> &'static str {
        "check_logged_in"
    }

    fn description(&self) -> &'static str {
        "Check the store's logged-in signals on the current page."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "additionalProperties": false})
    }

    async fn call(&self, _args: NoArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let signals = env.store_config().map(|s| s.login_signals.clone()).unwrap_or_default();
        for signal in signals {
            match env.page.count(&Locator::css(signal.as_str())).await {
                Ok(n) if n > 0 => {
                    return Ok(Observation::ok().with("logged_in", true).with("signal", signal));
                }
                Ok(_) => {}
                Err(e) => log::debug!("Login signal {} not checkable: {}", signal, e),
            }
        }
        Ok(Observation::ok().with("logged_in", false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{FakeElement, FakePage};
    use crate::tools::Tool;
    use crate::tools::testing::env_with;
    use std::sync::Arc;

    fn page() -> Arc<FakePage> {
        Arc::new(
            FakePage::new("https://www.coop.se/")
                .with_element(FakeElement::css(".price", "  29,90 kr  "))
                .with_element(FakeElement::css(".price", "15,00 kr"))
                .with_element(FakeElement::text("Lägg i varukorg")),
        )
    }

    #[tokio::test]
    async fn test_exists_and_count() {
        let env = env_with(page());
        let obs = ExistsTool.execute(json!({"selector": ".price"}), &env).await.unwrap();
        assert_eq!(obs.data["exists"], true);

        let obs = CountTool.execute(json!({"selector": ".price"}), &env).await.unwrap();
        assert_eq!(obs.data["count"], 2);

        let obs = ExistsTool.execute(json!({"selector": "#cart"}), &env).await.unwrap();
        assert_eq!(obs.data["exists"], false);
    }

    #[tokio::test]
    async fn test_query_text_trims_and_truncates() {
        let env = env_with(page());
        let obs = QueryTextTool
            .execute(json!({"selector": ".price"}), &env)
            .await
            .unwrap();
        assert_eq!(obs.str_field("text"), Some("29,90 kr"));

        let obs = QueryTextTool
            .execute(json!({"selector": ".price", "max_len": 4}), &env)
            .await
            .unwrap();
        assert_eq!(obs.str_field("text"), Some("29"));
    }

    #[tokio::test]
    async fn test_exists_text_with_wait() {
        let env = env_with(page());
        let obs = ExistsTextTool
            .execute(json!({"text": "varukorg", "timeout_ms": 100}), &env)
            .await
            .unwrap();
        assert_eq!(obs.data["exists"], true);

        let obs = ExistsTextTool
            .execute(json!({"text": "Kassa", "timeout_ms": 100}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(obs.data["exists"], false);
    }

    #[tokio::test]
    async fn test_wait_text_missing_fails() {
        let env = env_with(page());
        let obs = WaitTextTool
            .execute(json!({"text": "Kassa", "timeout_ms": 50}), &env)
            .await
            .unwrap();
        assert!(!obs.ok);
        assert!(obs.error.unwrap().contains("text=Kassa"));
    }

    #[tokio::test]
    async fn test_check_logged_in() {
        let page = page();
        let env = env_with(page.clone());
        let obs = CheckLoggedInTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["logged_in"], false);

        page.add_element(FakeElement::css("a[href*='logga-ut']", "Logga ut"));
        let obs = CheckLoggedInTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["logged_in"], true);
        assert_eq!(obs.str_field("signal"), Some("a[href*='logga-ut']"));
    }
}
