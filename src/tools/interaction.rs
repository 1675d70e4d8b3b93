//! Page interaction tools
//!
//! Failures here are reported as `ok:false` observations with a best-effort
//! `error_<tool>.png` screenshot attached, so the model can see what went wrong.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{NoArgs, ToolEnv, TypedTool, default_delay_ms, default_timeout_ms};
use crate::browser::{BrowserError, LoadState, Locator, OVERLAY_SELECTOR, Page, WaitState};
use crate::domain::Observation;

const SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const COOKIE_CLICK_TIMEOUT: Duration = Duration::from_secs(5);

const COOKIE_ACCEPT_LABELS: &[&str] = &[
    "Acceptera",
    "Godkänn",
    "Godkänna",
    "Accept",
    "I understand",
    "OK",
    "Ok",
    "Jag förstår",
];

const HYPHENS: &str = "-\u{2011}\u{2013}\u{2014}";

/// Wait for the locator to be visible, then click it
pub(super) async fn click_visible(page: &dyn Page, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
    page.wait_for(locator, WaitState::Visible, timeout).await?;
    page.click(locator, timeout).await
}

/// Clear the field, then type `value` keystroke by keystroke
pub(super) async fn clear_and_type(
    page: &dyn Page,
    locator: &Locator,
    value: &str,
    delay: Duration,
) -> Result<(), BrowserError> {
    page.fill(locator, "").await?;
    page.type_text(locator, value, delay).await
}

/// Failure observation with an error screenshot attached when one could be taken
pub(super) async fn failure_with_screenshot(tool: &str, env: &ToolEnv, error: BrowserError) -> Observation {
    let obs = Observation::failure(error.to_string());
    match env.error_screenshot(tool).await {
        Some(path) => obs.with_screenshot(path),
        None => obs,
    }
}

/// Case-insensitive pattern matching `text` with any hyphen variant
fn hyphen_insensitive_pattern(text: &str) -> String {
    let normalized: String = text
        .chars()
        .map(|c| if HYPHENS.contains(c) { '-' } else { c })
        .collect();
    normalized
        .split('-')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(&format!("[{}]", HYPHENS))
}

pub struct ClickTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickArgs {
    selector: String,
}

#[async_trait]
impl TypedTool for ClickTool {
    type Args = ClickArgs;

    fn name(&self) -> &'static str {
        "click"
    }

    fn description(&self) -> &'static str {
        "Click the first visible element matching a CSS selector."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string", "description": "CSS selector"}
            },
            "required": ["selector"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: ClickArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::css(args.selector.as_str());
        if let Err(e) = click_visible(env.page.as_ref(), &locator, SELECTOR_TIMEOUT).await {
            return Ok(failure_with_screenshot("click", env, e)
                .await
                .with("selector", args.selector));
        }
        // Let navigations and dialogs triggered by the click render
        if let Err(e) = env.page.wait_for_load_state(LoadState::NetworkIdle, SETTLE_TIMEOUT).await {
            log::debug!("No network idle after click on {}: {}", args.selector, e);
        }
        Ok(Observation::ok())
    }
}

pub struct TypeTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeArgs {
    selector: String,
    text: String,
}

#[async_trait]
impl TypedTool for TypeTool {
    type Args = TypeArgs;

    fn name(&self) -> &'static str {
        "type"
    }

    fn description(&self) -> &'static str {
        "Clear an input matched by a CSS selector and type text into it."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string", "description": "CSS selector"},
                "text": {"type": "string"}
            },
            "required": ["selector", "text"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: TypeArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::css(args.selector.as_str());
        let result = async {
            env.page
                .wait_for(&locator, WaitState::Visible, SELECTOR_TIMEOUT)
                .await?;
            clear_and_type(env.page.as_ref(), &locator, &args.text, Duration::from_millis(default_delay_ms())).await
        }
        .await;
        Ok(match result {
            Ok(()) => Observation::ok(),
            Err(e) => failure_with_screenshot("type", env, e)
                .await
                .with("selector", args.selector),
        })
    }
}

pub struct PressTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PressArgs {
    selector: String,
    key: String,
}

#[async_trait]
impl TypedTool for PressTool {
    type Args = PressArgs;

    fn name(&self) -> &'static str {
        "press"
    }

    fn description(&self) -> &'static str {
        "Press a key on the element matched by a CSS selector."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string", "description": "CSS selector"},
                "key": {"type": "string", "description": "Key name, e.g. Enter"}
            },
            "required": ["selector", "key"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: PressArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        env.page.press(&Locator::css(args.selector), &args.key).await?;
        Ok(Observation::ok())
    }
}

pub struct PressKeyTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyArgs {
    pub(super) key: String,
}

#[async_trait]
impl TypedTool for PressKeyTool {
    type Args = KeyArgs;

    fn name(&self) -> &'static str {
        "press_key"
    }

    fn description(&self) -> &'static str {
        "Press a key on whatever element has focus."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Key name, e.g. Enter or Escape"}
            },
            "required": ["key"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: KeyArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        Ok(match env.page.keyboard_press(&args.key).await {
            Ok(()) => Observation::ok(),
            Err(e) => Observation::failure(e.to_string()),
        })
    }
}

pub struct ClickTextTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickTextArgs {
    pub(super) text: String,
    #[serde(default)]
    pub(super) exact: bool,
    #[serde(default = "default_timeout_ms")]
    pub(super) timeout_ms: u64,
}

pub(super) fn click_text_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": description},
            "exact": {"type": "boolean", "description": "Match the whole text (default: false)"},
            "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 60000)"}
        },
        "required": ["text"],
        "additionalProperties": false
    })
}

#[async_trait]
impl TypedTool for ClickTextTool {
    type Args = ClickTextArgs;

    fn name(&self) -> &'static str {
        "click_text"
    }

    fn description(&self) -> &'static str {
        "Click visible text. Falls back to a match that ignores hyphen variants."
    }

    fn input_schema(&self) -> Value {
        click_text_schema("Visible text to click")
    }

    async fn call(&self, args: ClickTextArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let timeout = Duration::from_millis(args.timeout_ms);
        let direct = Locator::text(args.text.as_str(), args.exact);
        if click_visible(env.page.as_ref(), &direct, timeout).await.is_ok() {
            return Ok(Observation::ok());
        }

        let fallback = Locator::text_pattern(hyphen_insensitive_pattern(&args.text));
        match click_visible(env.page.as_ref(), &fallback, timeout).await {
            Ok(()) => Ok(Observation::ok().with("fallback", "regex")),
            Err(e) => Ok(failure_with_screenshot("click_text", env, e)
                .await
                .with("text", args.text)),
        }
    }
}

pub struct ClickRoleTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickRoleArgs {
    role: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

#[async_trait]
impl TypedTool for ClickRoleTool {
    type Args = ClickRoleArgs;

    fn name(&self) -> &'static str {
        "click_role"
    }

    fn description(&self) -> &'static str {
        "Click an element by ARIA role and optional accessible name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "role": {"type": "string", "description": "ARIA role, e.g. button or link"},
                "name": {"type": "string", "description": "Accessible name"},
                "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 60000)"}
            },
            "required": ["role"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: ClickRoleArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::role(args.role.as_str(), args.name.clone());
        let timeout = Duration::from_millis(args.timeout_ms);
        Ok(match click_visible(env.page.as_ref(), &locator, timeout).await {
            Ok(()) => Observation::ok(),
            Err(e) => failure_with_screenshot("click_role", env, e)
                .await
                .with("role", args.role)
                .with("name", args.name),
        })
    }
}

pub struct FillLabelTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillLabelArgs {
    pub(super) label: String,
    pub(super) value: String,
    #[serde(default)]
    pub(super) exact: bool,
    #[serde(default = "default_timeout_ms")]
    pub(super) timeout_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub(super) delay_ms: u64,
}

pub(super) fn fill_label_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "label": {"type": "string", "description": "Accessible label of the field"},
            "value": {"type": "string"},
            "exact": {"type": "boolean"},
            "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 60000)"},
            "delay_ms": {"type": "integer", "description": "Delay between keystrokes (default: 10)"}
        },
        "required": ["label", "value"],
        "additionalProperties": false
    })
}

#[async_trait]
impl TypedTool for FillLabelTool {
    type Args = FillLabelArgs;

    fn name(&self) -> &'static str {
        "fill_label"
    }

    fn description(&self) -> &'static str {
        "Fill the input with the given accessible label."
    }

    fn input_schema(&self) -> Value {
        fill_label_schema()
    }

    async fn call(&self, args: FillLabelArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::label(args.label.as_str(), args.exact);
        let result = async {
            env.page
                .wait_for(&locator, WaitState::Visible, Duration::from_millis(args.timeout_ms))
                .await?;
            clear_and_type(env.page.as_ref(), &locator, &args.value, Duration::from_millis(args.delay_ms)).await
        }
        .await;
        Ok(match result {
            Ok(()) => Observation::ok(),
            Err(e) => failure_with_screenshot("fill_label", env, e)
                .await
                .with("label", args.label),
        })
    }
}

pub struct FillRoleTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillRoleArgs {
    role: String,
    #[serde(default)]
    name: Option<String>,
    value: String,
    #[serde(default)]
    exact: bool,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

#[async_trait]
impl TypedTool for FillRoleTool {
    type Args = FillRoleArgs;

    fn name(&self) -> &'static str {
        "fill_role"
    }

    fn description(&self) -> &'static str {
        "Fill an input found by ARIA role and optional accessible name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "role": {"type": "string", "description": "ARIA role, e.g. textbox"},
                "name": {"type": "string", "description": "Accessible name"},
                "value": {"type": "string"},
                "exact": {"type": "boolean"},
                "timeout_ms": {"type": "integer"},
                "delay_ms": {"type": "integer"}
            },
            "required": ["role", "value"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: FillRoleArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let locator = Locator::role_exact(args.role.as_str(), args.name.clone(), args.exact);
        let result = async {
            env.page
                .wait_for(&locator, WaitState::Visible, Duration::from_millis(args.timeout_ms))
                .await?;
            clear_and_type(env.page.as_ref(), &locator, &args.value, Duration::from_millis(args.delay_ms)).await
        }
        .await;
        Ok(match result {
            Ok(()) => Observation::ok(),
            Err(e) => failure_with_screenshot("fill_role", env, e)
                .await
                .with("role", args.role)
                .with("name", args.name),
        })
    }
}

pub struct AcceptCookiesTool;

/// Click the first accept button or link found inside `scope` (or the whole page).
async fn click_any_accept(page: &dyn Page, scope: Option<&Locator>) -> bool {
    for label in COOKIE_ACCEPT_LABELS {
        let candidates = [
            Locator::role("button", Some(label.to_string())),
            Locator::text(*label, false),
        ];
        for candidate in candidates {
            let candidate = match scope {
                Some(scope) => candidate.within(scope),
                None => candidate,
            };
            if !matches!(page.count(&candidate).await, Ok(n) if n > 0) {
                continue;
            }
            match page.click(&candidate, COOKIE_CLICK_TIMEOUT).await {
                Ok(()) => return true,
                Err(e) => log::debug!("Cookie accept candidate {} failed: {}", candidate.describe(), e),
            }
        }
    }
    false
}

#[async_trait]
impl TypedTool for AcceptCookiesTool {
    type Args = NoArgs;

    fn name(&self) -> &'static str {
        "accept_cookies"
    }

    fn description(&self) -> &'static str {
        "Dismiss a cookie/consent banner by clicking a common accept button."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "additionalProperties": false})
    }

    async fn call(&self, _args: NoArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let page = env.page.as_ref();
        let overlay = Locator::css(OVERLAY_SELECTOR);

        let overlay_shown = matches!(page.count(&overlay).await, Ok(n) if n > 0)
            && page.is_visible(&overlay).await.unwrap_or(false);
        let mut clicked = overlay_shown && click_any_accept(page, Some(&overlay)).await;
        if !clicked {
            clicked = click_any_accept(page, None).await;
        }

        if let Err(e) = page.wait_for(&overlay, WaitState::Hidden, COOKIE_CLICK_TIMEOUT).await {
            log::debug!("Consent overlay still visible: {}", e);
        }
        Ok(Observation::ok().with("clicked", clicked))
    }
}

pub struct ScreenshotTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenshotArgs {
    #[serde(default = "default_tag")]
    tag: String,
    #[serde(default)]
    path: Option<PathBuf>,
}

fn default_tag() -> String {
    "shot".to_string()
}

#[async_trait]
impl TypedTool for ScreenshotTool {
    type Args = ScreenshotArgs;

    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn description(&self) -> &'static str {
        "Save a full-page screenshot and return its path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tag": {"type": "string", "description": "File name prefix (default: shot)"},
                "path": {"type": "string", "description": "Explicit output path"}
            },
            "additionalProperties": false
        })
    }

    async fn call(&self, args: ScreenshotArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let path = args.path.unwrap_or_else(|| {
            let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
            env.artifacts_dir.join(format!("{}-{}.png", args.tag, ts))
        });
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                log::warn!("Failed to create screenshot directory {}: {}", parent.display(), e);
            }
        }
        env.page.screenshot(&path).await?;
        Ok(Observation::ok().with("path", path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{FakeEffect, FakeElement, FakePage};
    use crate::tools::Tool;
    use crate::tools::testing::env_with;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_hyphen_pattern() {
        let pattern = hyphen_insensitive_pattern("E\u{2013}post (valfri)");
        let re = regex::RegexBuilder::new(&pattern).case_insensitive(true).build().unwrap();
        assert!(re.is_match("e-post (valfri)"));
        assert!(re.is_match("E\u{2011}post (valfri)"));
        assert!(!re.is_match("Epost (valfri)"));
    }

    #[tokio::test]
    async fn test_click_by_selector() {
        let page = Arc::new(FakePage::new("https://www.coop.se/").with_element(FakeElement::css("#buy", "Köp")));
        let env = env_with(page.clone());

        let obs = ClickTool.execute(json!({"selector": "#buy"}), &env).await.unwrap();
        assert!(obs.ok);
        assert_eq!(page.actions(), vec!["click:#buy".to_string()]);
    }

    #[tokio::test]
    async fn test_click_missing_attaches_screenshot() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        let env = env_with(page.clone());

        let obs = ClickTool.execute(json!({"selector": "#buy"}), &env).await.unwrap();
        assert!(!obs.ok);
        assert_eq!(obs.screenshot.as_deref(), Some("logs/error_click.png"));
        assert_eq!(obs.str_field("selector"), Some("#buy"));
    }

    #[tokio::test]
    async fn test_click_text_hyphen_fallback() {
        let page = Arc::new(FakePage::new("https://www.coop.se/").with_element(FakeElement::button("Logga in med e\u{2011}post")));
        let env = env_with(page.clone());

        let obs = ClickTextTool
            .execute(json!({"text": "Logga in med e-post"}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(obs.str_field("fallback"), Some("regex"));
    }

    #[tokio::test]
    async fn test_click_text_failure() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = ClickTextTool
            .execute(json!({"text": "Till kassan", "timeout_ms": 10}), &env)
            .await
            .unwrap();
        assert!(!obs.ok);
        assert_eq!(obs.screenshot.as_deref(), Some("logs/error_click_text.png"));
        assert_eq!(obs.str_field("text"), Some("Till kassan"));
    }

    #[tokio::test]
    async fn test_fill_label_replaces_value() {
        let mut field = FakeElement::textbox("E-postadress");
        field.value = "old".to_string();
        let page = Arc::new(FakePage::new("https://login.coop.se/").with_element(field));
        let env = env_with(page.clone());

        let obs = FillLabelTool
            .execute(json!({"label": "E-postadress", "value": "anna@example.se"}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(
            page.value(&Locator::label("E-postadress", false)).as_deref(),
            Some("anna@example.se")
        );
    }

    #[tokio::test]
    async fn test_fill_role() {
        let page = Arc::new(FakePage::new("https://login.coop.se/").with_element(FakeElement::textbox("Lösenord")));
        let env = env_with(page.clone());

        let obs = FillRoleTool
            .execute(json!({"role": "textbox", "name": "Lösenord", "value": "hunter2"}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(page.value(&Locator::label("Lösenord", true)).as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_click_role_failure_reports_name() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = ClickRoleTool
            .execute(json!({"role": "button", "name": "Till kassan", "timeout_ms": 10}), &env)
            .await
            .unwrap();
        assert!(!obs.ok);
        assert_eq!(obs.str_field("name"), Some("Till kassan"));
    }

    #[tokio::test]
    async fn test_press_key() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        let env = env_with(page.clone());
        let obs = PressKeyTool.execute(json!({"key": "Enter"}), &env).await.unwrap();
        assert!(obs.ok);
        assert_eq!(page.actions(), vec!["key:Enter".to_string()]);
    }

    #[tokio::test]
    async fn test_accept_cookies_in_overlay() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.show_overlay(vec![
            FakeElement::button("Inställningar"),
            FakeElement::button("Godkänn alla kakor").on_click(FakeEffect::HideOverlay),
        ]);
        let env = env_with(page.clone());

        let obs = AcceptCookiesTool.execute(json!({}), &env).await.unwrap();
        assert!(obs.ok);
        assert_eq!(obs.data["clicked"], true);
        assert!(!page.overlay_visible());
    }

    #[tokio::test]
    async fn test_accept_cookies_nothing_to_click() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = AcceptCookiesTool.execute(json!({}), &env).await.unwrap();
        assert!(obs.ok);
        assert_eq!(obs.data["clicked"], false);
    }

    #[tokio::test]
    async fn test_screenshot_default_path() {
        let dir = tempdir().unwrap();
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        let env = env_with(page.clone()).with_artifacts_dir(dir.path());

        let obs = ScreenshotTool.execute(json!({"tag": "cart"}), &env).await.unwrap();
        let path = obs.str_field("path").unwrap();
        assert!(path.starts_with(&dir.path().join("cart-").display().to_string()));
        assert!(path.ends_with(".png"));
    }
}
