//! Dialog-scoped tools

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::interaction::{
    ClickTextArgs, FillLabelArgs, KeyArgs, clear_and_type, click_text_schema, click_visible, failure_with_screenshot,
    fill_label_schema,
};
use super::{NoArgs, ToolEnv, TypedTool, default_timeout_ms};
use crate::browser::{BrowserError, Locator, Page, WaitState, describe_dialog, find_dialog};
use crate::domain::Observation;

const CLOSE_BUTTON_NAMES: &[&str] = &["Stäng", "Close", "✕", "×", "Avbryt", "OK", "Ok"];

/// The visible dialog, or the plain `role=dialog` locator when none is visible
async fn dialog(page: &dyn Page) -> Locator {
    match find_dialog(page).await {
        Some(dialog) => dialog,
        None => Locator::role("dialog", None),
    }
}

pub struct ModalExistsTool;

#[async_trait]
impl TypedTool for ModalExistsTool {
    type Args = NoArgs;

    fn name(&self) -> &'static str {
        "modal_exists"
    }

    fn description(&self) -> &'static str {
        "Report whether a dialog is open, with its title and text."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "additionalProperties": false})
    }

    async fn call(&self, _args: NoArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let page = env.page.as_ref();
        let dialog = dialog(page).await;
        let present = page.count(&dialog).await? > 0;
        let (title, text) = if present {
            describe_dialog(page, &dialog).await
        } else {
            (None, None)
        };
        Ok(Observation::ok()
            .with("present", present)
            .with("title", title)
            .with("text", text))
    }
}

pub struct ModalClickTextTool;

#[async_trait]
impl TypedTool for ModalClickTextTool {
    type Args = ClickTextArgs;

    fn name(&self) -> &'static str {
        "modal_click_text"
    }

    fn description(&self) -> &'static str {
        "Click visible text inside the open dialog."
    }

    fn input_schema(&self) -> Value {
        click_text_schema("Text inside the dialog to click")
    }

    async fn call(&self, args: ClickTextArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let page = env.page.as_ref();
        let locator = Locator::text(args.text.as_str(), args.exact).within(&dialog(page).await);
        Ok(
            match click_visible(page, &locator, Duration::from_millis(args.timeout_ms)).await {
                Ok(()) => Observation::ok(),
                Err(e) => failure_with_screenshot("modal_click_text", env, e)
                    .await
                    .with("text", args.text),
            },
        )
    }
}

pub struct ModalFillLabelTool;

/// Field inside the dialog: by label, then placeholder, then the first textbox
async fn dialog_field(
    page: &dyn Page,
    dialog: &Locator,
    label: &str,
    exact: bool,
    timeout: Duration,
) -> Result<Locator, BrowserError> {
    let candidates = [
        Locator::label(label, exact).within(dialog),
        Locator::placeholder(label, exact).within(dialog),
        Locator::role("textbox", None).within(dialog),
    ];
    let mut last_err = BrowserError::NotFound(label.to_string());
    for candidate in candidates {
        match page.wait_for(&candidate, WaitState::Visible, timeout).await {
            Ok(()) => return Ok(candidate),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[async_trait]
impl TypedTool for ModalFillLabelTool {
    type Args = FillLabelArgs;

    fn name(&self) -> &'static str {
        "modal_fill_label"
    }

    fn description(&self) -> &'static str {
        "Fill a field inside the open dialog by label, falling back to placeholder, then the first textbox."
    }

    fn input_schema(&self) -> Value {
        fill_label_schema()
    }

    async fn call(&self, args: FillLabelArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let page = env.page.as_ref();
        let dialog = dialog(page).await;
        let result = async {
            let field = dialog_field(
                page,
                &dialog,
                &args.label,
                args.exact,
                Duration::from_millis(args.timeout_ms),
            )
            .await?;
            clear_and_type(page, &field, &args.value, Duration::from_millis(args.delay_ms)).await
        }
        .await;
        Ok(match result {
            Ok(()) => Observation::ok(),
            Err(e) => failure_with_screenshot("modal_fill_label", env, e)
                .await
                .with("label", args.label),
        })
    }
}

pub struct ModalPressKeyTool;

#[async_trait]
impl TypedTool for ModalPressKeyTool {
    type Args = KeyArgs;

    fn name(&self) -> &'static str {
        "modal_press_key"
    }

    fn description(&self) -> &'static str {
        "Press a key while a dialog is open (e.g. Enter to submit, Escape to dismiss)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string"}
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

pub struct ModalCloseTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModalCloseArgs {
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

#[async_trait]
impl TypedTool for ModalCloseTool {
    type Args = ModalCloseArgs;

    fn name(&self) -> &'static str {
        "modal_close"
    }

    fn description(&self) -> &'static str {
        "Close the open dialog with its close button, or Escape when there is none."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timeout_ms": {"type": "integer", "description": "Maximum wait (default: 60000)"}
            },
            "additionalProperties": false
        })
    }

    async fn call(&self, args: ModalCloseArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let page = env.page.as_ref();
        let timeout = Duration::from_millis(args.timeout_ms);
        let dialog = dialog(page).await;
        if page.count(&dialog).await? == 0 {
            return Ok(Observation::ok().with("closed", false));
        }

        let mut clicked = false;
        for name in CLOSE_BUTTON_NAMES {
            let button = Locator::role("button", Some(name.to_string())).within(&dialog);
            if !matches!(page.count(&button).await, Ok(n) if n > 0) {
                continue;
            }
            match click_visible(page, &button, timeout).await {
                Ok(()) => {
                    clicked = true;
                    break;
                }
                Err(e) => log::debug!("Close button {} failed: {}", button.describe(), e),
            }
        }
        if !clicked {
            if let Err(e) = page.keyboard_press("Escape").await {
                return Ok(failure_with_screenshot("modal_close", env, e).await);
            }
        }

        if let Err(e) = page.wait_for(&dialog, WaitState::Hidden, timeout).await {
            log::debug!("Dialog still visible after close: {}", e);
        }
        Ok(Observation::ok().with("closed", true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{FakeDialog, FakeEffect, FakeElement, FakePage};
    use crate::tools::Tool;
    use crate::tools::testing::env_with;
    use std::sync::Arc;

    fn postcode_dialog() -> FakeDialog {
        FakeDialog::new("Var är du?", "Ange ditt postnummer så visar vi rätt sortiment")
            .with_element(FakeElement::textbox("Postnummer").with_placeholder("T.ex. 123 45"))
            .with_element(FakeElement::button("Spara").on_click(FakeEffect::CloseDialog))
    }

    #[tokio::test]
    async fn test_modal_exists() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        let env = env_with(page.clone());

        let obs = ModalExistsTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["present"], false);

        page.open_dialog(postcode_dialog());
        let obs = ModalExistsTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["present"], true);
        assert_eq!(obs.str_field("title"), Some("Var är du?"));
        assert!(obs.str_field("text").unwrap().contains("postnummer"));
    }

    #[tokio::test]
    async fn test_modal_fill_label_by_label() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.open_dialog(postcode_dialog());
        let env = env_with(page.clone());

        let obs = ModalFillLabelTool
            .execute(json!({"label": "Postnummer", "value": "41301"}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(page.value(&Locator::label("Postnummer", true)).as_deref(), Some("41301"));
    }

    #[tokio::test]
    async fn test_modal_fill_label_falls_back_to_textbox() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.open_dialog(
            FakeDialog::untitled("Ange postnummer").with_element(FakeElement::textbox("zip").without_label()),
        );
        let env = env_with(page.clone());

        let obs = ModalFillLabelTool
            .execute(json!({"label": "Postnummer", "value": "41301", "timeout_ms": 10}), &env)
            .await
            .unwrap();
        assert!(obs.ok);
        assert_eq!(page.value(&Locator::role("textbox", None)).as_deref(), Some("41301"));
    }

    #[tokio::test]
    async fn test_modal_click_text() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.open_dialog(postcode_dialog());
        let env = env_with(page.clone());

        let obs = ModalClickTextTool.execute(json!({"text": "Spara"}), &env).await.unwrap();
        assert!(obs.ok);
        assert!(!page.dialog_open());
    }

    #[tokio::test]
    async fn test_modal_close_button() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.open_dialog(
            FakeDialog::new("Nyhetsbrev", "Prenumerera")
                .with_element(FakeElement::button("Stäng").on_click(FakeEffect::CloseDialog)),
        );
        let env = env_with(page.clone());

        let obs = ModalCloseTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["closed"], true);
        assert!(!page.dialog_open());
        assert!(page.actions().iter().any(|a| a.contains("role=button[name=Stäng]")));
    }

    #[tokio::test]
    async fn test_modal_close_escape_fallback() {
        let page = Arc::new(FakePage::new("https://www.coop.se/"));
        page.open_dialog(FakeDialog::new("Välj butik", "Hämta i butik eller hemleverans"));
        let env = env_with(page.clone());

        let obs = ModalCloseTool.execute(json!({"timeout_ms": 10}), &env).await.unwrap();
        assert_eq!(obs.data["closed"], true);
        assert!(page.actions().contains(&"key:Escape".to_string()));
        assert!(!page.dialog_open());
    }

    #[tokio::test]
    async fn test_modal_close_without_dialog() {
        let env = env_with(Arc::new(FakePage::new("https://www.coop.se/")));
        let obs = ModalCloseTool.execute(json!({}), &env).await.unwrap();
        assert_eq!(obs.data["closed"], false);
    }
}
