//! In-memory page model.
//!
//! `FakePage` holds a flat list of elements plus an optional dialog and an
//! optional consent overlay, each with their own elements. Clicking an element
//! can apply a scripted effect (close the dialog, hide the overlay, navigate,
//! open a dialog). Every interaction is appended to an action log.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::RegexBuilder;

use super::observe::OVERLAY_SELECTOR;
use super::{BrowserError, EnvironmentFactory, LoadState, Locator, Page, Selector, WaitState, text_matches};
use crate::config::StoreConfig;

/// Side effect applied when an element is clicked
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEffect {
    CloseDialog,
    HideOverlay,
    Navigate(String),
    OpenDialog(FakeDialog),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeElement {
    pub css: Vec<String>,
    pub text: String,
    pub role: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub visible: bool,
    pub value: String,
    pub on_click: Option<FakeEffect>,
}

impl FakeElement {
    /// Element matched by a CSS selector
    pub fn css(selector: &str, text: &str) -> Self {
        Self {
            css: vec![selector.to_string()],
            text: text.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    /// Plain text node
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn button(name: &str) -> Self {
        Self {
            text: name.to_string(),
            role: Some("button".to_string()),
            name: Some(name.to_string()),
            visible: true,
            ..Default::default()
        }
    }

    pub fn link(name: &str) -> Self {
        Self {
            role: Some("link".to_string()),
            ..Self::button(name)
        }
    }

    /// Labelled text input
    pub fn textbox(label: &str) -> Self {
        Self {
            role: Some("textbox".to_string()),
            name: Some(label.to_string()),
            label: Some(label.to_string()),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_css(mut self, selector: &str) -> Self {
        self.css.push(selector.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn without_label(mut self) -> Self {
        self.label = None;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn on_click(mut self, effect: FakeEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css(css) => self.css.iter().any(|c| c == css),
            Selector::Text { text, exact } => !self.text.is_empty() && text_matches(&self.text, text, *exact),
            Selector::TextPattern(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(&self.text))
                .unwrap_or(false),
            Selector::Role { role, name, exact } => {
                self.role.as_deref() == Some(role.as_str())
                    && name.as_ref().is_none_or(|wanted| {
                        self.name
                            .as_deref()
                            .is_some_and(|actual| text_matches(actual, wanted, *exact))
                    })
            }
            Selector::Label { label, exact } => self
                .label
                .as_deref()
                .is_some_and(|actual| text_matches(actual, label, *exact)),
            Selector::Placeholder { text, exact } => self
                .placeholder
                .as_deref()
                .is_some_and(|actual| text_matches(actual, text, *exact)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeDialog {
    pub title: Option<String>,
    pub text: String,
    pub elements: Vec<FakeElement>,
}

impl FakeDialog {
    pub fn new(title: &str, text: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            text: text.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn untitled(text: &str) -> Self {
        Self {
            title: None,
            text: text.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    fn text_content(&self) -> String {
        match &self.title {
            Some(title) => format!("{}\n{}", title, self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Dialog,
    DialogHeading,
    Overlay,
    PageEl(usize),
    DialogEl(usize),
    OverlayEl(usize),
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    elements: Vec<FakeElement>,
    dialog: Option<FakeDialog>,
    overlay: Option<Vec<FakeElement>>,
    actions: Vec<String>,
    delay: Option<Duration>,
    cookies_cleared: bool,
    storage_cleared: bool,
}

impl FakeState {
    fn resolve(&self, locator: &Locator) -> Vec<Node> {
        let mut out = Vec::new();
        match &locator.scope {
            None => self.document_matches(&locator.selector, &mut out),
            Some(scope) => {
                for node in self.resolve(scope) {
                    match node {
                        Node::Dialog => self.dialog_matches(&locator.selector, &mut out),
                        Node::Overlay => self.overlay_matches(&locator.selector, &mut out),
                        _ => {}
                    }
                }
            }
        }
        out.dedup();
        out
    }

    fn document_matches(&self, selector: &Selector, out: &mut Vec<Node>) {
        if self.dialog.is_some() && is_dialog_selector(selector) {
            out.push(Node::Dialog);
        }
        if self.overlay.is_some() && matches!(selector, Selector::Css(css) if css == OVERLAY_SELECTOR) {
            out.push(Node::Overlay);
        }
        out.extend(
            self.elements
                .iter()
                .enumerate()
                .filter(|(_, el)| el.matches(selector))
                .map(|(i, _)| Node::PageEl(i)),
        );
        self.dialog_matches(selector, out);
        self.overlay_matches(selector, out);
    }

    fn dialog_matches(&self, selector: &Selector, out: &mut Vec<Node>) {
        let Some(dialog) = &self.dialog else {
            return;
        };
        if dialog.title.is_some() && matches!(selector, Selector::Role { role, .. } if role == "heading") {
            out.push(Node::DialogHeading);
        }
        out.extend(
            dialog
                .elements
                .iter()
                .enumerate()
                .filter(|(_, el)| el.matches(selector))
                .map(|(i, _)| Node::DialogEl(i)),
        );
    }

    fn overlay_matches(&self, selector: &Selector, out: &mut Vec<Node>) {
        let Some(elements) = &self.overlay else {
            return;
        };
        out.extend(
            elements
                .iter()
                .enumerate()
                .filter(|(_, el)| el.matches(selector))
                .map(|(i, _)| Node::OverlayEl(i)),
        );
    }

    fn element(&self, node: Node) -> Option<&FakeElement> {
        match node {
            Node::PageEl(i) => self.elements.get(i),
            Node::DialogEl(i) => self.dialog.as_ref()?.elements.get(i),
            Node::OverlayEl(i) => self.overlay.as_ref()?.get(i),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: Node) -> Option<&mut FakeElement> {
        match node {
            Node::PageEl(i) => self.elements.get_mut(i),
            Node::DialogEl(i) => self.dialog.as_mut()?.elements.get_mut(i),
            Node::OverlayEl(i) => self.overlay.as_mut()?.get_mut(i),
            _ => None,
        }
    }

    fn visible(&self, node: Node) -> bool {
        match node {
            Node::Dialog | Node::DialogHeading => self.dialog.is_some(),
            Node::Overlay => self.overlay.is_some(),
            _ => self.element(node).is_some_and(|el| el.visible),
        }
    }

    fn text(&self, node: Node) -> Option<String> {
        match node {
            Node::Dialog => self.dialog.as_ref().map(FakeDialog::text_content),
            Node::DialogHeading => self.dialog.as_ref().and_then(|d| d.title.clone()),
            Node::Overlay => self
                .overlay
                .as_ref()
                .map(|els| els.iter().map(|el| el.text.as_str()).collect::<Vec<_>>().join(" ")),
            _ => self.element(node).map(|el| el.text.clone()),
        }
    }

    /// First visible match, or a timeout error naming the locator
    fn first_visible(&self, locator: &Locator, timeout: Duration) -> Result<Node, BrowserError> {
        self.resolve(locator)
            .into_iter()
            .find(|node| self.visible(*node))
            .ok_or_else(|| BrowserError::Timeout {
                what: locator.describe(),
                after: timeout,
            })
    }

    fn apply(&mut self, effect: FakeEffect) {
        match effect {
            FakeEffect::CloseDialog => self.dialog = None,
            FakeEffect::HideOverlay => self.overlay = None,
            FakeEffect::Navigate(url) => self.url = url,
            FakeEffect::OpenDialog(dialog) => self.dialog = Some(dialog),
        }
    }
}

fn is_dialog_selector(selector: &Selector) -> bool {
    match selector {
        Selector::Role { role, .. } => role == "dialog",
        Selector::Css(css) => css == "[aria-modal='true']" || css == "[role='dialog']",
        _ => false,
    }
}

/// Timeout used when an operation carries none of its own
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// In-memory `Page` implementation.
#[derive(Debug, Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                url: url.to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_element(self, element: FakeElement) -> Self {
        self.add_element(element);
        self
    }

    pub fn add_element(&self, element: FakeElement) {
        self.state.lock().elements.push(element);
    }

    pub fn open_dialog(&self, dialog: FakeDialog) {
        self.state.lock().dialog = Some(dialog);
    }

    pub fn close_dialog(&self) {
        self.state.lock().dialog = None;
    }

    pub fn dialog_open(&self) -> bool {
        self.state.lock().dialog.is_some()
    }

    /// Show the consent overlay with the given buttons inside it
    pub fn show_overlay(&self, elements: Vec<FakeElement>) {
        self.state.lock().overlay = Some(elements);
    }

    pub fn overlay_visible(&self) -> bool {
        self.state.lock().overlay.is_some()
    }

    /// Delay applied to every interaction (click, fill, type, press)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Interaction log, oldest first
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    /// Current value of the first element the locator matches
    pub fn value(&self, locator: &Locator) -> Option<String> {
        let state = self.state.lock();
        let node = state.resolve(locator).into_iter().next()?;
        state.element(node).map(|el| el.value.clone())
    }

    pub fn cookies_cleared(&self) -> bool {
        self.state.lock().cookies_cleared
    }

    pub fn storage_cleared(&self) -> bool {
        self.state.lock().storage_cleared
    }

    async fn pause(&self) {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(state: &mut FakeState, action: String) {
        log::trace!("fake page: {}", action);
        state.actions.push(action);
    }
}

#[async_trait]
impl Page for FakePage {
    fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.url = url.to_string();
        Self::record(&mut state, format!("goto:{}", url));
        Ok(())
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError> {
        Ok(self.state.lock().resolve(locator).len())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let state = self.state.lock();
        Ok(state
            .resolve(locator)
            .first()
            .is_some_and(|node| state.visible(*node)))
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock();
        Ok(state
            .resolve(locator)
            .first()
            .and_then(|node| state.text(*node)))
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        self.pause().await;
        let mut state = self.state.lock();
        let node = state.first_visible(locator, timeout)?;
        let effect = state.element(node).and_then(|el| el.on_click.clone());
        Self::record(&mut state, format!("click:{}", locator.describe()));
        if let Some(effect) = effect {
            state.apply(effect);
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), BrowserError> {
        self.pause().await;
        let mut state = self.state.lock();
        let node = state.first_visible(locator, DEFAULT_ACTION_TIMEOUT)?;
        let element = state
            .element_mut(node)
            .ok_or_else(|| BrowserError::Other(format!("{} is not fillable", locator.describe())))?;
        element.value = value.to_string();
        Self::record(&mut state, format!("fill:{}={}", locator.describe(), value));
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str, _delay: Duration) -> Result<(), BrowserError> {
        self.pause().await;
        let mut state = self.state.lock();
        let node = state.first_visible(locator, DEFAULT_ACTION_TIMEOUT)?;
        let element = state
            .element_mut(node)
            .ok_or_else(|| BrowserError::Other(format!("{} is not editable", locator.describe())))?;
        element.value.push_str(text);
        Self::record(&mut state, format!("type:{}={}", locator.describe(), text));
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<(), BrowserError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.first_visible(locator, DEFAULT_ACTION_TIMEOUT)?;
        Self::record(&mut state, format!("press:{}:{}", locator.describe(), key));
        Ok(())
    }

    async fn keyboard_press(&self, key: &str) -> Result<(), BrowserError> {
        self.pause().await;
        let mut state = self.state.lock();
        if key == "Escape" {
            state.dialog = None;
        }
        Self::record(&mut state, format!("key:{}", key));
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, wait: WaitState, timeout: Duration) -> Result<(), BrowserError> {
        let state = self.state.lock();
        let any_visible = state.resolve(locator).into_iter().any(|node| state.visible(node));
        match (wait, any_visible) {
            (WaitState::Visible, true) | (WaitState::Hidden, false) => Ok(()),
            _ => Err(BrowserError::Timeout {
                what: locator.describe(),
                after: timeout,
            }),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        Self::record(&mut state, format!("screenshot:{}", path.display()));
        Ok(())
    }

    async fn clear_cookies(&self) -> Result<(), BrowserError> {
        self.state.lock().cookies_cleared = true;
        Ok(())
    }

    async fn clear_storage(&self) -> Result<(), BrowserError> {
        self.state.lock().storage_cleared = true;
        Ok(())
    }
}

/// Environment factory handing out one shared `FakePage`.
///
/// The first `failures` opens fail, to exercise setup retries.
#[derive(Debug)]
pub struct FakeEnvironment {
    page: Arc<FakePage>,
    failures: Mutex<u32>,
    opens: Mutex<u32>,
}

impl FakeEnvironment {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self::failing(page, 0)
    }

    pub fn failing(page: Arc<FakePage>, failures: u32) -> Self {
        Self {
            page,
            failures: Mutex::new(failures),
            opens: Mutex::new(0),
        }
    }

    /// Successful opens so far
    pub fn opens(&self) -> u32 {
        *self.opens.lock()
    }
}

#[async_trait]
impl EnvironmentFactory for FakeEnvironment {
    async fn open(&self, store: &StoreConfig) -> Result<Arc<dyn Page>, BrowserError> {
        {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(BrowserError::Other("browser failed to start".to_string()));
            }
        }
        self.page.goto(&store.base_url).await?;
        *self.opens.lock() += 1;
        Ok(self.page.clone())
    }
}
