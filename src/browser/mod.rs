//! Browser boundary.
//!
//! The engine drives a live page only through the `Page` trait. A real
//! implementation wraps a browser-automation driver; `FakePage` is an in-memory
//! stand-in used by tests and dry runs.

mod fake;
mod locator;
mod observe;

pub use fake::{FakeDialog, FakeEffect, FakeElement, FakeEnvironment, FakePage};
pub use locator::{Locator, Selector, text_matches};
pub use observe::{OVERLAY_SELECTOR, PageSnapshot, describe_dialog, find_dialog, observe};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StoreConfig;

/// Errors raised by page operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("no element matches {0}")]
    NotFound(String),

    #[error("timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("page closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Page load milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Element states a caller can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Hidden,
}

/// A live, stateful page.
///
/// Element operations act on the first element the locator matches.
#[async_trait]
pub trait Page: Send + Sync {
    /// Current URL
    fn url(&self) -> String;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<(), BrowserError>;

    /// Number of elements matched
    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError>;

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>, BrowserError>;

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the element's value
    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), BrowserError>;

    /// Type character by character with `delay` between keystrokes
    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> Result<(), BrowserError>;

    /// Press a key with the element focused
    async fn press(&self, locator: &Locator, key: &str) -> Result<(), BrowserError>;

    /// Press a key on whatever has focus
    async fn keyboard_press(&self, key: &str) -> Result<(), BrowserError>;

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> Result<(), BrowserError>;

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;

    async fn clear_cookies(&self) -> Result<(), BrowserError>;

    /// Clear local and session storage
    async fn clear_storage(&self) -> Result<(), BrowserError>;
}

/// Opens fresh pages for runs.
#[async_trait]
pub trait EnvironmentFactory: Send + Sync {
    async fn open(&self, store: &StoreConfig) -> Result<Arc<dyn Page>, BrowserError>;
}
