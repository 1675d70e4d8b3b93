//! Read-only page snapshot taken when the model proposes no action.

use serde::{Deserialize, Serialize};

use super::{Locator, Page};

/// Consent-manager container that blocks the page until dismissed
pub const OVERLAY_SELECTOR: &str = "#cmpwrapper";

const MODAL_TEXT_LIMIT: usize = 300;

const POSTCODE_KEYWORDS: &[&str] = &[
    "postnummer",
    "var är du",
    "hitta butik",
    "leveransadress",
    "postcode",
    "postal code",
    "zip code",
    "delivery address",
];

/// What the page looks like right now.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    /// Consent/cookie overlay visible
    pub overlay: bool,
    pub modal_present: bool,
    pub modal_title: Option<String>,
    /// Dialog text, trimmed and truncated
    pub modal_text: Option<String>,
    /// Coarse dialog classification (`postcode`)
    pub modal_kind: Option<String>,
}

/// Locate a visible dialog: `role=dialog` first, then `[aria-modal='true']`.
pub async fn find_dialog(page: &dyn Page) -> Option<Locator> {
    let candidates = [Locator::role("dialog", None), Locator::css("[aria-modal='true']")];
    for candidate in candidates {
        let present = page.count(&candidate).await.map(|n| n > 0).unwrap_or(false);
        if present && page.is_visible(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

/// Heading and text of a dialog, best effort.
pub async fn describe_dialog(page: &dyn Page, dialog: &Locator) -> (Option<String>, Option<String>) {
    let heading = Locator::role("heading", None).within(dialog);
    let title = match page.count(&heading).await {
        Ok(n) if n > 0 => page
            .text_content(&heading)
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        _ => None,
    };

    let text = page
        .text_content(dialog)
        .await
        .ok()
        .flatten()
        .map(|t| truncate_chars(t.trim(), MODAL_TEXT_LIMIT))
        .filter(|t| !t.is_empty());

    (title, text)
}

/// Take a snapshot of the page. Query failures degrade to "not present".
pub async fn observe(page: &dyn Page) -> PageSnapshot {
    let overlay_locator = Locator::css(OVERLAY_SELECTOR);
    let overlay = match page.count(&overlay_locator).await {
        Ok(n) if n > 0 => page.is_visible(&overlay_locator).await.unwrap_or(false),
        _ => false,
    };

    let mut snapshot = PageSnapshot {
        url: page.url(),
        overlay,
        ..Default::default()
    };

    if let Some(dialog) = find_dialog(page).await {
        let (title, text) = describe_dialog(page, &dialog).await;
        snapshot.modal_present = true;
        snapshot.modal_kind = classify_modal(text.as_deref().unwrap_or_default());
        snapshot.modal_title = title;
        snapshot.modal_text = text;
    }

    snapshot
}

fn classify_modal(text: &str) -> Option<String> {
    let low = text.to_lowercase();
    POSTCODE_KEYWORDS
        .iter()
        .any(|k| low.contains(k))
        .then(|| "postcode".to_string())
}

fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
