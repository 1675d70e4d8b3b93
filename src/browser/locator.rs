//! Element addressing.
//!
//! A `Locator` names elements the way a browser-automation driver does: by CSS,
//! visible text, ARIA role, label or placeholder, optionally scoped to the
//! elements matched by another locator (typically the open dialog).

/// What a locator matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    /// Visible text; substring and case-insensitive unless `exact`
    Text { text: String, exact: bool },
    /// Case-insensitive regular expression over visible text
    TextPattern(String),
    /// ARIA role with an optional accessible name
    Role {
        role: String,
        name: Option<String>,
        exact: bool,
    },
    Label { label: String, exact: bool },
    Placeholder { text: String, exact: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub selector: Selector,
    pub scope: Option<Box<Locator>>,
}

impl Locator {
    fn from_selector(selector: Selector) -> Self {
        Self { selector, scope: None }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    pub fn text(text: impl Into<String>, exact: bool) -> Self {
        Self::from_selector(Selector::Text {
            text: text.into(),
            exact,
        })
    }

    pub fn text_pattern(pattern: impl Into<String>) -> Self {
        Self::from_selector(Selector::TextPattern(pattern.into()))
    }

    pub fn role(role: impl Into<String>, name: Option<String>) -> Self {
        Self::from_selector(Selector::Role {
            role: role.into(),
            name,
            exact: false,
        })
    }

    pub fn role_exact(role: impl Into<String>, name: Option<String>, exact: bool) -> Self {
        Self::from_selector(Selector::Role {
            role: role.into(),
            name,
            exact,
        })
    }

    pub fn label(label: impl Into<String>, exact: bool) -> Self {
        Self::from_selector(Selector::Label {
            label: label.into(),
            exact,
        })
    }

    pub fn placeholder(text: impl Into<String>, exact: bool) -> Self {
        Self::from_selector(Selector::Placeholder {
            text: text.into(),
            exact,
        })
    }

    /// Restrict matches to descendants of `scope`
    pub fn within(mut self, scope: &Locator) -> Self {
        self.scope = Some(Box::new(scope.clone()));
        self
    }

    /// Short human-readable form used in diagnostics and action logs
    pub fn describe(&self) -> String {
        let own = match &self.selector {
            Selector::Css(css) => css.clone(),
            Selector::Text { text, .. } => format!("text={}", text),
            Selector::TextPattern(pattern) => format!("text~/{}/i", pattern),
            Selector::Role { role, name: Some(name), .. } => format!("role={}[name={}]", role, name),
            Selector::Role { role, name: None, .. } => format!("role={}", role),
            Selector::Label { label, .. } => format!("label={}", label),
            Selector::Placeholder { text, .. } => format!("placeholder={}", text),
        };
        match &self.scope {
            Some(scope) => format!("{} >> {}", scope.describe(), own),
            None => own,
        }
    }
}

/// Match `candidate` against `wanted` with locator text semantics.
pub fn text_matches(candidate: &str, wanted: &str, exact: bool) -> bool {
    if exact {
        candidate.trim() == wanted.trim()
    } else {
        candidate.to_lowercase().contains(&wanted.trim().to_lowercase())
    }
}
