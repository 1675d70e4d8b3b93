//! Obstacle signatures and recipes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_TITLE_KEYWORDS: usize = 6;
pub const MAX_TEXT_KEYWORDS: usize = 10;

const UNKNOWN_SITE: &str = "unknown";

/// Identifies an obstacle (typically a dialog) on a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleSignature {
    /// Lowercase hostname
    pub site: String,
    #[serde(default)]
    pub title_keywords: Vec<String>,
    #[serde(default)]
    pub text_keywords: Vec<String>,
}

impl ObstacleSignature {
    /// Build a normalized signature: lowercase site, keyword lists capped.
    pub fn new(site: &str, title_keywords: Vec<String>, text_keywords: Vec<String>) -> Self {
        let site = site.trim().to_lowercase();
        Self {
            site: if site.is_empty() { UNKNOWN_SITE.to_string() } else { site },
            title_keywords: title_keywords.into_iter().take(MAX_TITLE_KEYWORDS).collect(),
            text_keywords: text_keywords.into_iter().take(MAX_TEXT_KEYWORDS).collect(),
        }
    }

    /// Signature of a dialog seen at `page_url`.
    pub fn from_dialog(page_url: &str, title: Option<&str>, text: Option<&str>) -> Self {
        let site = url::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        Self::new(
            &site,
            keywords(title.unwrap_or_default(), MAX_TITLE_KEYWORDS),
            keywords(text.unwrap_or_default(), MAX_TEXT_KEYWORDS),
        )
    }

    /// Keyword overlap: shared title keywords plus shared text keywords.
    pub fn score(&self, other: &ObstacleSignature) -> usize {
        overlap(&self.title_keywords, &other.title_keywords) + overlap(&self.text_keywords, &other.text_keywords)
    }

    /// Stable key used to avoid repeating hints for the same obstacle
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.site,
            self.title_keywords.join(" "),
            self.text_keywords.join(" ")
        )
    }
}

/// First `limit` whitespace tokens of the lowercased text
fn keywords(text: &str, limit: usize) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn overlap(a: &[String], b: &[String]) -> usize {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.intersection(&b).count()
}

/// One tool call of a resolution recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl RecipeStep {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self { tool: tool.into(), args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_normalizes() {
        let sig = ObstacleSignature::new(
            "WWW.Coop.SE",
            (0..10).map(|i| format!("t{}", i)).collect(),
            (0..20).map(|i| format!("x{}", i)).collect(),
        );
        assert_eq!(sig.site, "www.coop.se");
        assert_eq!(sig.title_keywords.len(), MAX_TITLE_KEYWORDS);
        assert_eq!(sig.text_keywords.len(), MAX_TEXT_KEYWORDS);
    }

    #[test]
    fn test_empty_site_is_unknown() {
        assert_eq!(ObstacleSignature::new("", vec![], vec![]).site, "unknown");
    }

    #[test]
    fn test_from_dialog() {
        let sig = ObstacleSignature::from_dialog(
            "https://www.coop.se/handla/varor",
            Some("Var är du?"),
            Some("Ange ditt Postnummer så visar vi rätt sortiment"),
        );
        assert_eq!(sig.site, "www.coop.se");
        assert_eq!(sig.title_keywords, vec!["var", "är", "du?"]);
        assert_eq!(sig.text_keywords[2], "postnummer");
    }

    #[test]
    fn test_score_counts_both_sets() {
        let a = ObstacleSignature::new("s", vec!["var".into(), "är".into()], vec!["postnummer".into(), "ange".into()]);
        let b = ObstacleSignature::new("s", vec!["var".into()], vec!["ange".into(), "postnummer".into(), "x".into()]);
        assert_eq!(a.score(&b), 3);
    }

    #[test]
    fn test_score_zero_without_overlap() {
        let a = ObstacleSignature::new("s", vec!["cookies".into()], vec![]);
        let b = ObstacleSignature::new("s", vec!["postnummer".into()], vec![]);
        assert_eq!(a.score(&b), 0);
    }

    #[test]
    fn test_recipe_step_serde() {
        let step: RecipeStep = serde_json::from_value(json!({"tool": "modal_close"})).unwrap();
        assert_eq!(step.tool, "modal_close");
        assert!(step.args.is_null());
    }
}
