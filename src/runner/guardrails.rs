//! Pre-dispatch checks and argument handling for tool calls

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::Observation;
use crate::llm::ToolCall;
use crate::tools::ToolError;

/// Marker the prompts use for values the model must look up first
pub const HINT_MARKER: &str = "_FROM_HINT";

/// Argument keys tried, in order, for timeout diagnostics
const PRIMARY_ARG_KEYS: &[&str] = &["key", "selector", "text", "label", "url", "role"];

/// `value` placeholders replaced by the last `get_config` result
const FILL_PLACEHOLDERS: &[&str] = &["", "<to-be-filled>", "<value>"];

const FILL_TOOLS: &[&str] = &["fill_label", "modal_fill_label"];

const REDACTED: &str = "***";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\$\{[A-Za-z_][A-Za-z0-9_]*\}").unwrap()
});

/// Reject calls outside the allowed set, then calls carrying unresolved placeholders.
pub fn check(call: &ToolCall, allowed: &HashSet<String>) -> Result<(), ToolError> {
    if !allowed.contains(&call.name) {
        return Err(ToolError::NotAllowed(call.name.clone()));
    }
    if contains_placeholder(&call.input) {
        return Err(ToolError::PlaceholderViolation {
            tool: call.name.clone(),
        });
    }
    Ok(())
}

/// True when any string anywhere in `value` holds a placeholder marker
pub fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(s) => PLACEHOLDER.is_match(s) || s.contains(HINT_MARKER),
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        _ => false,
    }
}

/// Fill an empty or placeholder `value` of a fill tool with the last config value.
///
/// Returns true when the arguments were changed.
pub fn substitute_fill_value(call: &mut ToolCall, last_config_value: Option<&str>) -> bool {
    let Some(replacement) = last_config_value else {
        return false;
    };
    if !FILL_TOOLS.contains(&call.name.as_str()) {
        return false;
    }
    let Some(args) = call.input.as_object_mut() else {
        return false;
    };
    let needs_value = match args.get("value") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => FILL_PLACEHOLDERS.contains(&s.trim()),
        Some(_) => false,
    };
    if needs_value {
        args.insert("value".to_string(), Value::String(replacement.to_string()));
    }
    needs_value
}

/// `key=value` for the first present primary argument, e.g. `selector=#buy`
pub fn primary_arg(args: &Value) -> Option<String> {
    PRIMARY_ARG_KEYS.iter().find_map(|key| {
        let value = args.get(*key)?;
        let shown = match value {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        Some(format!("{}={}", key, shown))
    })
}

/// Scrubs secret values out of anything that leaves the run (logs, events,
/// traces, persisted recipes). The transcript sent to the model is untouched.
#[derive(Debug, Default)]
pub struct Redactor {
    secrets: HashSet<String>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the value returned by a secret or human-input tool
    pub fn learn(&mut self, tool: &str, obs: &Observation) {
        if !obs.ok || !matches!(tool, "get_secret" | "request_input") {
            return;
        }
        if let Some(value) = obs.str_field("value").filter(|v| !v.is_empty()) {
            self.secrets.insert(value.to_string());
        }
    }

    pub fn scrub(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.scrub_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.scrub(v)).collect()),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), self.scrub(v))).collect()),
            other => other.clone(),
        }
    }

    pub fn scrub_observation(&self, obs: &Observation) -> Observation {
        let mut scrubbed = obs.clone();
        scrubbed.data = obs
            .data
            .iter()
            .map(|(k, v)| (k.clone(), self.scrub(v)))
            .collect();
        scrubbed.error = obs.error.as_deref().map(|e| self.scrub_str(e));
        scrubbed
    }

    fn scrub_str(&self, s: &str) -> String {
        self.secrets
            .iter()
            .fold(s.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allowed(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_not_allowed_checked_first() {
        let call = ToolCall::new("c1", "get_secret", json!({"name": "${PASSWORD}"}));
        let err = check(&call, &allowed(&["fill_label"])).unwrap_err();
        assert!(matches!(err, ToolError::NotAllowed(ref name) if name == "get_secret"));
    }

    #[test]
    fn test_placeholder_rejected() {
        let call = ToolCall::new("c1", "fill_label", json!({"label": "Lösenord", "value": "${PASSWORD}"}));
        let err = check(&call, &allowed(&["fill_label"])).unwrap_err();
        assert!(matches!(err, ToolError::PlaceholderViolation { .. }));
    }

    #[test]
    fn test_placeholder_nested() {
        assert!(contains_placeholder(&json!({"a": [{"b": "prefix ${TOKEN} suffix"}]})));
        assert!(contains_placeholder(&json!({"value": "POSTCODE_FROM_HINT"})));
        assert!(!contains_placeholder(&json!({"value": "$5 off", "n": 3})));
        assert!(!contains_placeholder(&json!({"value": "${}"})));
    }

    #[test]
    fn test_clean_call_passes() {
        let call = ToolCall::new("c1", "click_text", json!({"text": "Logga in"}));
        assert!(check(&call, &allowed(&["click_text"])).is_ok());
    }

    #[test]
    fn test_substitute_fill_value() {
        let mut call = ToolCall::new("c1", "modal_fill_label", json!({"label": "Postnummer", "value": "<value>"}));
        assert!(substitute_fill_value(&mut call, Some("41301")));
        assert_eq!(call.input["value"], "41301");

        let mut call = ToolCall::new("c1", "fill_label", json!({"label": "Postnummer", "value": "11122"}));
        assert!(!substitute_fill_value(&mut call, Some("41301")));
        assert_eq!(call.input["value"], "11122");

        let mut call = ToolCall::new("c1", "click_text", json!({"text": ""}));
        assert!(!substitute_fill_value(&mut call, Some("41301")));
    }

    #[test]
    fn test_substitute_without_config_value() {
        let mut call = ToolCall::new("c1", "fill_label", json!({"label": "Postnummer", "value": ""}));
        assert!(!substitute_fill_value(&mut call, None));
    }

    #[test]
    fn test_primary_arg_order() {
        assert_eq!(primary_arg(&json!({"selector": "#buy"})).as_deref(), Some("selector=#buy"));
        assert_eq!(
            primary_arg(&json!({"text": "Köp", "key": "Enter"})).as_deref(),
            Some("key=Enter")
        );
        assert_eq!(primary_arg(&json!({"timeout_ms": 10})), None);
    }

    #[test]
    fn test_redactor_scrubs_learned_secrets() {
        let mut redactor = Redactor::new();
        redactor.learn("get_secret", &Observation::ok().with("value", "hunter2"));
        redactor.learn("current_url", &Observation::ok().with("value", "visible"));

        let scrubbed = redactor.scrub(&json!({"label": "Lösenord", "value": "hunter2", "text": "visible"}));
        assert_eq!(scrubbed["value"], "***");
        assert_eq!(scrubbed["text"], "visible");

        let obs = redactor.scrub_observation(&Observation::ok().with("value", "hunter2"));
        assert_eq!(obs.str_field("value"), Some("***"));
    }
}
