//! Observation records produced by tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of executing one tool call.
///
/// Every dispatched call yields exactly one of these, including calls that were
/// rejected by policy, timed out, or failed inside the tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Whether the action succeeded
    pub ok: bool,
    /// Tool-specific payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    /// Failure description when `ok` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Screenshot captured alongside the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl Observation {
    /// Successful observation with no payload
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    /// Successful observation carrying a JSON object payload.
    ///
    /// Non-object values are stored under `value`.
    pub fn ok_data(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            ok: true,
            data,
            ..Default::default()
        }
    }

    /// Failed observation
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Add a payload field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Attach a screenshot path
    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot = Some(path.into());
        self
    }

    /// Read a string payload field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Compact JSON form sent back to the model as the tool result
    pub fn to_model_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"ok\":{}}}", self.ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_data_object() {
        let obs = Observation::ok_data(json!({"count": 3}));
        assert!(obs.ok);
        assert_eq!(obs.data["count"], 3);
        assert!(obs.error.is_none());
    }

    #[test]
    fn test_ok_data_wraps_scalar() {
        let obs = Observation::ok_data(json!("41301"));
        assert_eq!(obs.str_field("value"), Some("41301"));
    }

    #[test]
    fn test_failure_with_screenshot() {
        let obs = Observation::failure("element not found").with_screenshot("logs/error_click.png");
        assert!(!obs.ok);
        assert_eq!(obs.error.as_deref(), Some("element not found"));
        assert_eq!(obs.screenshot.as_deref(), Some("logs/error_click.png"));
    }

    #[test]
    fn test_model_content_skips_empty_fields() {
        let content = Observation::ok().to_model_content();
        assert_eq!(content, r#"{"ok":true}"#);
    }

    #[test]
    fn test_roundtrip_defaults_missing_fields() {
        let obs: Observation = serde_json::from_str(r#"{"ok":false,"error":"boom"}"#).unwrap();
        assert!(obs.data.is_empty());
        assert_eq!(obs.error.as_deref(), Some("boom"));
    }
}
