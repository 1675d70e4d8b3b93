//! OpenAI-compatible chat-completions client
//!
//! Implements `LlmClient` against `{base_url}/chat/completions` with native
//! tool calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, Usage};
use crate::config::{AgentsConfig, LlmConfig};

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAiConfig {
    pub fn from_config(llm: &LlmConfig, agents: &AgentsConfig) -> Self {
        Self {
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: agents.model.clone(),
            temperature: agents.temperature,
            timeout: Duration::from_millis(llm.timeout_ms),
        }
    }
}

/// OpenAI-compatible API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a client reading the API key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                env_var: api_key_env.to_string(),
            })?;
        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build the request body
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.clone().unwrap_or_else(|| self.config.model.clone());
        let temperature = request.temperature.unwrap_or(self.config.temperature);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        messages.extend(request.messages.iter().map(message_to_json));

        let mut body = json!({
            "model": model,
            "temperature": temperature,
            "messages": messages
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_openai_schema()).collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        if request.json_output {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        let message = &choice["message"];

        let content = message["content"].as_str().unwrap_or_default().to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| calls.iter().map(parse_tool_call).collect())
            .unwrap_or_default();

        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["prompt_tokens"].as_u64().unwrap_or(0),
                    u["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            tool_calls,
            stop_reason: StopReason::from_finish_reason(choice["finish_reason"].as_str()),
            usage,
            terminate: false,
        })
    }

    /// Send a request to the API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

fn message_to_json(message: &Message) -> Value {
    match message.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content
        }),
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.input.to_string()}
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        Role::System => json!({"role": "system", "content": message.content}),
        Role::User => json!({"role": "user", "content": message.content}),
        Role::Assistant => json!({"role": "assistant", "content": message.content}),
    }
}

/// Arguments arrive as a JSON string; an unparsable string is kept under `_raw`
/// so argument validation rejects it with a readable message.
fn parse_tool_call(call: &Value) -> ToolCall {
    let id = call["id"].as_str().unwrap_or_default().to_string();
    let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
    let input = match &call["function"]["arguments"] {
        Value::String(raw) if raw.trim().is_empty() => json!({}),
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| json!({"_raw": raw})),
        Value::Object(map) => Value::Object(map.clone()),
        _ => json!({}),
    };
    ToolCall::new(id, name, input)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;

    fn client() -> OpenAiClient {
        OpenAiClient::with_api_key("test-key".to_string(), OpenAiConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiClient::from_env("CARTPILOT_TEST_UNSET_KEY", OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn test_from_config() {
        let mut llm = LlmConfig::default();
        llm.base_url = "http://localhost:8080/v1/".to_string();
        let config = OpenAiConfig::from_config(&llm, &AgentsConfig::default());
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_build_request_with_transcript() {
        let call = ToolCall::new("call_1", "click", json!({"selector": "#buy"}));
        let request = CompletionRequest::new("You are helpful")
            .with_user_message("Buy milk")
            .with_message(Message::assistant_with_tools("", vec![call]))
            .with_message(Message::tool_result("call_1", "{\"ok\":true}"))
            .with_tools(vec![ToolDefinition::new("click", "Click", json!({"type": "object"}))]);

        let body = client().build_request(&request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Buy milk");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "click");
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"selector\":\"#buy\"}"
        );
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "click");
        assert_eq!(body["tool_choice"], "auto");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_build_request_json_output() {
        let request = CompletionRequest::new("Reply in JSON")
            .with_user_message("Hej")
            .with_temperature(0.3)
            .with_json_output();

        let body = client().build_request(&request);

        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], json!(0.3f32));
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "goto", "arguments": "{\"url\":\"https://www.coop.se/\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        });

        let resp = client().parse_response(body).unwrap();
        assert!(resp.content.is_empty());
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_abc");
        assert_eq!(resp.tool_calls[0].input["url"], "https://www.coop.se/");
        assert_eq!(resp.usage.total(), 150);
    }

    #[test]
    fn test_parse_response_bad_arguments_kept_raw() {
        let call = json!({"id": "c", "function": {"name": "click", "arguments": "{not json"}});
        let parsed = parse_tool_call(&call);
        assert_eq!(parsed.input["_raw"], "{not json");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = client().parse_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
