//! Conversation state carried across steps of one run

use serde_json::Value;

use crate::domain::Observation;
use crate::llm::{CompletionResponse, Message, ToolCall};

/// Prefix of the message carrying a remembered dialog resolution
pub const KNOWN_RESOLUTION: &str = "KNOWN_RESOLUTION";
/// Prefix of runner-authored guidance
pub const CONTEXT_HINT: &str = "CONTEXT_HINT";
/// Prefix of the page snapshot sent after a turn without tool calls
pub const CONTEXT_AUTO_OBSERVE: &str = "CONTEXT_AUTO_OBSERVE";

/// Message history sent to the model on every step.
///
/// Unlike the system prompt, which is fixed per run, the transcript grows:
/// the goal, each assistant turn, each tool result and any context the runner
/// injects between steps.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(goal: &str) -> Self {
        Self {
            messages: vec![Message::user(goal)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `PREFIX: {json}` as a user message
    pub fn push_context(&mut self, prefix: &str, body: &Value) {
        self.messages.push(Message::user(format!("{}: {}", prefix, body)));
    }

    pub fn push_hint(&mut self, text: &str) {
        self.messages.push(Message::user(format!("{}: {}", CONTEXT_HINT, text)));
    }

    /// Record the assistant turn. Tool calls must already carry their ids.
    pub fn push_assistant(&mut self, response: &CompletionResponse, calls: &[ToolCall]) {
        if calls.is_empty() {
            if !response.content.is_empty() {
                self.messages.push(Message::assistant(response.content.clone()));
            }
        } else {
            self.messages
                .push(Message::assistant_with_tools(response.content.clone(), calls.to_vec()));
        }
    }

    pub fn push_tool_result(&mut self, call_id: &str, obs: &Observation) {
        self.messages
            .push(Message::tool_result(call_id, obs.to_model_content()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use serde_json::json;

    #[test]
    fn test_starts_with_goal() {
        let transcript = Transcript::new("Log in to coop.se");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::User);
        assert_eq!(transcript.messages()[0].content, "Log in to coop.se");
    }

    #[test]
    fn test_context_prefix() {
        let mut transcript = Transcript::new("goal");
        transcript.push_context(CONTEXT_AUTO_OBSERVE, &json!({"modal_present": false}));
        assert_eq!(
            transcript.messages()[1].content,
            r#"CONTEXT_AUTO_OBSERVE: {"modal_present":false}"#
        );
    }

    #[test]
    fn test_tool_turn_and_results() {
        let mut transcript = Transcript::new("goal");
        let calls = vec![ToolCall::new("call-1", "current_url", json!({}))];
        let response = CompletionResponse::with_tool_calls(calls.clone());
        transcript.push_assistant(&response, &calls);
        transcript.push_tool_result("call-1", &Observation::ok().with("url", "https://www.coop.se/"));

        let messages = transcript.messages();
        assert_eq!(messages[1].tool_calls.len(), 1);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call-1"));
        assert!(messages[2].content.contains("coop.se"));
    }

    #[test]
    fn test_empty_text_turn_not_recorded() {
        let mut transcript = Transcript::new("goal");
        transcript.push_assistant(&CompletionResponse::default(), &[]);
        assert_eq!(transcript.len(), 1);
    }
}
