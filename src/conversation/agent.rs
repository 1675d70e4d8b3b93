//! Conversation model: intent recognition without tools

use std::sync::Arc;

use super::decision::ConversationDecision;
use super::state::SessionContext;
use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompt::PromptLibrary;
use crate::workflow::RetryPolicy;

/// Prompt template for the conversation model
pub const CONVERSATION_PROMPT: &str = "conversation";

/// Most recent messages kept in a conversation and sent to the model
pub const HISTORY_LIMIT: usize = 50;

const CONVERSATION_TEMPERATURE: f32 = 0.3;

/// Turns one customer message into a [`ConversationDecision`].
pub struct ConversationAgent {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: Option<String>,
    policy: RetryPolicy,
}

impl ConversationAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            llm,
            prompts,
            model: None,
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>, agents: &AgentsConfig) -> Self {
        Self::new(llm, prompts).with_model(agents.model.clone())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Retry policy for transient model failures
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide on `user_message` given the earlier `history`.
    ///
    /// Unusable model output becomes a clarification fallback; only model
    /// call failures are errors.
    pub async fn decide(
        &self,
        user_message: &str,
        history: &[Message],
        session: &SessionContext,
        clarification_count: u32,
    ) -> Result<ConversationDecision> {
        let request = self.request(user_message, history, session, clarification_count)?;

        let mut attempt = 1;
        let response = loop {
            match self.llm.complete(request.clone()).await {
                Ok(response) => break response,
                Err(e) if e.is_retryable() && attempt < self.policy.maximum_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    log::warn!("Conversation model call failed (attempt {}), retrying in {:?}: {}", attempt, delay, e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Conversation model call failed: {}", e);
                    return Err(AgentError::Llm(e.to_string()));
                }
            }
        };

        let decision = ConversationDecision::parse(&response.content).enforce(clarification_count);
        log::debug!(
            "conversation.decision intent={} confidence={} next_action={:?}",
            decision.intent,
            decision.confidence,
            decision.next_action
        );
        Ok(decision)
    }

    fn request(
        &self,
        user_message: &str,
        history: &[Message],
        session: &SessionContext,
        clarification_count: u32,
    ) -> Result<CompletionRequest> {
        let system = self.prompts.template(CONVERSATION_PROMPT)?;
        let recent = &history[history.len().saturating_sub(HISTORY_LIMIT)..];

        let mut content = format!("{}\n\n[SESSION_CONTEXT: {}]", user_message, serde_json::to_string(session)?);
        if clarification_count > 0 {
            content.push_str(&format!("\n[CLARIFICATION_COUNT: {}]", clarification_count));
        }

        let mut request = CompletionRequest::new(system)
            .with_temperature(CONVERSATION_TEMPERATURE)
            .with_json_output();
        request.messages = recent.to_vec();
        request.messages.push(Message::user(content));
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::decision::{NextAction, UNPARSED_REPLY};
    use crate::llm::{CompletionResponse, LlmError, MockLlmClient, Role};
    use std::time::Duration;

    fn agent(llm: Arc<MockLlmClient>) -> ConversationAgent {
        ConversationAgent::new(llm, Arc::new(PromptLibrary::builtin())).with_policy(RetryPolicy {
            maximum_attempts: 2,
            initial_interval: Duration::from_millis(100),
            maximum_interval: Duration::from_millis(100),
            backoff_coefficient: 1.0,
        })
    }

    fn reply(json: &str) -> CompletionResponse {
        CompletionResponse::text(json)
    }

    const GREETING: &str = r#"{"intent": "greeting", "confidence": 0.95, "conversation_response": "Hej! Vad vill du handla?", "next_action": "respond"}"#;

    #[tokio::test]
    async fn test_request_carries_context_and_json_mode() {
        let llm = Arc::new(MockLlmClient::new(vec![reply(GREETING)]));
        let history = vec![Message::user("hej"), Message::assistant("Hej!")];

        let decision = agent(llm.clone())
            .with_model("gpt-4o")
            .decide("jag vill handla", &history, &SessionContext::default(), 2)
            .await
            .unwrap();

        assert_eq!(decision.next_action, NextAction::Respond);
        let request = &llm.requests()[0];
        assert!(request.json_output);
        assert!(request.tools.is_empty());
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
        assert!(request.system.starts_with("# Conversation assistant"));
        assert_eq!(request.messages.len(), 3);
        let last = &request.messages[2];
        assert_eq!(last.role, Role::User);
        assert!(last.content.starts_with("jag vill handla\n\n[SESSION_CONTEXT: {"));
        assert!(last.content.contains("\"auth_status\":\"logged_out\""));
        assert!(last.content.ends_with("[CLARIFICATION_COUNT: 2]"));
    }

    #[tokio::test]
    async fn test_history_sent_is_capped() {
        let llm = Arc::new(MockLlmClient::new(vec![reply(GREETING)]));
        let history: Vec<Message> = (0..60).map(|i| Message::user(format!("m{}", i))).collect();

        agent(llm.clone())
            .decide("hej", &history, &SessionContext::default(), 0)
            .await
            .unwrap();

        let messages = &llm.requests()[0].messages;
        assert_eq!(messages.len(), HISTORY_LIMIT + 1);
        assert_eq!(messages[0].content, "m10");
        assert!(!messages[HISTORY_LIMIT].content.contains("CLARIFICATION_COUNT"));
    }

    #[tokio::test]
    async fn test_prose_reply_becomes_fallback() {
        let llm = Arc::new(MockLlmClient::new(vec![reply("Gärna! Vad vill du köpa?")]));
        let decision = agent(llm)
            .decide("hej", &[], &SessionContext::default(), 0)
            .await
            .unwrap();
        assert_eq!(decision.conversation_response, UNPARSED_REPLY);
        assert_eq!(decision.next_action, NextAction::AwaitUserInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried() {
        let llm = Arc::new(MockLlmClient::with_results(vec![
            Err(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok(reply(GREETING)),
        ]));
        let decision = agent(llm.clone())
            .decide("hej", &[], &SessionContext::default(), 0)
            .await
            .unwrap();
        assert_eq!(decision.intent, "greeting");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_error() {
        let llm = Arc::new(MockLlmClient::with_results(vec![Err(LlmError::ApiError {
            status: 400,
            message: "bad request".to_string(),
        })]));
        let err = agent(llm.clone())
            .decide("hej", &[], &SessionContext::default(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        assert_eq!(llm.call_count(), 1);
    }
}
