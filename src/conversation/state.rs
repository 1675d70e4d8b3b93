//! Conversation state carried from one customer message to the next

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::agent::HISTORY_LIMIT;
use crate::domain::RunResult;
use crate::llm::Message;

/// Login status as far as the conversation knows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    LoggedOut,
    LoggedIn,
}

pub const READY_FOR_PAYMENT: &str = "ready_for_payment";

/// What the customer's session looks like, shown to the model every turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub cart_items: Vec<String>,
    pub auth_status: AuthStatus,
    pub checkout_progress: Option<String>,
}

impl SessionContext {
    /// Fold the result of a delegated run into the session
    pub fn absorb(&mut self, agent: &str, result: &RunResult) {
        match agent {
            "authentication" => {
                let status = result.result.as_ref().map(|s| s.status.as_str());
                if matches!(status, Some("success") | Some("logged_in")) {
                    self.auth_status = AuthStatus::LoggedIn;
                }
            }
            "shopping" => {
                if result.terminated {
                    self.checkout_progress = Some(READY_FOR_PAYMENT.to_string());
                }
                let items: Vec<String> = result
                    .trace
                    .iter()
                    .flatten()
                    .filter(|entry| entry.tool == "fill_role")
                    .filter_map(|entry| entry.args.get("value").and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect();
                if !items.is_empty() {
                    self.cart_items = items;
                }
            }
            _ => {}
        }
    }
}

/// Everything a conversation remembers between messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub history: Vec<Message>,
    pub session: SessionContext,
    /// Consecutive turns that ended with a clarifying question
    pub clarification_count: u32,
    /// Failed delegations per agent since its last success
    pub agent_retries: HashMap<String, u32>,
}

impl ConversationState {
    /// Append a message, dropping the oldest beyond the history limit
    pub fn remember(&mut self, message: Message) {
        self.history.push(message);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FinalStatus, Observation, TraceEntry};
    use serde_json::json;

    fn finalized(status: &str) -> RunResult {
        let status = FinalStatus {
            status: status.to_string(),
            ..Default::default()
        };
        RunResult::finalized("r1", status, 3)
    }

    fn entry(tool: &str, args: serde_json::Value) -> TraceEntry {
        TraceEntry {
            step: 1,
            tool: tool.to_string(),
            args,
            observation: Observation::ok(),
        }
    }

    #[test]
    fn test_default_session_serialization() {
        let value = serde_json::to_value(SessionContext::default()).unwrap();
        assert_eq!(
            value,
            json!({"cart_items": [], "auth_status": "logged_out", "checkout_progress": null})
        );
    }

    #[test]
    fn test_login_success_marks_logged_in() {
        let mut session = SessionContext::default();
        session.absorb("authentication", &finalized("failed"));
        assert_eq!(session.auth_status, AuthStatus::LoggedOut);
        session.absorb("authentication", &finalized("success"));
        assert_eq!(session.auth_status, AuthStatus::LoggedIn);
    }

    #[test]
    fn test_shopping_result_fills_cart() {
        let result = finalized("success").with_trace(Some(vec![
            entry("fill_role", json!({"role": "searchbox", "value": "mjölk"})),
            entry("click_text", json!({"text": "Lägg i varukorg"})),
            entry("fill_role", json!({"role": "searchbox", "value": "rågbröd"})),
        ]));
        let mut session = SessionContext::default();
        session.absorb("shopping", &result);

        assert_eq!(session.cart_items, vec!["mjölk".to_string(), "rågbröd".to_string()]);
        assert_eq!(session.checkout_progress.as_deref(), Some(READY_FOR_PAYMENT));
    }

    #[test]
    fn test_unfinished_shopping_keeps_session() {
        let mut session = SessionContext {
            cart_items: vec!["ägg".to_string()],
            ..Default::default()
        };
        session.absorb("shopping", &RunResult::budget_exceeded("r1", 12));
        assert_eq!(session.cart_items, vec!["ägg".to_string()]);
        assert!(session.checkout_progress.is_none());
    }

    #[test]
    fn test_history_is_capped() {
        let mut state = ConversationState::default();
        for i in 0..(HISTORY_LIMIT + 5) {
            state.remember(Message::user(format!("m{}", i)));
        }
        assert_eq!(state.history.len(), HISTORY_LIMIT);
        assert_eq!(state.history[0].content, "m5");
    }
}
