//! Structured reply of the conversation model and the rules applied to it

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::AgentProfile;

/// Consecutive clarifications after which the customer is handed to a person
pub const MAX_CLARIFICATIONS: u32 = 3;

/// Below this confidence the assistant asks instead of acting
pub const MIN_CONFIDENCE: f64 = 0.5;

pub const ESCALATION_REPLY: &str = "I'm having trouble understanding. Let me get you some help.";
pub const UNPARSED_REPLY: &str = "I'm having trouble understanding. Could you rephrase that?";
pub const INVALID_REPLY: &str = "I'm having trouble processing that. Could you try again?";
pub const MISSING_LIST_REPLY: &str = "What would you like to shop for?";

/// What the conversation does after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AwaitUserInput,
    DelegateToAgent,
    #[serde(alias = "complete")]
    Respond,
    /// Set by the workflow, never accepted from the model
    #[serde(skip_deserializing)]
    HumanEscalationNeeded,
}

/// Hand-off of a task to an agent profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDelegation {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub task_payload: Option<Value>,
}

impl AgentDelegation {
    fn payload_is_empty(&self) -> bool {
        match &self.task_payload {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }

    fn has_shopping_list(&self) -> bool {
        self.task_payload
            .as_ref()
            .and_then(|p| p.get("shopping_list"))
            .is_some_and(|list| match list {
                Value::Array(items) => !items.is_empty(),
                Value::String(text) => !text.trim().is_empty(),
                _ => false,
            })
    }
}

/// One decision of the conversation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDecision {
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub user_message_understood: String,
    #[serde(default)]
    pub extracted_info: Option<Value>,
    #[serde(default)]
    pub clarification_questions: Vec<String>,
    #[serde(default)]
    pub agent_delegation: AgentDelegation,
    pub conversation_response: String,
    pub next_action: NextAction,
    #[serde(default)]
    pub needs_human_escalation: bool,
}

impl ConversationDecision {
    /// Safe reply used when the model's answer cannot be used
    pub fn fallback(understood: &str, reply: &str) -> Self {
        Self {
            intent: "clarification_needed".to_string(),
            confidence: 0.0,
            user_message_understood: understood.to_string(),
            extracted_info: None,
            clarification_questions: Vec::new(),
            agent_delegation: AgentDelegation::default(),
            conversation_response: reply.to_string(),
            next_action: NextAction::AwaitUserInput,
            needs_human_escalation: false,
        }
    }

    /// Parse the model's reply text; never fails
    pub fn parse(content: &str) -> Self {
        let decision: Self = match serde_json::from_str(content.trim()) {
            Ok(decision) => decision,
            Err(e) => {
                log::error!("Conversation reply is not a decision: {}", e);
                return Self::fallback("Could not parse response", UNPARSED_REPLY);
            }
        };
        if let Err(problem) = decision.check() {
            log::error!("Conversation decision rejected: {}", problem);
            return Self::fallback("Validation error", INVALID_REPLY);
        }
        decision
    }

    fn check(&self) -> Result<(), String> {
        if self.intent.trim().is_empty() {
            return Err("empty intent".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside 0..1", self.confidence));
        }
        if self.conversation_response.trim().is_empty() {
            return Err("empty conversation_response".to_string());
        }
        Ok(())
    }

    /// Apply the conversation rules for the current clarification streak.
    pub fn enforce(mut self, clarification_count: u32) -> Self {
        if clarification_count >= MAX_CLARIFICATIONS {
            self.needs_human_escalation = true;
            self.conversation_response = ESCALATION_REPLY.to_string();
            self.next_action = NextAction::AwaitUserInput;
            self.agent_delegation.required = false;
        }

        if self.confidence < MIN_CONFIDENCE {
            self.next_action = NextAction::AwaitUserInput;
            self.agent_delegation.required = false;
        }

        if self.intent == "out_of_scope" {
            self.agent_delegation.required = false;
        }

        if self.agent_delegation.required {
            let known = self
                .agent_delegation
                .agent_type
                .as_deref()
                .and_then(AgentProfile::by_name);
            let usable = match known {
                Some(profile) if profile.name == AgentProfile::SHOPPING.name => self.agent_delegation.has_shopping_list(),
                Some(_) => !self.agent_delegation.payload_is_empty(),
                None => false,
            };
            if !usable {
                log::info!(
                    "Dropping delegation to {:?}: unusable task payload",
                    self.agent_delegation.agent_type
                );
                self.agent_delegation.required = false;
                self.next_action = NextAction::AwaitUserInput;
                self.conversation_response = MISSING_LIST_REPLY.to_string();
            }
        }

        if self.next_action == NextAction::DelegateToAgent && !self.agent_delegation.required {
            self.next_action = NextAction::AwaitUserInput;
        }
        self
    }

    /// True when the turn hands work to an agent
    pub fn delegates(&self) -> bool {
        self.next_action == NextAction::DelegateToAgent && self.agent_delegation.required
    }

    /// True when the assistant is waiting on an answer to its own question
    pub fn asks_clarification(&self) -> bool {
        self.next_action == NextAction::AwaitUserInput && !self.clarification_questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shopping(confidence: f64, payload: Value) -> ConversationDecision {
        ConversationDecision {
            intent: "shopping".to_string(),
            confidence,
            user_message_understood: "wants milk".to_string(),
            extracted_info: None,
            clarification_questions: Vec::new(),
            agent_delegation: AgentDelegation {
                required: true,
                agent_type: Some("shopping".to_string()),
                task_payload: Some(payload),
            },
            conversation_response: "Adding milk to your cart.".to_string(),
            next_action: NextAction::DelegateToAgent,
            needs_human_escalation: false,
        }
    }

    #[test]
    fn test_parse_full_decision() {
        let decision = ConversationDecision::parse(
            r#"{
                "intent": "shopping",
                "confidence": 0.9,
                "user_message_understood": "buy milk",
                "clarification_questions": [],
                "agent_delegation": {"required": true, "agent_type": "shopping", "task_payload": {"shopping_list": ["mjölk"]}},
                "conversation_response": "On it!",
                "next_action": "delegate_to_agent"
            }"#,
        );
        assert_eq!(decision.intent, "shopping");
        assert!(decision.delegates());
        assert!(!decision.needs_human_escalation);
    }

    #[test]
    fn test_unparseable_reply_falls_back() {
        let decision = ConversationDecision::parse("Sure, I can help with that!");
        assert_eq!(decision.intent, "clarification_needed");
        assert_eq!(decision.conversation_response, UNPARSED_REPLY);
        assert_eq!(decision.next_action, NextAction::AwaitUserInput);
        assert!(!decision.delegates());
    }

    #[test]
    fn test_invalid_decision_falls_back() {
        let decision = ConversationDecision::parse(
            r#"{"intent": "shopping", "confidence": 7, "conversation_response": "ok", "next_action": "respond"}"#,
        );
        assert_eq!(decision.conversation_response, INVALID_REPLY);

        // The workflow alone decides on escalation
        let decision = ConversationDecision::parse(
            r#"{"intent": "x", "confidence": 1, "conversation_response": "ok", "next_action": "human_escalation_needed"}"#,
        );
        assert_eq!(decision.conversation_response, UNPARSED_REPLY);
    }

    #[test]
    fn test_escalates_after_three_clarifications() {
        let decision = shopping(0.9, json!({"shopping_list": ["mjölk"]})).enforce(3);
        assert!(decision.needs_human_escalation);
        assert_eq!(decision.conversation_response, ESCALATION_REPLY);
        assert_eq!(decision.next_action, NextAction::AwaitUserInput);
        assert!(!decision.delegates());

        assert!(!shopping(0.9, json!({"shopping_list": ["mjölk"]})).enforce(2).needs_human_escalation);
    }

    #[test]
    fn test_low_confidence_never_delegates() {
        let decision = shopping(0.4, json!({"shopping_list": ["mjölk"]})).enforce(0);
        assert_eq!(decision.next_action, NextAction::AwaitUserInput);
        assert!(!decision.agent_delegation.required);
        assert_eq!(decision.conversation_response, "Adding milk to your cart.");
    }

    #[test]
    fn test_out_of_scope_never_delegates() {
        let mut decision = shopping(0.9, json!({"shopping_list": ["mjölk"]}));
        decision.intent = "out_of_scope".to_string();
        let decision = decision.enforce(0);
        assert!(!decision.delegates());
        assert_eq!(decision.next_action, NextAction::AwaitUserInput);
    }

    #[test]
    fn test_shopping_without_list_asks_what_to_buy() {
        for payload in [json!({}), json!({"shopping_list": []}), json!({"store": "coop_se"})] {
            let decision = shopping(0.9, payload).enforce(0);
            assert!(!decision.delegates());
            assert_eq!(decision.conversation_response, MISSING_LIST_REPLY);
        }
    }

    #[test]
    fn test_unknown_agent_is_not_delegated() {
        let mut decision = shopping(0.9, json!({"shopping_list": ["mjölk"]}));
        decision.agent_delegation.agent_type = Some("checkout".to_string());
        assert!(!decision.enforce(0).delegates());
    }

    #[test]
    fn test_authentication_needs_payload() {
        let mut decision = shopping(0.9, json!({"store": "coop_se"}));
        decision.intent = "authentication".to_string();
        decision.agent_delegation.agent_type = Some("authentication".to_string());
        assert!(decision.clone().enforce(0).delegates());

        decision.agent_delegation.task_payload = None;
        assert!(!decision.enforce(0).delegates());
    }

    #[test]
    fn test_clarification_detection() {
        let mut decision = ConversationDecision::fallback("unclear", "Which milk?");
        assert!(!decision.asks_clarification());
        decision.clarification_questions.push("Which milk?".to_string());
        assert!(decision.asks_clarification());
    }
}
