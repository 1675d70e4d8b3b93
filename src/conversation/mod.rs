//! Conversation - the customer-facing layer above the agents.
//!
//! A conversation model reads each customer message, keeps track of the
//! session, and hands concrete work to the `authentication` and `shopping`
//! agents through the workflow host.

mod agent;
mod decision;
mod state;
mod workflow;

pub use agent::{CONVERSATION_PROMPT, ConversationAgent, HISTORY_LIMIT};
pub use decision::{AgentDelegation, ConversationDecision, MAX_CLARIFICATIONS, NextAction};
pub use state::{AuthStatus, ConversationState, SessionContext};
pub use workflow::{AGENT_COMPLETED, ConversationReply, ConversationWorkflow, Delegation, MAX_DELEGATION_RETRIES};
