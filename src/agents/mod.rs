//! Agents - named profiles and the activity that runs them.
//!
//! - `authentication`: logs in to the store
//! - `shopping`: completes a shopping goal, delegating login when needed

mod activity;
mod profile;

pub use activity::AgentActivity;
pub use profile::AgentProfile;
