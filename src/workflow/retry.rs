//! Activity retry policy and failure classification

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::WorkflowConfig;

/// Bounded exponential backoff for the run activity.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub maximum_attempts: u32,
    pub initial_interval: Duration,
    pub maximum_interval: Duration,
    pub backoff_coefficient: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for RetryPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            maximum_attempts: config.maximum_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            maximum_interval: Duration::from_millis(config.maximum_interval_ms),
            backoff_coefficient: config.backoff_coefficient.max(1.0),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_interval.as_millis() as f64 * self.backoff_coefficient.powi(exponent);
        let capped = millis.min(self.maximum_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether attempt `attempt` (1-based) that failed with `error` gets another try
    pub fn should_retry(&self, attempt: u32, error: &ActivityError) -> bool {
        error.is_retryable() && attempt < self.maximum_attempts
    }
}

/// Failure of one activity attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivityError {
    /// Nothing irreversible happened yet
    #[error("{0}")]
    Retryable(String),

    /// Side effects already happened
    #[error("{0}")]
    Permanent(String),
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Retryable(_))
    }

    pub fn classification(&self) -> &'static str {
        match self {
            ActivityError::Retryable(_) => "retryable",
            ActivityError::Permanent(_) => "permanent",
        }
    }
}

/// Terminal workflow failure as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub message: String,
    pub classification: String,
}

impl From<&ActivityError> for WorkflowFailure {
    fn from(error: &ActivityError) -> Self {
        Self {
            message: error.to_string(),
            classification: error.classification().to_string(),
        }
    }
}

impl std::fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.maximum_attempts, 2);
        assert_eq!(policy.initial_interval, Duration::from_secs(2));
        assert_eq!(policy.maximum_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_only_retryable_errors_retry() {
        let policy = RetryPolicy::default();
        let retryable = ActivityError::Retryable("browser failed to start".to_string());
        let permanent = ActivityError::Permanent("model failed after 3 tool calls".to_string());

        assert!(policy.should_retry(1, &retryable));
        assert!(!policy.should_retry(2, &retryable));
        assert!(!policy.should_retry(1, &permanent));
    }

    #[test]
    fn test_failure_carries_classification() {
        let failure = WorkflowFailure::from(&ActivityError::Permanent("boom".to_string()));
        assert_eq!(failure.message, "boom");
        assert_eq!(failure.classification, "permanent");
        assert_eq!(failure.to_string(), "boom (permanent)");
    }
}
