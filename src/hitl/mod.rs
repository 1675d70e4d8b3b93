//! Human-in-the-loop escalation.
//!
//! A run that needs a person (a code sent by e-mail, credentials, help with an
//! unknown dialog) registers a pending request with the broker and suspends
//! until someone submits a matching answer, the wait times out, or the run is
//! cancelled.

mod broker;

pub use broker::{HumanIoBroker, MAX_WAIT, PendingSummary};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of answer the run waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Generic,
    ModalHelp,
    EmailContinue,
    Credentials,
    Confirm,
}

impl InputKind {
    pub const ALL: [InputKind; 5] = [
        InputKind::Generic,
        InputKind::ModalHelp,
        InputKind::EmailContinue,
        InputKind::Credentials,
        InputKind::Confirm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Generic => "generic",
            InputKind::ModalHelp => "modal_help",
            InputKind::EmailContinue => "email_continue",
            InputKind::Credentials => "credentials",
            InputKind::Confirm => "confirm",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown input kind: {}", s))
    }
}

/// Why a human-input wait ended without a value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HumanInputError {
    #[error("timed out after {}s waiting for {kind} input on run {run_id}", .after.as_secs())]
    Timeout {
        run_id: String,
        kind: InputKind,
        after: Duration,
    },

    #[error("input wait for run {run_id} was cancelled")]
    Cancelled { run_id: String },

    #[error("run {run_id} already has a pending {kind} request")]
    AlreadyPending { run_id: String, kind: InputKind },
}
