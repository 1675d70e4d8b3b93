//! Pending-input registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{HumanInputError, InputKind};
use crate::id::now_ms;

/// Longest wait the broker registers; larger requests are capped
pub const MAX_WAIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

enum Settle {
    Value(String),
    Cancelled,
}

struct PendingInput {
    kind: InputKind,
    prompt: String,
    created_at: u64,
    deadline: Instant,
    /// Distinguishes this registration from a later one for the same run
    token: u64,
    tx: oneshot::Sender<Settle>,
}

/// Read-only view of a pending request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSummary {
    pub run_id: String,
    pub kind: InputKind,
    pub prompt: String,
    pub created_at: u64,
    pub remaining_ms: u64,
}

/// Registry of pending human-input requests, at most one per run.
///
/// Each entry holds the sending half of a oneshot channel. Whichever of
/// submit, cancel, timeout or waiter drop happens first removes the entry;
/// the others find nothing.
#[derive(Default)]
pub struct HumanIoBroker {
    pending: DashMap<String, PendingInput>,
    next_token: AtomicU64,
}

/// Removes this registration when the waiting future completes or is dropped.
struct Registration<'a> {
    broker: &'a HumanIoBroker,
    run_id: &'a str,
    token: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let token = self.token;
        self.broker.pending.remove_if(self.run_id, |_, p| p.token == token);
    }
}

impl HumanIoBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request for `run_id` and wait for the answer.
    ///
    /// A second request for a run that already waits is rejected. Timeouts
    /// above [`MAX_WAIT`] are capped.
    pub async fn wait_for_input(
        &self,
        run_id: &str,
        kind: InputKind,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, HumanInputError> {
        let timeout = timeout.min(MAX_WAIT);
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        match self.pending.entry(run_id.to_string()) {
            Entry::Occupied(existing) => {
                return Err(HumanInputError::AlreadyPending {
                    run_id: run_id.to_string(),
                    kind: existing.get().kind,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingInput {
                    kind,
                    prompt: prompt.to_string(),
                    created_at: now_ms(),
                    deadline: Instant::now() + timeout,
                    token,
                    tx,
                });
            }
        }
        let _registration = Registration {
            broker: self,
            run_id,
            token,
        };
        log::info!("Run {} waiting for {} input ({}s)", run_id, kind, timeout.as_secs());

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Settle::Value(value))) => {
                log::info!("Run {} received {} input", run_id, kind);
                Ok(value)
            }
            Ok(Ok(Settle::Cancelled)) | Ok(Err(_)) => Err(HumanInputError::Cancelled {
                run_id: run_id.to_string(),
            }),
            Err(_) => {
                log::warn!("Run {} timed out waiting for {} input", run_id, kind);
                Err(HumanInputError::Timeout {
                    run_id: run_id.to_string(),
                    kind,
                    after: timeout,
                })
            }
        }
    }

    /// Fulfil the pending request for `run_id` if its kind matches.
    ///
    /// Returns false when nothing matching is pending; a request is fulfilled
    /// at most once.
    pub fn submit_input(&self, run_id: &str, kind: InputKind, value: &str) -> bool {
        match self.pending.remove_if(run_id, |_, p| p.kind == kind) {
            Some((_, pending)) => pending.tx.send(Settle::Value(value.to_string())).is_ok(),
            None => {
                log::debug!("No pending {} input for run {}", kind, run_id);
                false
            }
        }
    }

    /// Release a pending wait with a cancellation outcome.
    pub fn cancel(&self, run_id: &str) -> bool {
        match self.pending.remove(run_id) {
            Some((_, pending)) => {
                log::info!("Cancelled pending {} input for run {}", pending.kind, run_id);
                pending.tx.send(Settle::Cancelled).is_ok()
            }
            None => false,
        }
    }

    pub fn pending(&self, run_id: &str) -> Option<PendingSummary> {
        self.pending.get(run_id).map(|entry| {
            let p = entry.value();
            PendingSummary {
                run_id: run_id.to_string(),
                kind: p.kind,
                prompt: p.prompt.clone(),
                created_at: p.created_at,
                remaining_ms: p.deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            }
        })
    }

    /// Runs with a pending request, sorted
    pub fn pending_runs(&self) -> Vec<String> {
        let mut runs: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        runs.sort();
        runs
    }
}
