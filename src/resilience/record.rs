//! In-flight operation records and the registry that publishes them.
//!
//! # Responsibilities
//! - Track attempt number, timestamps and last error per running operation
//! - Carry the cooperative cancellation token for that operation
//! - Expose read-only snapshots to observers
//!
//! # Design Decisions
//! - Records are written only by the orchestrator
//! - Registry is a `DashMap` so observers never block a running retry loop
//! - A newer call with the same id replaces the published record; the older
//!   call never removes a record it does not own

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::resilience::policy::RetryPolicy;

/// Stand-in deadline for delays too large to add to the clock (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Default)]
struct RecordState {
    attempt: u32,
    last_attempt_at: Option<Instant>,
    next_retry_at: Option<Instant>,
    last_error: Option<String>,
    completed: bool,
}

/// Mutable per-invocation state for one `execute` call.
#[derive(Debug)]
pub struct RetryOperationRecord {
    id: String,
    policy: RetryPolicy,
    started_at: Instant,
    cancel: CancellationToken,
    state: Mutex<RecordState>,
}

impl RetryOperationRecord {
    pub fn new(id: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            id: id.into(),
            policy,
            started_at: Instant::now(),
            cancel: CancellationToken::new(),
            state: Mutex::new(RecordState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn attempt(&self) -> u32 {
        self.state().attempt
    }

    pub(crate) fn begin_attempt(&self, attempt: u32) {
        let mut state = self.state();
        state.attempt = attempt;
        state.last_attempt_at = Some(Instant::now());
        state.next_retry_at = None;
    }

    pub(crate) fn record_failure(&self, error: String) {
        self.state().last_error = Some(error);
    }

    pub(crate) fn schedule_retry(&self, delay: Duration) -> Instant {
        let now = Instant::now();
        let at = now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE);
        self.state().next_retry_at = Some(at);
        at
    }

    pub(crate) fn complete(&self) {
        let mut state = self.state();
        state.completed = true;
        state.next_retry_at = None;
    }

    /// Request cancellation. Permanent for this record.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn snapshot(&self) -> RetryOperationSnapshot {
        let state = self.state();
        RetryOperationSnapshot {
            id: self.id.clone(),
            attempt: state.attempt,
            max_attempts: self.policy.max_attempts(),
            started_at: self.started_at,
            last_attempt_at: state.last_attempt_at,
            next_retry_at: state.next_retry_at,
            last_error: state.last_error.clone(),
            cancelled: self.cancel.is_cancelled(),
            completed: state.completed,
        }
    }
}

/// Point-in-time copy of a record for observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOperationSnapshot {
    pub id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub started_at: Instant,
    pub last_attempt_at: Option<Instant>,
    pub next_retry_at: Option<Instant>,
    pub last_error: Option<String>,
    pub cancelled: bool,
    pub completed: bool,
}

impl RetryOperationSnapshot {
    /// Attempts left after the current one.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Time until the scheduled retry, if one is pending.
    pub fn next_retry_in(&self) -> Option<Duration> {
        self.next_retry_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Lifecycle notifications for observers of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent {
    Started { id: String, max_attempts: u32 },
    AttemptFailed { id: String, attempt: u32, error: String, next_delay: Option<Duration> },
    Succeeded { id: String, attempts: u32 },
    /// Terminal failure. `exhausted` is false when the error was not retryable
    /// or the connectivity wait gave up before all attempts were used.
    Failed { id: String, attempts: u32, error: String, exhausted: bool },
    Cancelled { id: String, attempts: u32 },
}

/// Records of operations currently inside `execute`.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    records: DashMap<String, Arc<RetryOperationRecord>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, record: Arc<RetryOperationRecord>) {
        if let Some(previous) = self.records.insert(record.id().to_string(), record) {
            tracing::warn!(operation_id = %previous.id(), "Operation id reused while still running; replacing published record");
        }
    }

    pub(crate) fn unregister(&self, record: &Arc<RetryOperationRecord>) {
        self.records
            .remove_if(record.id(), |_, current| Arc::ptr_eq(current, record));
    }

    pub fn get(&self, id: &str) -> Option<RetryOperationSnapshot> {
        self.records.get(id).map(|r| r.value().snapshot())
    }

    pub fn snapshots(&self) -> Vec<RetryOperationSnapshot> {
        self.records.iter().map(|r| r.value().snapshot()).collect()
    }

    pub fn cancel(&self, id: &str) -> bool {
        match self.records.get(id) {
            Some(record) => {
                record.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for record in self.records.iter() {
            record.cancel();
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
