//! Retry orchestration.
//!
//! # Responsibilities
//! - Run a caller-supplied operation under a `RetryPolicy`
//! - Wait for connectivity before network-aware retries
//! - Bound batch concurrency by running operations in fixed-size chunks
//! - Publish in-flight records and lifecycle events to observers
//!
//! # Design Decisions
//! - Exhaustion is reported as `Outcome::Failure`, never raised
//! - Cancellation is cooperative: checked at loop entry and during the
//!   backoff sleep, never inside the operation itself
//! - Jitter is multiplicative and resampled on every attempt
//! - Batches do not pipeline: chunk N+1 starts only after chunk N finishes

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::OrchestratorConfig;
use crate::network::NetworkQualityMonitor;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::error::{ResilienceError, Retryable};
use crate::resilience::outcome::Outcome;
use crate::resilience::policy::RetryPolicy;
use crate::resilience::record::{
    OperationRegistry, RetryEvent, RetryOperationRecord, RetryOperationSnapshot,
};

enum OnlineWait {
    Online,
    Cancelled,
    TimedOut,
}

/// Executes operations with backoff, cancellation and connectivity awareness.
pub struct RetryOrchestrator {
    registry: OperationRegistry,
    monitor: Arc<NetworkQualityMonitor>,
    config: OrchestratorConfig,
    events: broadcast::Sender<RetryEvent>,
}

impl RetryOrchestrator {
    pub fn new(monitor: Arc<NetworkQualityMonitor>, config: OrchestratorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            registry: OperationRegistry::new(),
            monitor,
            config,
            events,
        }
    }

    /// Policy used when a caller has no specific requirements.
    pub fn default_policy(&self) -> RetryPolicy {
        self.config.default_preset.policy()
    }

    /// Subscribe to lifecycle events of every operation run by this orchestrator.
    pub fn subscribe(&self) -> broadcast::Receiver<RetryEvent> {
        self.events.subscribe()
    }

    /// Snapshots of operations currently inside `execute`.
    pub fn active_operations(&self) -> Vec<RetryOperationSnapshot> {
        self.registry.snapshots()
    }

    pub fn operation(&self, id: &str) -> Option<RetryOperationSnapshot> {
        self.registry.get(id)
    }

    /// Retry every failure until the policy is exhausted.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
        policy: RetryPolicy,
        operation_id: Option<String>,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with(operation, policy, operation_id, |_: &E, _| true).await
    }

    /// Retry failures accepted by `should_retry(error, attempt)`.
    pub async fn execute_with<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        policy: RetryPolicy,
        operation_id: Option<String>,
        should_retry: P,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E, u32) -> bool,
    {
        let record = self.begin(operation_id, policy);
        let outcome = self.run_attempts(&record, &mut operation, &should_retry).await;
        self.finish(&record, &outcome);
        outcome
    }

    /// Wait for connectivity, then retry transient failures only.
    ///
    /// Network-unavailable, timeout and 5xx errors are retried; anything else
    /// fails immediately. The wait is unbounded unless
    /// `OrchestratorConfig::online_wait_timeout_secs` is set, in which case an
    /// expired wait yields `Failure` with `ResilienceError::Timeout` and zero
    /// attempts.
    pub async fn retry_when_online<T, E, F, Fut>(
        &self,
        mut operation: F,
        policy: RetryPolicy,
        operation_id: Option<String>,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display + From<ResilienceError>,
    {
        let record = self.begin(operation_id, policy);

        let outcome = match self.wait_until_online(&record).await {
            OnlineWait::Online => {
                let should_retry = |error: &E, _attempt: u32| error.is_retryable();
                self.run_attempts(&record, &mut operation, &should_retry).await
            }
            OnlineWait::Cancelled => Outcome::Cancelled,
            OnlineWait::TimedOut => {
                let error = ResilienceError::Timeout;
                record.record_failure(error.to_string());
                Outcome::Failure { error: E::from(error), attempts: 0 }
            }
        };

        self.finish(&record, &outcome);
        outcome
    }

    /// Run operations in consecutive chunks of `max_concurrency`, or of
    /// `OrchestratorConfig::batch_max_concurrency` when `None`.
    ///
    /// Operations inside a chunk run concurrently; the next chunk starts once
    /// every member of the current one has finished. Results are keyed by id;
    /// a repeated id keeps the later result.
    pub async fn retry_batch<T, E, F, Fut>(
        &self,
        operations: Vec<(String, F)>,
        policy: RetryPolicy,
        max_concurrency: Option<usize>,
    ) -> HashMap<String, Outcome<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_concurrency = max_concurrency.unwrap_or(self.config.batch_max_concurrency);
        let chunk_size = if max_concurrency == 0 {
            tracing::warn!("retry_batch called with max_concurrency 0, running sequentially");
            1
        } else {
            max_concurrency
        };

        let total = operations.len();
        let mut results = HashMap::with_capacity(total);
        let mut pending = operations.into_iter().peekable();

        while pending.peek().is_some() {
            let chunk: Vec<_> = pending.by_ref().take(chunk_size).collect();
            tracing::debug!(chunk_len = chunk.len(), total, "Starting batch chunk");

            let runs = chunk.into_iter().map(|(id, operation)| async move {
                let outcome = self.execute(operation, policy, Some(id.clone())).await;
                (id, outcome)
            });

            for (id, outcome) in join_all(runs).await {
                results.insert(id, outcome);
            }
        }

        results
    }

    /// Request cancellation of one operation. Returns whether it was running.
    pub fn cancel(&self, operation_id: &str) -> bool {
        let found = self.registry.cancel(operation_id);
        if found {
            tracing::info!(operation_id = %operation_id, "Cancellation requested");
        }
        found
    }

    /// Request cancellation of every running operation. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let count = self.registry.cancel_all();
        tracing::info!(count, "Cancellation requested for all operations");
        count
    }

    fn begin(&self, operation_id: Option<String>, policy: RetryPolicy) -> Arc<RetryOperationRecord> {
        let id = operation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let record = Arc::new(RetryOperationRecord::new(id, policy));
        self.registry.register(record.clone());

        tracing::debug!(
            operation_id = %record.id(),
            max_attempts = policy.max_attempts(),
            "Operation started"
        );
        self.emit(RetryEvent::Started {
            id: record.id().to_string(),
            max_attempts: policy.max_attempts(),
        });
        record
    }

    fn finish<T, E: Display>(&self, record: &Arc<RetryOperationRecord>, outcome: &Outcome<T, E>) {
        record.complete();
        self.registry.unregister(record);

        let id = record.id().to_string();
        match outcome {
            Outcome::Success { attempts, .. } => {
                if *attempts > 1 {
                    tracing::info!(operation_id = %id, attempts, "Operation succeeded after retry");
                }
                metrics::record_retry_outcome("success");
                self.emit(RetryEvent::Succeeded { id, attempts: *attempts });
            }
            Outcome::Failure { error, attempts } => {
                let exhausted = *attempts >= record.policy().max_attempts();
                tracing::warn!(operation_id = %id, attempts, exhausted, error = %error, "Operation failed");
                metrics::record_retry_outcome("failure");
                self.emit(RetryEvent::Failed {
                    id,
                    attempts: *attempts,
                    error: error.to_string(),
                    exhausted,
                });
            }
            Outcome::Cancelled => {
                let attempts = record.attempt();
                tracing::info!(operation_id = %id, attempts, "Operation cancelled");
                metrics::record_retry_outcome("cancelled");
                self.emit(RetryEvent::Cancelled { id, attempts });
            }
        }
    }

    async fn run_attempts<T, E, F, Fut, P>(
        &self,
        record: &RetryOperationRecord,
        operation: &mut F,
        should_retry: &P,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E, u32) -> bool,
    {
        let policy = *record.policy();
        let mut attempt = 0;

        loop {
            if record.is_cancelled() {
                return Outcome::Cancelled;
            }

            attempt += 1;
            record.begin_attempt(attempt);
            metrics::record_retry_attempt();

            let error = match operation().await {
                Ok(value) => return Outcome::Success { value, attempts: attempt },
                Err(error) => error,
            };

            let message = error.to_string();
            record.record_failure(message.clone());

            if attempt >= policy.max_attempts() || !should_retry(&error, attempt) {
                self.emit(RetryEvent::AttemptFailed {
                    id: record.id().to_string(),
                    attempt,
                    error: message,
                    next_delay: None,
                });
                return Outcome::Failure { error, attempts: attempt };
            }

            let delay = calculate_backoff(&policy, attempt);
            record.schedule_retry(delay);

            tracing::info!(
                operation_id = %record.id(),
                attempt,
                delay = ?delay,
                error = %message,
                "Retrying operation"
            );
            self.emit(RetryEvent::AttemptFailed {
                id: record.id().to_string(),
                attempt,
                error: message,
                next_delay: Some(delay),
            });

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = record.cancellation().cancelled() => {}
            }
        }
    }

    async fn wait_until_online(&self, record: &RetryOperationRecord) -> OnlineWait {
        let started = Instant::now();
        let poll = Duration::from_millis(self.config.online_poll_interval_ms.max(1));
        let limit = self.config.online_wait_timeout_secs.map(Duration::from_secs);
        let mut announced = false;

        loop {
            if record.is_cancelled() {
                return OnlineWait::Cancelled;
            }
            if self.monitor.is_online() {
                if announced {
                    tracing::info!(operation_id = %record.id(), waited = ?started.elapsed(), "Connectivity restored");
                }
                return OnlineWait::Online;
            }
            if let Some(limit) = limit {
                if started.elapsed() >= limit {
                    tracing::warn!(operation_id = %record.id(), limit = ?limit, "Gave up waiting for connectivity");
                    return OnlineWait::TimedOut;
                }
            }
            if !announced {
                tracing::info!(operation_id = %record.id(), "Waiting for connectivity before first attempt");
                announced = true;
            }

            tokio::select! {
                _ = time::sleep(poll) => {}
                _ = record.cancellation().cancelled() => {}
            }
        }
    }

    fn emit(&self, event: RetryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("active_operations", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}
