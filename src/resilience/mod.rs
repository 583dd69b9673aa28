//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller operation:
//!     → retries.rs (RetryOrchestrator: attempt loop, batch chunks, cancellation)
//!     → On failure: backoff.rs (capped exponential delay × jitter)
//!     → record.rs (publish attempt, next retry time, last error)
//!     → outcome.rs (Success | Failure | Cancelled, exactly once)
//!
//! Network-aware retries:
//!     → network::NetworkQualityMonitor (wait until usable)
//!     → error.rs (Retryable: transient errors only)
//! ```
//!
//! # Design Decisions
//! - Policies are validated at construction; `execute` cannot see an invalid one
//! - Exhaustion is a value, not an error
//! - Deadlines are the caller's choice (timeouts.rs), never implicit

pub mod backoff;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod record;
pub mod retries;
pub mod timeouts;

pub use error::{ResilienceError, ResilienceResult, Retryable};
pub use outcome::Outcome;
pub use policy::{PolicyPreset, RetryPolicy};
pub use record::{RetryEvent, RetryOperationSnapshot};
pub use retries::RetryOrchestrator;
pub use timeouts::with_deadline;
