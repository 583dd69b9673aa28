//! Resilience layer for unreliable network operations.
//!
//! Retries with backoff, per-key sliding-window rate limits, and continuous
//! connectivity quality classification.

pub mod config;
pub mod lifecycle;
pub mod network;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ResilienceConfig;
pub use lifecycle::{Services, Shutdown};
pub use network::NetworkQualityMonitor;
pub use resilience::{Outcome, RetryOrchestrator, RetryPolicy};
pub use security::RateLimiter;
