//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, retry policies self-validate)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → sections handed to the orchestrator, limiter and monitor
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → network section swapped into the running monitor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ResilienceConfig;
pub use schema::OrchestratorConfig;
pub use schema::RateLimitConfig;
pub use schema::RateLimitRule;
pub use schema::NetworkMonitorConfig;
pub use schema::ObservabilityConfig;
