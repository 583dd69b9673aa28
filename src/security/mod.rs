//! Abuse protection for sensitive caller actions.
//!
//! # Data Flow
//! ```text
//! Sign-in / content creation / upload:
//!     → rate_limit.rs (check_limit or check_rule for the caller's key)
//!     → allowed: caller performs the action
//!     → denied: caller renders retry-after from time_until_reset
//! ```
//!
//! # Design Decisions
//! - Sliding window, not fixed buckets: no boundary doubling
//! - Denial is a `bool`, never an error; `check_or_reject` is opt-in sugar
//! - One limiter instance is shared by reference, never a global

pub mod rate_limit;

pub use rate_limit::RateLimiter;
