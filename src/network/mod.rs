//! Connectivity monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Path observation (passive.rs):
//!     Host path monitor or reachability check
//!     → PathUpdate
//!     → monitor.rs re-evaluates status
//!
//! Latency sampling (active.rs):
//!     Periodic timer (only while usable)
//!     → LatencyProbe with timeout
//!     → monitor.rs records sample or failure
//!
//! State machine (state.rs):
//!     Unknown → Connected | Slow | Disconnected
//!     Connected ←→ Slow with a two-threshold latency band
//!
//! Readers:
//!     status / quality / snapshot getters, or a watch subscription
//! ```
//!
//! # Design Decisions
//! - Passive and active signals are complementary; only passive can disconnect
//! - Quality is derived on read from status, path flags and the latency average
//! - Histories are bounded and evict oldest first

pub mod active;
pub mod monitor;
pub mod passive;
pub mod state;

pub use active::{HttpProbe, LatencyProbe, LatencySampler};
pub use monitor::NetworkQualityMonitor;
pub use passive::{PathUpdate, ReachabilityObserver};
pub use state::{ConnectionQuality, ConnectivityState, NetworkEvent, NetworkSnapshot, TransportType};
