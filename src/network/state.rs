//! Connectivity state machine.
//!
//! # States
//! - Unknown: no path evaluation yet
//! - Connected: path satisfied, unconstrained, latency acceptable
//! - Slow: path satisfied but constrained/expensive, or latency degraded
//! - Disconnected: path not satisfied
//!
//! # State Transitions
//! ```text
//! Unknown → Connected | Slow | Disconnected: first path update
//! Connected → Slow: average latency > demote threshold, or failed probe
//! Slow → Connected: average latency <= promote threshold (latency-induced slowness only)
//! any → Disconnected: path update reports unsatisfied path
//! ```
//!
//! # Design Decisions
//! - Hysteresis: two thresholds so the status does not flap near one cutoff
//! - Only the path observer can declare disconnection
//! - Quality is derived on read, never stored
//! - Events are recorded only when status, transport or path flags change

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use serde::{Deserialize, Serialize};

use crate::network::passive::PathUpdate;

/// Smoothed connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Connected,
    Slow,
    Disconnected,
    #[default]
    Unknown,
}

impl ConnectivityState {
    /// Connected or slow: requests can be attempted.
    pub fn is_usable(self) -> bool {
        matches!(self, ConnectivityState::Connected | ConnectivityState::Slow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityState::Connected => "connected",
            ConnectivityState::Slow => "slow",
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived connection quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    None,
    Poor,
    Fair,
    Good,
}

/// Physical transport of the current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Wifi,
    Cellular,
    Ethernet,
    Loopback,
    Other,
    #[default]
    Unknown,
}

/// One recorded connectivity transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub status: ConnectivityState,
    pub transport: TransportType,
    pub timestamp: SystemTime,
    pub is_expensive: bool,
    pub is_constrained: bool,
}

/// Latency thresholds for the hysteresis band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Average above which connected demotes to slow (and quality is poor).
    pub demote: Duration,
    /// Average at or below which slow promotes to connected (and quality is good).
    pub promote: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            demote: Duration::from_secs(2),
            promote: Duration::from_secs(1),
        }
    }
}

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Change capacity, evicting oldest entries if shrinking.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Arithmetic mean of `samples`, zero when empty.
pub fn average_latency(samples: &BoundedHistory<Duration>) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let mean = total / samples.len() as u128;
    Duration::new((mean / 1_000_000_000) as u64, (mean % 1_000_000_000) as u32)
}

/// Quality as a pure function of status, path flags and average latency.
pub fn classify_quality(
    status: ConnectivityState,
    constrained_or_expensive: bool,
    average: Duration,
    thresholds: Thresholds,
) -> ConnectionQuality {
    if !status.is_usable() {
        ConnectionQuality::None
    } else if constrained_or_expensive || average > thresholds.demote {
        ConnectionQuality::Poor
    } else if average > thresholds.promote {
        ConnectionQuality::Fair
    } else {
        ConnectionQuality::Good
    }
}

/// Everything a reader needs to render connectivity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub status: ConnectivityState,
    pub quality: ConnectionQuality,
    pub average_latency: Duration,
    pub sample_count: usize,
    pub transport: TransportType,
    pub is_expensive: bool,
    pub is_constrained: bool,
    pub last_sample_at: Option<SystemTime>,
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        Self {
            status: ConnectivityState::Unknown,
            quality: ConnectionQuality::None,
            average_latency: Duration::ZERO,
            sample_count: 0,
            transport: TransportType::Unknown,
            is_expensive: false,
            is_constrained: false,
            last_sample_at: None,
        }
    }
}

type Signature = (ConnectivityState, TransportType, bool, bool);

/// Mutable link state. Pure: no I/O, no clocks other than event timestamps.
#[derive(Debug, Clone)]
pub struct LinkState {
    status: ConnectivityState,
    path_satisfied: Option<bool>,
    transport: TransportType,
    is_expensive: bool,
    is_constrained: bool,
    latency_degraded: bool,
    latencies: BoundedHistory<Duration>,
    history: BoundedHistory<NetworkEvent>,
    last_sample_at: Option<SystemTime>,
    thresholds: Thresholds,
}

impl LinkState {
    pub fn new(latency_capacity: usize, history_capacity: usize, thresholds: Thresholds) -> Self {
        Self {
            status: ConnectivityState::Unknown,
            path_satisfied: None,
            transport: TransportType::Unknown,
            is_expensive: false,
            is_constrained: false,
            latency_degraded: false,
            latencies: BoundedHistory::new(latency_capacity),
            history: BoundedHistory::new(history_capacity),
            last_sample_at: None,
            thresholds,
        }
    }

    pub fn status(&self) -> ConnectivityState {
        self.status
    }

    pub fn average_latency(&self) -> Duration {
        average_latency(&self.latencies)
    }

    pub fn quality(&self) -> ConnectionQuality {
        classify_quality(
            self.status,
            self.is_constrained || self.is_expensive,
            self.average_latency(),
            self.thresholds,
        )
    }

    pub fn history(&self) -> &BoundedHistory<NetworkEvent> {
        &self.history
    }

    pub fn latencies(&self) -> &BoundedHistory<Duration> {
        &self.latencies
    }

    pub fn reconfigure(&mut self, latency_capacity: usize, history_capacity: usize, thresholds: Thresholds) {
        self.latencies.set_capacity(latency_capacity);
        self.history.set_capacity(history_capacity);
        self.thresholds = thresholds;
    }

    /// Re-evaluate status from a path observation.
    pub fn apply_path(&mut self, update: PathUpdate) -> Option<NetworkEvent> {
        let before = self.signature();

        self.path_satisfied = Some(update.satisfied);
        self.transport = update.transport;
        self.is_expensive = update.is_expensive;
        self.is_constrained = update.is_constrained;

        if !update.satisfied {
            self.latency_degraded = false;
        } else if self.average_latency() > self.thresholds.demote {
            self.latency_degraded = true;
        }

        self.commit(before)
    }

    /// Add a successful probe sample and apply the hysteresis rule.
    pub fn record_latency(&mut self, sample: Duration) -> Option<NetworkEvent> {
        let before = self.signature();

        self.latencies.push(sample);
        self.last_sample_at = Some(SystemTime::now());

        let average = self.average_latency();
        match self.status {
            ConnectivityState::Connected if average > self.thresholds.demote => {
                self.latency_degraded = true;
            }
            ConnectivityState::Slow if self.latency_degraded && average <= self.thresholds.promote => {
                self.latency_degraded = false;
            }
            _ => {}
        }

        self.commit(before)
    }

    /// A failed probe demotes connected to slow; it never disconnects.
    pub fn record_probe_failure(&mut self) -> Option<NetworkEvent> {
        let before = self.signature();
        if self.status == ConnectivityState::Connected {
            self.latency_degraded = true;
        }
        self.commit(before)
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            status: self.status,
            quality: self.quality(),
            average_latency: self.average_latency(),
            sample_count: self.latencies.len(),
            transport: self.transport,
            is_expensive: self.is_expensive,
            is_constrained: self.is_constrained,
            last_sample_at: self.last_sample_at,
        }
    }

    fn evaluate(&self) -> ConnectivityState {
        match self.path_satisfied {
            None => ConnectivityState::Unknown,
            Some(false) => ConnectivityState::Disconnected,
            Some(true) if self.is_constrained || self.is_expensive || self.latency_degraded => {
                ConnectivityState::Slow
            }
            Some(true) => ConnectivityState::Connected,
        }
    }

    fn signature(&self) -> Signature {
        (self.status, self.transport, self.is_expensive, self.is_constrained)
    }

    fn commit(&mut self, before: Signature) -> Option<NetworkEvent> {
        self.status = self.evaluate();
        if self.signature() == before {
            return None;
        }

        let event = NetworkEvent {
            status: self.status,
            transport: self.transport,
            timestamp: SystemTime::now(),
            is_expensive: self.is_expensive,
            is_constrained: self.is_constrained,
        };
        self.history.push(event.clone());
        Some(event)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new(10, 100, Thresholds::default())
    }
}
