//! Path observation.
//!
//! # Responsibilities
//! - Describe a path change (`PathUpdate`) as reported by the host
//! - Provide a reachability observer for hosts without a native path monitor
//!
//! # Design Decisions
//! - Only path observations may declare a link disconnected
//! - Reachability is a TCP connect with a deadline; no payload is exchanged
//! - Updates are pushed into the monitor; repeated identical updates are
//!   filtered there, not here

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::network::monitor::NetworkQualityMonitor;
use crate::network::state::TransportType;

/// One observation of the underlying network path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathUpdate {
    pub satisfied: bool,
    pub transport: TransportType,
    pub is_expensive: bool,
    pub is_constrained: bool,
}

impl PathUpdate {
    pub fn satisfied(transport: TransportType) -> Self {
        Self {
            satisfied: true,
            transport,
            is_expensive: false,
            is_constrained: false,
        }
    }

    pub fn unsatisfied() -> Self {
        Self {
            satisfied: false,
            transport: TransportType::Unknown,
            is_expensive: false,
            is_constrained: false,
        }
    }
}

/// Derives path updates from periodic TCP reachability checks.
pub struct ReachabilityObserver {
    monitor: Arc<NetworkQualityMonitor>,
    target: SocketAddr,
}

impl ReachabilityObserver {
    pub fn new(monitor: Arc<NetworkQualityMonitor>, target: SocketAddr) -> Self {
        Self { monitor, target }
    }

    /// Check once and feed the result into the monitor.
    pub async fn observe(&self) -> PathUpdate {
        let timeout = self.monitor.config().probe_timeout();
        let update = match time::timeout(timeout, TcpStream::connect(self.target)).await {
            Ok(Ok(_stream)) => PathUpdate::satisfied(TransportType::Other),
            Ok(Err(e)) => {
                tracing::debug!(target_addr = %self.target, error = %e, "Reachability check failed");
                PathUpdate::unsatisfied()
            }
            Err(_) => {
                tracing::debug!(target_addr = %self.target, "Reachability check timed out");
                PathUpdate::unsatisfied()
            }
        };
        self.monitor.apply_path_update(update);
        update
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(target_addr = %self.target, "Reachability observer starting");

        loop {
            self.observe().await;

            let interval = self.monitor.config().reachability_interval();
            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Reachability observer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
