//! netguard: connectivity monitor daemon.
//!
//! Runs the resilience layer standalone: samples latency against a probe URL,
//! tracks reachability, logs every connectivity transition, and hot-reloads
//! its configuration file.
//!
//! ```text
//!   reachability ──▶ PathUpdate ──┐
//!                                 ▼
//!   latency probe ──▶ sample ──▶ NetworkQualityMonitor ──▶ watch ──▶ log / --once JSON
//!                                 ▲
//!   config file ──▶ watcher ──────┘ (reconfigure)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;

use netguard::config::loader::{load_config, ConfigError};
use netguard::config::validation::validate_config;
use netguard::config::watcher::ConfigWatcher;
use netguard::config::ResilienceConfig;
use netguard::lifecycle::signals::shutdown_on_signal;
use netguard::lifecycle::{Services, Shutdown};
use netguard::network::{HttpProbe, LatencyProbe, PathUpdate, ReachabilityObserver, TransportType};
use netguard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "netguard")]
#[command(about = "Connectivity quality monitor with retry and rate-limit services", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the latency probe URL.
    #[arg(long)]
    probe_url: Option<String>,

    /// Override the reachability target (host:port).
    #[arg(long)]
    reachability_addr: Option<String>,

    /// Probe once, print the snapshot as JSON and exit.
    #[arg(long)]
    once: bool,
}

fn resolve_config(cli: &Cli) -> Result<ResilienceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    if let Some(url) = &cli.probe_url {
        config.network.probe_url = url.clone();
    }
    if let Some(addr) = &cli.reachability_addr {
        config.network.reachability_addr = Some(addr.clone());
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!("netguard v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let probe: Arc<dyn LatencyProbe> = Arc::new(HttpProbe::new(&config.network.probe_url)?);
    let services = Arc::new(Services::new(config.clone(), Some(probe)));

    if cli.once {
        match config.network.reachability_addr.as_deref().map(str::parse::<SocketAddr>) {
            Some(Ok(target)) => {
                ReachabilityObserver::new(services.monitor.clone(), target).observe().await;
            }
            Some(Err(e)) => return Err(e.into()),
            None => services.monitor.apply_path_update(PathUpdate::satisfied(TransportType::Other)),
        }
        let usable = services.monitor.retry_connection().await;
        println!("{}", serde_json::to_string_pretty(&services.monitor.snapshot())?);
        if !usable {
            std::process::exit(1);
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let mut handles = services.spawn_background(&shutdown);

    // Dropping the watcher closes the reload channel.
    let watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let reload_target = services.clone();
            handles.push(tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    reload_target.apply_reload(new_config);
                }
            }));
            match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    None
                }
            }
        }
        None => None,
    };

    let mut snapshots = services.monitor.subscribe();
    let mut stop_reporting = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        let mut last_quality = None;
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if last_quality != Some(snapshot.quality) {
                        tracing::info!(
                            status = %snapshot.status,
                            quality = ?snapshot.quality,
                            average_latency = ?snapshot.average_latency,
                            "Connection quality"
                        );
                        last_quality = Some(snapshot.quality);
                    }
                }
                _ = stop_reporting.recv() => break,
            }
        }
    }));

    shutdown_on_signal(&shutdown).await;

    let cancelled = services.orchestrator.cancel_all();
    tracing::info!(cancelled, "Shutting down");

    drop(watcher);

    for handle in handles {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
