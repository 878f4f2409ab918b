//! Deployment Manager
//!
//! Reconciles the declarative description of an edge cloud (System,
//! networks, PTP, host profiles and hosts) against the platform inventory
//! API of a running installation.
//!
//! The System reconciler builds the per-namespace platform client and
//! raises the system-ready flag; every other kind waits for it.

mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod manager;
mod metrics;
mod monitor;
mod reconciler;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::controller::{Controller, Settings};
use crate::error::ControllerError;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "deployment-manager", version, about)]
struct Args {
    /// Address of the metrics and health endpoint
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Reconciler feature toggle file
    #[arg(long = "config", env = "MANAGER_CONFIG", default_value = "/etc/manager/config.yaml")]
    config_path: PathBuf,

    /// Namespace holding the deployment objects
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "deployment")]
    namespace: String,

    /// Directory receiving the platform CA certificates
    #[arg(long, env = "CA_CERT_DIR", default_value = "/etc/ssl/certs/platform")]
    ca_dir: PathBuf,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.with_target(true).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let args = Args::parse();
    init_logging(args.log_json);

    // kube and reqwest both pull rustls; pin the process-wide provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Deployment Manager");
    info!("Configuration:");
    info!("  Namespace: {}", args.namespace);
    info!("  Metrics address: {}", args.metrics_addr);
    info!("  Reconciler config: {}", args.config_path.display());
    info!("  CA directory: {}", args.ca_dir.display());

    let controller = Controller::new(Settings {
        namespace: args.namespace,
        metrics_addr: args.metrics_addr,
        config_path: args.config_path,
        ca_dir: args.ca_dir,
    })
    .await?;
    controller.run().await
}
