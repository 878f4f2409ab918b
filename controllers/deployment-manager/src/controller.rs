//! Main controller implementation.
//!
//! Wires the declarative store, the platform manager and the reconciler
//! together, then runs one watcher per kind next to the metrics server.
//!
//! The controller manages seven CRD types:
//! - System: platform-wide configuration, bootstraps the platform client
//! - PlatformNetwork, DataNetwork: address pools and data networks
//! - PtpInstance, PtpInterface: PTP configuration
//! - HostProfile: shared host configuration, propagated to consumers
//! - Host: the host provisioning pipeline

use crate::config::ReconcilerConfig;
use crate::error::ControllerError;
use crate::manager::{KeystoneClientFactory, PlatformManager};
use crate::metrics::{self, Metrics};
use crate::reconciler::{Reconcile, Reconciler};
use crate::store::{KubeStore, ResourceStore};
use crate::watcher;
use crds::{DataNetwork, Host, HostProfile, PlatformNetwork, PtpInstance, PtpInterface, System};
use futures::future::select_all;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::events::Reporter;
use kube::{Api, Client, Resource};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const CONTROLLER_NAME: &str = "deployment-manager";

/// Runtime settings collected from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub namespace: String,
    pub metrics_addr: SocketAddr,
    pub config_path: PathBuf,
    pub ca_dir: PathBuf,
}

/// Main controller for deployment resources.
pub struct Controller {
    tasks: Vec<(&'static str, JoinHandle<Result<(), ControllerError>>)>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("tasks", &self.tasks.iter().map(|(name, _)| *name).collect::<Vec<_>>())
            .finish()
    }
}

fn spawn_watcher<K>(
    client: &Client,
    namespace: &str,
    reconciler: &Arc<Reconciler>,
) -> (&'static str, JoinHandle<Result<(), ControllerError>>)
where
    K: Reconcile + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let reconciler = Arc::clone(reconciler);
    (K::KIND.as_str(), tokio::spawn(watcher::watch(api, reconciler)))
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(settings: Settings) -> Result<Self, ControllerError> {
        info!("Initializing deployment manager");

        let config = ReconcilerConfig::load(&settings.config_path)?;
        tokio::fs::create_dir_all(&settings.ca_dir).await?;

        let kube_client = Client::try_default().await?;
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(kube_client.clone(), reporter));

        let metrics = Arc::new(
            Metrics::new().map_err(|e| ControllerError::InvalidConfig(format!("metrics registry: {}", e)))?,
        );
        let manager = Arc::new(PlatformManager::new(
            Arc::clone(&store),
            Arc::new(KeystoneClientFactory),
            Arc::clone(&metrics),
        ));
        let reconciler = Arc::new(Reconciler::new(
            store,
            manager,
            config,
            Arc::clone(&metrics),
            settings.ca_dir.clone(),
        ));

        let ns = settings.namespace.as_str();
        let mut tasks = vec![
            spawn_watcher::<System>(&kube_client, ns, &reconciler),
            spawn_watcher::<PlatformNetwork>(&kube_client, ns, &reconciler),
            spawn_watcher::<DataNetwork>(&kube_client, ns, &reconciler),
            spawn_watcher::<PtpInstance>(&kube_client, ns, &reconciler),
            spawn_watcher::<PtpInterface>(&kube_client, ns, &reconciler),
            spawn_watcher::<HostProfile>(&kube_client, ns, &reconciler),
            spawn_watcher::<Host>(&kube_client, ns, &reconciler),
        ];
        tasks.push(("metrics", tokio::spawn(metrics::serve(settings.metrics_addr, metrics))));

        Ok(Self { tasks })
    }

    /// Runs until a task exits or the process is interrupted.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Deployment manager running");

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        tokio::select! {
            (result, index, rest) = select_all(handles) => {
                for handle in rest {
                    handle.abort();
                }
                let name = names.get(index).copied().unwrap_or("unknown");
                result
                    .map_err(|e| ControllerError::Watch(format!("{} task panicked: {}", name, e)))??;
                Err(ControllerError::Watch(format!("{} task exited", name)))
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for the interrupt signal: {}", e);
                }
                info!("Shutting down");
                Ok(())
            }
        }
    }
}
