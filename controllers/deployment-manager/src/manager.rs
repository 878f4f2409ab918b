//! Per-namespace shared state.
//!
//! The [`PlatformManager`] holds, for each namespace, the authenticated
//! platform client, the system-ready flag and the detected system type and
//! mode. It also owns the registry of running monitors, keyed by
//! `(owner uid, monitor kind)`. All of this sits behind one mutex whose
//! critical sections only swap pointers and look up maps.

use crate::error::{ControllerError, Result, RetryPolicy};
use crate::metrics::Metrics;
use crate::monitor::{Monitor, MonitorKind, MonitorOwner};
use crate::store::{self, ResourceKind, ResourceStore};
use async_trait::async_trait;
use platform_client::{Credentials, PlatformClient, PlatformClientTrait};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds platform clients from endpoint credentials.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Authenticate and return a client trusting `trust_anchors` in
    /// addition to the built-in roots.
    async fn build(&self, credentials: &Credentials, trust_anchors: &[Vec<u8>]) -> Result<Arc<dyn PlatformClientTrait>>;
}

/// Factory producing keystone-authenticated REST clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeystoneClientFactory;

#[async_trait]
impl ClientFactory for KeystoneClientFactory {
    async fn build(&self, credentials: &Credentials, trust_anchors: &[Vec<u8>]) -> Result<Arc<dyn PlatformClientTrait>> {
        let client = PlatformClient::connect(credentials, trust_anchors).await?;
        Ok(Arc::new(client))
    }
}

#[derive(Default)]
struct NamespaceState {
    client: Option<Arc<dyn PlatformClientTrait>>,
    system_ready: bool,
    system_type: Option<String>,
    system_mode: Option<String>,
}

struct MonitorEntry {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ManagerState {
    namespaces: HashMap<String, NamespaceState>,
    monitors: HashMap<(String, MonitorKind), MonitorEntry>,
    next_monitor_id: u64,
}

/// Shared state passed to every reconciler.
pub struct PlatformManager {
    store: Arc<dyn ResourceStore>,
    factory: Arc<dyn ClientFactory>,
    metrics: Arc<Metrics>,
    state: Mutex<ManagerState>,
}

impl std::fmt::Debug for PlatformManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformManager").finish_non_exhaustive()
    }
}

impl PlatformManager {
    pub fn new(store: Arc<dyn ResourceStore>, factory: Arc<dyn ClientFactory>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            factory,
            metrics,
            state: Mutex::new(ManagerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declarative store shared with the reconcilers.
    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    /// Current platform client for the namespace.
    pub fn client(&self, namespace: &str) -> Option<Arc<dyn PlatformClientTrait>> {
        self.lock().namespaces.get(namespace).and_then(|ns| ns.client.clone())
    }

    pub fn set_client(&self, namespace: &str, client: Arc<dyn PlatformClientTrait>) {
        self.lock().namespaces.entry(namespace.to_string()).or_default().client = Some(client);
    }

    /// Authenticate a new client for the namespace and install it.
    ///
    /// # Errors
    ///
    /// Returns the factory error when authentication fails.
    pub async fn build_client(
        &self,
        namespace: &str,
        credentials: &Credentials,
        trust_anchors: &[Vec<u8>],
    ) -> Result<Arc<dyn PlatformClientTrait>> {
        let client = self.factory.build(credentials, trust_anchors).await?;
        info!("Platform client built for namespace {} ({})", namespace, client.base_url());
        self.set_client(namespace, Arc::clone(&client));
        Ok(client)
    }

    /// Drop the namespace client and wake the System so that it rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns the store error when the System cannot be notified.
    pub async fn reset_client(&self, namespace: &str) -> Result<()> {
        let dropped = self
            .lock()
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.client.take())
            .is_some();
        if dropped {
            warn!("Platform client for namespace {} reset", namespace);
        }
        store::notify_all(self.store.as_ref(), ResourceKind::System, namespace).await
    }

    pub fn is_system_ready(&self, namespace: &str) -> bool {
        self.lock().namespaces.get(namespace).is_some_and(|ns| ns.system_ready)
    }

    pub fn set_system_ready(&self, namespace: &str, ready: bool) {
        self.lock().namespaces.entry(namespace.to_string()).or_default().system_ready = ready;
    }

    /// Cache the system type and mode detected by the System reconciler.
    pub fn set_system_info(&self, namespace: &str, system_type: &str, system_mode: &str) {
        let mut state = self.lock();
        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        ns.system_type = Some(system_type.to_string());
        ns.system_mode = Some(system_mode.to_string());
    }

    pub fn system_type(&self, namespace: &str) -> Option<String> {
        self.lock().namespaces.get(namespace).and_then(|ns| ns.system_type.clone())
    }

    pub fn system_mode(&self, namespace: &str) -> Option<String> {
        self.lock().namespaces.get(namespace).and_then(|ns| ns.system_mode.clone())
    }

    /// Wake every reconciler waiting on the System.
    ///
    /// # Errors
    ///
    /// Returns the first store error encountered.
    pub async fn notify_dependents(&self, namespace: &str) -> Result<()> {
        info!("Notifying reconcilers waiting on the system in namespace {}", namespace);
        for kind in [
            ResourceKind::PlatformNetwork,
            ResourceKind::DataNetwork,
            ResourceKind::PtpInstance,
            ResourceKind::PtpInterface,
            ResourceKind::Host,
        ] {
            store::notify_all(self.store.as_ref(), kind, namespace).await?;
        }
        Ok(())
    }

    /// Start a monitor for `owner`, replacing any running monitor of the
    /// same kind on the same owner.
    pub fn start_monitor(self: &Arc<Self>, owner: MonitorOwner, monitor: Box<dyn Monitor>) {
        let kind = monitor.kind();
        let key = (owner.uid.clone(), kind);
        let manager = Arc::clone(self);

        let mut state = self.lock();
        state.next_monitor_id += 1;
        let id = state.next_monitor_id;
        if let Some(previous) = state.monitors.remove(&key) {
            debug!("Replacing {} monitor on {}", kind, owner);
            previous.handle.abort();
        }
        info!("Starting {} monitor on {}", kind, owner);
        let handle = tokio::spawn(async move { manager.run_monitor(id, owner, monitor).await });
        state.monitors.insert(key, MonitorEntry { id, handle });
        let count = state.monitors.len();
        drop(state);

        self.metrics.set_active_monitors(count);
    }

    /// Cancel every monitor attached to the owner.
    pub fn cancel_monitors(&self, uid: &str) {
        let mut state = self.lock();
        let keys: Vec<_> = state.monitors.keys().filter(|(owner, _)| owner == uid).cloned().collect();
        for key in keys {
            if let Some(entry) = state.monitors.remove(&key) {
                debug!("Cancelling {} monitor on {}", key.1, uid);
                entry.handle.abort();
            }
        }
        let count = state.monitors.len();
        drop(state);

        self.metrics.set_active_monitors(count);
    }

    /// Number of registered monitors.
    pub fn active_monitors(&self) -> usize {
        self.lock().monitors.len()
    }

    /// Kinds of the monitors registered for an owner.
    pub fn monitor_kinds(&self, uid: &str) -> Vec<MonitorKind> {
        let mut kinds: Vec<MonitorKind> = self
            .lock()
            .monitors
            .keys()
            .filter(|(owner, _)| owner == uid)
            .map(|(_, kind)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    async fn run_monitor(self: Arc<Self>, id: u64, owner: MonitorOwner, monitor: Box<dyn Monitor>) {
        let interval = monitor.interval();
        loop {
            tokio::time::sleep(interval).await;

            match self.store.get_raw(owner.kind, &owner.namespace, &owner.name).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("{} gone, stopping {} monitor", owner, monitor.kind());
                    break;
                }
                Err(e) => {
                    warn!("{} monitor on {} cannot read owner: {}", monitor.kind(), owner, e);
                    continue;
                }
            }

            let Some(client) = self.client(&owner.namespace) else {
                debug!("No platform client for {}, skipping {} tick", owner.namespace, monitor.kind());
                continue;
            };

            let done = match monitor.check(client.as_ref(), self.store.as_ref()).await {
                Ok(done) => done,
                Err(e) if is_transient(&e) => {
                    debug!("{} monitor on {} tick failed: {}", monitor.kind(), owner, e);
                    continue;
                }
                Err(e) => {
                    warn!("{} monitor on {} failed: {}", monitor.kind(), owner, e);
                    true
                }
            };
            if !done {
                continue;
            }

            match store::notify(self.store.as_ref(), owner.kind, &owner.namespace, &owner.name).await {
                Ok(true) => info!("{} monitor satisfied, {} re-enqueued", monitor.kind(), owner),
                Ok(false) => debug!("{} disappeared before notification", owner),
                Err(e) => warn!("Failed to notify {}: {}", owner, e),
            }
            break;
        }

        self.finish_monitor(&owner.uid, monitor.kind(), id);
    }

    fn finish_monitor(&self, uid: &str, kind: MonitorKind, id: u64) {
        let mut state = self.lock();
        let key = (uid.to_string(), kind);
        if state.monitors.get(&key).is_some_and(|entry| entry.id == id) {
            state.monitors.remove(&key);
        }
        let count = state.monitors.len();
        drop(state);

        self.metrics.set_active_monitors(count);
    }
}

fn is_transient(e: &ControllerError) -> bool {
    matches!(e.retry_policy(), RetryPolicy::Network | RetryPolicy::Dns)
}
