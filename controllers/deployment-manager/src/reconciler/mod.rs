//! Reconciliation logic for the deployment manager CRDs.
//!
//! Every kind goes through [`Reconciler::reconcile`], which handles the
//! finalizer, the feature toggle, the platform client and system-ready
//! gates, metrics and error events. The kind specific work lives in the
//! submodules:
//! - `system`: platform-wide configuration and client bootstrap
//! - `platform_network`, `data_network`, `ptp`: network resources
//! - `host_profile`: propagation of profile changes to Hosts
//! - `host`: the host provisioning pipeline

pub mod data_network;
pub mod host;
pub mod host_profile;
pub mod platform_network;
pub mod ptp;
pub mod system;


use crate::backoff::BackoffTracker;
use crate::config::ReconcilerConfig;
use crate::error::{ControllerError, Result, RetryPolicy};
use crate::events::{self, EventSeverity, REASON_DELETED, REASON_UPDATED};
use crate::manager::PlatformManager;
use crate::metrics::{Metrics, RESULT_ERROR, RESULT_SUCCESS};
use crate::monitor::{KubernetesResource, Monitor, MonitorOwner};
use crate::store::{self, Managed, ResourceStore};
use async_trait::async_trait;
use crds::RECONCILE_AFTER_INSYNC_ANNOTATION;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use platform_client::PlatformClientTrait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Kind specific reconcile hooks.
#[async_trait]
pub trait Reconcile: Managed {
    /// Feature toggle gating the kind
    const TOGGLE: &'static str;

    /// Whether the kind needs the namespace client and a ready system
    const NEEDS_PLATFORM: bool = true;

    /// Drive the platform towards the declared state.
    async fn apply(&self, reconciler: &Reconciler) -> Result<()>;

    /// Release the platform resources before the finalizer is removed.
    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()>;
}

/// `inSync`/`reconciled` pair read from an object's status before a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    pub in_sync: bool,
    pub reconciled: bool,
}

/// Reconciles every deployment manager kind.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) manager: Arc<PlatformManager>,
    pub(crate) config: ReconcilerConfig,
    pub(crate) metrics: Arc<Metrics>,
    /// Directory receiving the platform root CA certificates
    pub(crate) ca_dir: PathBuf,
    backoff: BackoffTracker,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        manager: Arc<PlatformManager>,
        config: ReconcilerConfig,
        metrics: Arc<Metrics>,
        ca_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            manager,
            config,
            metrics,
            ca_dir,
            backoff: BackoffTracker::new(),
        }
    }

    pub(crate) fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    /// Backoff key of an object.
    pub fn backoff_key<K: Managed>(obj: &K) -> String {
        format!(
            "{}/{}/{}",
            K::KIND,
            obj.namespace().unwrap_or_default(),
            obj.name_any()
        )
    }

    /// Reconcile one object.
    ///
    /// The object is re-read from the store first so that the pass works on
    /// the latest finalizers, annotations and status.
    pub async fn reconcile<K: Reconcile>(&self, obj: Arc<K>) -> Result<Action> {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();

        let Some(current) = store::get::<K>(self.store(), &namespace, &name).await? else {
            debug!("{} {}/{} no longer exists", K::KIND, namespace, name);
            return Ok(Action::await_change());
        };
        if let Some(uid) = current.uid() {
            self.manager.cancel_monitors(&uid);
        }

        debug!("Reconciling {} {}/{}", K::KIND, namespace, name);
        let start = Instant::now();
        let result = self.dispatch(&current).await;
        let outcome = if result.is_ok() { RESULT_SUCCESS } else { RESULT_ERROR };
        self.metrics
            .record_reconcile(K::KIND.as_str(), outcome, start.elapsed());

        match result {
            Ok(()) => {
                self.backoff.reset(&Self::backoff_key(&current));
                Ok(Action::await_change())
            }
            Err(e) => {
                self.handle_error(&current, &e).await;
                Err(e)
            }
        }
    }

    async fn dispatch<K: Reconcile>(&self, obj: &K) -> Result<()> {
        let namespace = obj.namespace().unwrap_or_default();

        if obj.meta().deletion_timestamp.is_some() {
            if !store::has_finalizer(obj) {
                return Ok(());
            }
            if K::NEEDS_PLATFORM {
                self.client_for(&namespace)?;
            }
            obj.cleanup(self).await?;
            store::remove_finalizer(self.store(), obj).await?;
            events::normal(self.store(), obj, REASON_DELETED, "finalizer removed").await;
            return Ok(());
        }

        if K::FINALIZER.is_some() && !store::has_finalizer(obj) {
            return store::add_finalizer(self.store(), obj).await;
        }

        if !self.config.is_enabled(K::TOGGLE) {
            debug!("{} reconciler disabled, skipping {}", K::TOGGLE, obj.name_any());
            return Ok(());
        }

        if K::NEEDS_PLATFORM {
            self.client_for(&namespace)?;
            if !self.manager.is_system_ready(&namespace) {
                return Err(ControllerError::SystemNotReady(namespace));
            }
        }

        obj.apply(self).await
    }

    /// Surface a failed pass as an event and reset the client on transport
    /// failures.
    async fn handle_error<K: Reconcile>(&self, obj: &K, error: &ControllerError) {
        match error {
            ControllerError::MissingClient(_) | ControllerError::SystemNotReady(_) => {
                debug!("{} {} deferred: {}", K::KIND, obj.name_any(), error);
            }
            ControllerError::WaitForMonitor(_)
            | ControllerError::ResourceStatusDependency(_)
            | ControllerError::MissingKubernetesResource(_)
            | ControllerError::ChangeAfterReconciled(_) => {
                events::publish(self.store(), obj, EventSeverity::Normal, error.event_reason(), error.to_string()).await;
            }
            _ => {
                events::publish(self.store(), obj, EventSeverity::Warning, error.event_reason(), error.to_string()).await;
            }
        }

        if error.requires_client_reset() {
            let namespace = obj.namespace().unwrap_or_default();
            if let Err(e) = self.manager.reset_client(&namespace).await {
                warn!("Failed to reset platform client for {}: {}", namespace, e);
            }
        }
    }

    /// Requeue action for a failed pass.
    pub fn error_action(&self, key: &str, error: &ControllerError) -> Action {
        match error.retry_policy() {
            RetryPolicy::AwaitChange => Action::await_change(),
            RetryPolicy::Backoff => Action::requeue(self.backoff.next(key)),
            policy => policy
                .interval()
                .map_or_else(Action::await_change, Action::requeue),
        }
    }

    /// Platform client of a namespace.
    pub(crate) fn client_for(&self, namespace: &str) -> Result<Arc<dyn PlatformClientTrait>> {
        self.manager
            .client(namespace)
            .ok_or_else(|| ControllerError::MissingClient(namespace.to_string()))
    }

    /// Platform client of the object's namespace.
    pub(crate) fn client_of<K: Managed>(&self, obj: &K) -> Result<Arc<dyn PlatformClientTrait>> {
        self.client_for(&obj.namespace().unwrap_or_default())
    }

    /// Attach a monitor to `obj` and return the error that parks the pass
    /// until it fires.
    pub(crate) fn wait_for<K: Managed>(&self, obj: &K, monitor: impl Monitor, message: impl Into<String>) -> ControllerError {
        self.manager.start_monitor(MonitorOwner::of(obj), Box::new(monitor));
        ControllerError::WaitForMonitor(message.into())
    }

    /// Data of a secret in the object's namespace. A missing secret arms a
    /// presence monitor.
    pub(crate) async fn secret<K: Managed>(&self, obj: &K, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let namespace = obj.namespace().unwrap_or_default();
        if let Some(data) = self.store.get_secret(&namespace, name).await? {
            return Ok(data);
        }

        self.manager.start_monitor(
            MonitorOwner::of(obj),
            Box::new(KubernetesResource {
                namespace: namespace.clone(),
                secret: name.to_string(),
            }),
        );
        Err(ControllerError::MissingKubernetesResource(format!(
            "secret {}/{}",
            namespace, name
        )))
    }

    /// Refuse platform changes once the object has been reconciled, unless
    /// stop-after-in-sync is disabled or the override annotation is present.
    pub(crate) fn allow_change<K: Managed>(&self, obj: &K, toggle: &str, reconciled: bool, creating: bool) -> Result<()> {
        if !reconciled || !self.config.stop_after_in_sync(toggle) {
            return Ok(());
        }

        if obj.annotations().contains_key(RECONCILE_AFTER_INSYNC_ANNOTATION) {
            info!("{} {}: changes allowed after reconciled", K::KIND, obj.name_any());
            return Ok(());
        }

        let message = if creating {
            "no provisioning after reconciled"
        } else {
            "no changes allowed after reconciled"
        };
        Err(ControllerError::ChangeAfterReconciled(format!(
            "{} {}: {}",
            K::KIND,
            obj.name_any(),
            message
        )))
    }

    /// Persist `fields` together with `inSync` and the monotonic
    /// `reconciled` flag, and publish an event when `inSync` flips.
    pub(crate) async fn sync_status<K: Managed>(
        &self,
        obj: &K,
        previous: SyncState,
        in_sync: bool,
        mut fields: Map<String, Value>,
    ) -> Result<()> {
        fields.insert("inSync".to_string(), Value::Bool(in_sync));
        fields.insert("reconciled".to_string(), Value::Bool(previous.reconciled || in_sync));
        store::patch_status(self.store(), obj, Value::Object(fields)).await?;

        if previous.in_sync != in_sync {
            events::normal(
                self.store(),
                obj,
                REASON_UPDATED,
                format!("synchronization has changed to: {}", in_sync),
            )
            .await;
        }
        Ok(())
    }
}
