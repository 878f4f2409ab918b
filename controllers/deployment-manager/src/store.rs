//! Access to the declarative objects and secrets.
//!
//! Reconcilers never hold a `kube::Api` directly. They go through the
//! [`ResourceStore`] seam, which works on JSON values so that it stays object
//! safe, and through the typed helpers in this module built on top of it.
//! [`KubeStore`] is the production implementation; tests use an in-memory
//! store.

use crate::error::{ControllerError, Result};
use crate::events::EventSeverity;
use async_trait::async_trait;
use crds::{
    DataNetwork, Host, HostProfile, PlatformNetwork, PtpInstance, PtpInterface, System,
    DATA_NETWORK_FINALIZER, GROUP, HOST_FINALIZER, NOTIFICATIONS_ANNOTATION,
    PLATFORM_NETWORK_FINALIZER, PTP_INSTANCE_FINALIZER, PTP_INTERFACE_FINALIZER,
    SYSTEM_FINALIZER, VERSION,
};
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::runtime::events::{Event as KubeEvent, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Declarative kinds handled by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    System,
    PlatformNetwork,
    DataNetwork,
    PtpInstance,
    PtpInterface,
    HostProfile,
    Host,
}

impl ResourceKind {
    /// Kubernetes kind name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::PlatformNetwork => "PlatformNetwork",
            Self::DataNetwork => "DataNetwork",
            Self::PtpInstance => "PtpInstance",
            Self::PtpInterface => "PtpInterface",
            Self::HostProfile => "HostProfile",
            Self::Host => "Host",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-safe access to declarative objects, secrets and events.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one object, `None` when it does not exist.
    async fn get_raw(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>>;

    /// List every object of a kind in a namespace.
    async fn list_raw(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>>;

    /// JSON merge patch against the object (metadata and spec).
    async fn patch_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()>;

    /// JSON merge patch against the status subresource.
    async fn patch_status_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()>;

    /// Secret data, `None` when the secret does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>>;

    /// Publish an event. Failures are logged, never returned.
    async fn publish_event(&self, reference: &ObjectReference, severity: EventSeverity, reason: &str, note: &str);
}

/// A CRD reconciled by the manager.
pub trait Managed:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag
    const KIND: ResourceKind;

    /// Finalizer key, `None` for kinds without a platform counterpart
    const FINALIZER: Option<&'static str>;
}

macro_rules! managed {
    ($($ty:ty => $kind:ident, $finalizer:expr;)*) => {
        $(
            impl Managed for $ty {
                const KIND: ResourceKind = ResourceKind::$kind;
                const FINALIZER: Option<&'static str> = $finalizer;
            }
        )*
    };
}

managed! {
    System => System, Some(SYSTEM_FINALIZER);
    PlatformNetwork => PlatformNetwork, Some(PLATFORM_NETWORK_FINALIZER);
    DataNetwork => DataNetwork, Some(DATA_NETWORK_FINALIZER);
    PtpInstance => PtpInstance, Some(PTP_INSTANCE_FINALIZER);
    PtpInterface => PtpInterface, Some(PTP_INTERFACE_FINALIZER);
    HostProfile => HostProfile, None;
    Host => Host, Some(HOST_FINALIZER);
}

/// Fetch a typed object.
pub async fn get<K: Managed>(store: &dyn ResourceStore, namespace: &str, name: &str) -> Result<Option<K>> {
    match store.get_raw(K::KIND, namespace, name).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// List typed objects.
pub async fn list<K: Managed>(store: &dyn ResourceStore, namespace: &str) -> Result<Vec<K>> {
    store
        .list_raw(K::KIND, namespace)
        .await?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(ControllerError::from))
        .collect()
}

fn namespace_of<K: Managed>(obj: &K) -> String {
    obj.namespace().unwrap_or_default()
}

/// Merge `status` into the object's status.
pub async fn patch_status<K: Managed>(store: &dyn ResourceStore, obj: &K, status: Value) -> Result<()> {
    let patch = json!({ "status": status });
    store
        .patch_status_raw(K::KIND, &namespace_of(obj), &obj.name_any(), &patch)
        .await
}

/// True when the object carries its finalizer.
pub fn has_finalizer<K: Managed>(obj: &K) -> bool {
    K::FINALIZER.is_some_and(|f| obj.finalizers().iter().any(|existing| existing == f))
}

fn finalizer_patch<K: Managed>(obj: &K, finalizers: Vec<String>) -> Value {
    json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": obj.resource_version(),
        }
    })
}

/// Add the kind's finalizer. The patch carries the resource version so a
/// concurrent writer surfaces as a conflict.
pub async fn add_finalizer<K: Managed>(store: &dyn ResourceStore, obj: &K) -> Result<()> {
    let Some(finalizer) = K::FINALIZER else {
        return Ok(());
    };
    if has_finalizer(obj) {
        return Ok(());
    }

    let mut finalizers = obj.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    debug!("Adding finalizer {} to {} {}", finalizer, K::KIND, obj.name_any());
    store
        .patch_raw(K::KIND, &namespace_of(obj), &obj.name_any(), &finalizer_patch(obj, finalizers))
        .await
}

/// Remove the kind's finalizer.
pub async fn remove_finalizer<K: Managed>(store: &dyn ResourceStore, obj: &K) -> Result<()> {
    let Some(finalizer) = K::FINALIZER else {
        return Ok(());
    };
    if !has_finalizer(obj) {
        return Ok(());
    }

    let finalizers: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();
    debug!("Removing finalizer {} from {} {}", finalizer, K::KIND, obj.name_any());
    store
        .patch_raw(K::KIND, &namespace_of(obj), &obj.name_any(), &finalizer_patch(obj, finalizers))
        .await
}

/// Set a single annotation.
pub async fn annotate(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let patch = json!({ "metadata": { "annotations": { key: value } } });
    store.patch_raw(kind, namespace, name, &patch).await
}

/// Bump the notifications counter so the object is reconciled again.
///
/// Returns `false` when the object no longer exists.
pub async fn notify(store: &dyn ResourceStore, kind: ResourceKind, namespace: &str, name: &str) -> Result<bool> {
    let Some(current) = store.get_raw(kind, namespace, name).await? else {
        return Ok(false);
    };

    let count = current
        .pointer("/metadata/annotations")
        .and_then(|a| a.get(NOTIFICATIONS_ANNOTATION))
        .and_then(Value::as_str)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    debug!("Notifying {} {}/{} ({})", kind, namespace, name, count + 1);
    annotate(store, kind, namespace, name, NOTIFICATIONS_ANNOTATION, &(count + 1).to_string()).await?;
    Ok(true)
}

/// Notify every object of `kind` in the namespace.
pub async fn notify_all(store: &dyn ResourceStore, kind: ResourceKind, namespace: &str) -> Result<()> {
    for value in store.list_raw(kind, namespace).await? {
        if let Some(name) = value.pointer("/metadata/name").and_then(Value::as_str) {
            notify(store, kind, namespace, name).await?;
        }
    }
    Ok(())
}

/// Production store backed by the Kubernetes API.
pub struct KubeStore {
    client: Client,
    reporter: Reporter,
}

impl KubeStore {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self { client, reporter }
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, kind.as_str());
        let resource = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_raw(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        match self.api(kind, namespace).get_opt(name).await? {
            Some(obj) => Ok(Some(serde_json::to_value(&obj)?)),
            None => Ok(None),
        }
    }

    async fn list_raw(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>> {
        let objects = self.api(kind, namespace).list(&ListParams::default()).await?;
        objects
            .items
            .iter()
            .map(|obj| serde_json::to_value(obj).map_err(ControllerError::from))
            .collect()
    }

    async fn patch_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()> {
        self.api(kind, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn patch_status_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()> {
        self.api(kind, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }

    async fn publish_event(&self, reference: &ObjectReference, severity: EventSeverity, reason: &str, note: &str) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone());
        let type_ = match severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        if let Err(e) = recorder
            .publish(
                &KubeEvent {
                    type_,
                    reason: reason.to_string(),
                    note: Some(note.to_string()),
                    action: "Reconcile".to_string(),
                    secondary: None,
                },
                reference,
            )
            .await
        {
            warn!(%e, "failed to publish event");
        }
    }
}
