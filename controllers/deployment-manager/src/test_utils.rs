//! Test utilities for unit testing reconcilers
//!
//! An in-memory declarative store, object builders and a reconciler wired to
//! the mock platform client.

use crate::config::ReconcilerConfig;
use crate::error::{ControllerError, Result};
use crate::events::EventSeverity;
use crate::manager::{ClientFactory, PlatformManager};
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::store::{Managed, ResourceKind, ResourceStore};
use async_trait::async_trait;
use crds::*;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use platform_client::{
    Credentials, MockPlatformClient, PlatformClientTrait, SystemCapabilities, SystemRecord,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Namespace used by every fixture
pub const NAMESPACE: &str = "deployment";

/// Event captured by the mock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub severity: EventSeverity,
    pub reason: String,
    pub note: String,
}

type ObjectKey = (ResourceKind, String, String);

/// In-memory [`ResourceStore`] applying JSON merge patches.
#[derive(Default)]
pub struct MockResourceStore {
    objects: Mutex<HashMap<ObjectKey, Value>>,
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    events: Mutex<Vec<RecordedEvent>>,
    version: AtomicU64,
}

/// RFC 7386 merge patch: objects merge recursively, `null` removes a key and
/// anything else replaces the target.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(entries) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(map) = target {
        for (key, value) in entries {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

impl MockResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 2).to_string()
    }

    /// Store an object, defaulting its namespace to [`NAMESPACE`].
    pub fn insert<K: Managed>(&self, obj: &K) {
        let mut value = serde_json::to_value(obj).unwrap();
        let namespace = obj.namespace().unwrap_or_else(|| NAMESPACE.to_string());
        value["metadata"]["namespace"] = json!(namespace);
        if value.pointer("/metadata/resourceVersion").is_none() {
            value["metadata"]["resourceVersion"] = json!(self.next_version());
        }
        self.objects
            .lock()
            .unwrap()
            .insert((K::KIND, namespace, obj.name_any()), value);
    }

    /// Current version of an object.
    pub fn object<K: Managed>(&self, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(K::KIND, NAMESPACE.to_string(), name.to_string()))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    pub fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    /// Value of an annotation on an object.
    pub fn annotation(&self, kind: ResourceKind, name: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, NAMESPACE.to_string(), name.to_string()))
            .and_then(|value| value.pointer("/metadata/annotations").cloned())
            .and_then(|annotations| annotations.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// Notification counter of an object.
    pub fn notifications(&self, kind: ResourceKind, name: &str) -> u64 {
        self.annotation(kind, name, NOTIFICATIONS_ANNOTATION)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// True when an event with `reason` whose note contains `text` was published.
    pub fn has_event(&self, reason: &str, text: &str) -> bool {
        self.events()
            .iter()
            .any(|e| e.reason == reason && e.note.contains(text))
    }

    fn apply(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()> {
        let key = (kind, namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get_mut(&key) else {
            return Err(ControllerError::MissingKubernetesResource(format!(
                "{} {}/{}",
                kind, namespace, name
            )));
        };
        merge_patch(current, patch);
        current["metadata"]["resourceVersion"] = json!(self.next_version());

        let deleting = current.pointer("/metadata/deletionTimestamp").is_some();
        let finalized = current
            .pointer("/metadata/finalizers")
            .and_then(Value::as_array)
            .is_none_or(Vec::is_empty);
        if deleting && finalized {
            objects.remove(&key);
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MockResourceStore {
    async fn get_raw(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_raw(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>> {
        let objects = self.objects.lock().unwrap();
        let mut items: Vec<(String, Value)> = objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|((_, _, name), value)| (name.clone(), value.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items.into_iter().map(|(_, value)| value).collect())
    }

    async fn patch_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()> {
        self.apply(kind, namespace, name, patch)
    }

    async fn patch_status_raw(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) -> Result<()> {
        self.apply(kind, namespace, name, patch)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn publish_event(&self, _reference: &ObjectReference, severity: EventSeverity, reason: &str, note: &str) {
        self.events.lock().unwrap().push(RecordedEvent {
            severity,
            reason: reason.to_string(),
            note: note.to_string(),
        });
    }
}

/// Factory handing out clones of one mock client.
pub struct MockClientFactory {
    client: MockPlatformClient,
    builds: AtomicUsize,
}

impl MockClientFactory {
    pub fn new(client: MockPlatformClient) -> Self {
        Self {
            client,
            builds: AtomicUsize::new(0),
        }
    }

    /// Number of clients built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn build(&self, _credentials: &Credentials, _trust_anchors: &[Vec<u8>]) -> Result<Arc<dyn PlatformClientTrait>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.client.clone()))
    }
}

/// Object metadata in the test namespace.
pub fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(format!("uid-{}", name)),
        resource_version: Some("1".to_string()),
        ..Default::default()
    }
}

pub fn host(name: &str, profile: &str) -> Host {
    Host {
        metadata: meta(name),
        spec: HostSpec {
            profile: profile.to_string(),
            ..Default::default()
        },
        status: None,
    }
}

pub fn host_profile(name: &str, spec: HostProfileSpec) -> HostProfile {
    HostProfile {
        metadata: meta(name),
        spec,
    }
}

pub fn system(name: &str, spec: SystemSpec) -> System {
    System {
        metadata: meta(name),
        spec,
        status: None,
    }
}

pub fn platform_network(name: &str, spec: PlatformNetworkSpec) -> PlatformNetwork {
    PlatformNetwork {
        metadata: meta(name),
        spec,
        status: None,
    }
}

pub fn data_network(name: &str, spec: DataNetworkSpec) -> DataNetwork {
    DataNetwork {
        metadata: meta(name),
        spec,
        status: None,
    }
}

pub fn ptp_instance(name: &str, service: &str, parameters: &[&str]) -> PtpInstance {
    PtpInstance {
        metadata: meta(name),
        spec: PtpInstanceSpec {
            service: service.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        },
        status: None,
    }
}

pub fn ptp_interface(name: &str, instance: &str, parameters: &[&str]) -> PtpInterface {
    PtpInterface {
        metadata: meta(name),
        spec: PtpInterfaceSpec {
            ptp_instance: instance.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        },
        status: None,
    }
}

/// Add the kind's finalizer to an object.
pub fn with_finalizer<K: Managed>(mut obj: K) -> K {
    if let Some(finalizer) = K::FINALIZER {
        obj.finalizers_mut().push(finalizer.to_string());
    }
    obj
}

/// Mark an object as being deleted.
pub fn deleting<K: Managed>(obj: K) -> K {
    let mut value = serde_json::to_value(&obj).unwrap();
    value["metadata"]["deletionTimestamp"] = json!("2026-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

/// Standard duplex system record.
pub fn system_record() -> SystemRecord {
    SystemRecord {
        id: "system-uuid".to_string(),
        name: "cluster".to_string(),
        system_type: platform_client::SYSTEM_TYPE_STANDARD.to_string(),
        system_mode: platform_client::SYSTEM_MODE_DUPLEX.to_string(),
        software_version: "22.12".to_string(),
        capabilities: SystemCapabilities {
            https_enabled: true,
            vswitch_type: Some("none".to_string()),
        },
        ..Default::default()
    }
}

/// Platform host record in the given states.
pub fn platform_host(id: &str, hostname: &str, personality: &str, admin: &str, oper: &str, avail: &str) -> platform_client::Host {
    platform_client::Host {
        id: id.to_string(),
        hostname: Some(hostname.to_string()),
        personality: Some(personality.to_string()),
        subfunctions: personality.to_string(),
        administrative_state: admin.to_string(),
        operational_status: oper.to_string(),
        availability_status: avail.to_string(),
        inv_state: Some(platform_client::INV_STATE_INVENTORIED.to_string()),
        ..Default::default()
    }
}

/// Reconciler with the client installed and the system ready.
pub fn reconciler(store: &Arc<MockResourceStore>, client: &MockPlatformClient) -> Reconciler {
    reconciler_with_config(store, client, ReconcilerConfig::default())
}

pub fn reconciler_with_config(
    store: &Arc<MockResourceStore>,
    client: &MockPlatformClient,
    config: ReconcilerConfig,
) -> Reconciler {
    let store: Arc<dyn ResourceStore> = Arc::clone(store) as Arc<dyn ResourceStore>;
    let metrics = Arc::new(Metrics::new().unwrap());
    let manager = Arc::new(PlatformManager::new(
        Arc::clone(&store),
        Arc::new(MockClientFactory::new(client.clone())),
        Arc::clone(&metrics),
    ));
    manager.set_client(NAMESPACE, Arc::new(client.clone()));
    manager.set_system_ready(NAMESPACE, true);
    manager.set_system_info(
        NAMESPACE,
        platform_client::SYSTEM_TYPE_STANDARD,
        platform_client::SYSTEM_MODE_DUPLEX,
    );

    let ca_dir = std::env::temp_dir().join(format!("deployment-manager-{}", uuid::Uuid::new_v4()));
    Reconciler::new(store, manager, config, metrics, ca_dir)
}
