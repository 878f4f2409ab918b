//! Kubernetes events attached to the reconciled objects.
//!
//! Every event is also logged, at `info` for normal events and `warn` for
//! warnings, with the object name as a prefix.

use crate::store::{Managed, ResourceStore};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use tracing::{info, warn};

/// A platform resource was created
pub const REASON_CREATED: &str = "Created";
/// A platform resource was updated
pub const REASON_UPDATED: &str = "Updated";
/// A platform resource was deleted
pub const REASON_DELETED: &str = "Deleted";
/// Reconciliation is waiting on a monitor or a transition
pub const REASON_WAIT: &str = "Wait";
/// Reconciliation is blocked by a missing dependency
pub const REASON_DEPENDENCY: &str = "Dependency";
/// Reconciliation failed
pub const REASON_FAILED: &str = "Failed";

/// Event type, mirrors the Kubernetes `Normal`/`Warning` split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// Build an `ObjectReference` for any CRD handled by the manager.
pub fn object_ref<K: Resource<DynamicType = ()>>(obj: &K) -> ObjectReference {
    ObjectReference {
        api_version: Some(K::api_version(&()).to_string()),
        kind: Some(K::kind(&()).to_string()),
        name: Some(obj.name_any()),
        namespace: obj.namespace(),
        uid: obj.meta().uid.clone(),
        resource_version: obj.meta().resource_version.clone(),
        ..Default::default()
    }
}

/// Log and publish an event on `obj`.
///
/// Publishing failures are logged by the store and never fail the reconcile.
pub async fn publish<K: Managed>(
    store: &dyn ResourceStore,
    obj: &K,
    severity: EventSeverity,
    reason: &str,
    message: impl AsRef<str>,
) {
    let note = format!("{}: {}", obj.name_any(), message.as_ref());
    match severity {
        EventSeverity::Normal => info!(kind = %K::KIND, reason, "{}", note),
        EventSeverity::Warning => warn!(kind = %K::KIND, reason, "{}", note),
    }
    store
        .publish_event(&object_ref(obj), severity, reason, &note)
        .await;
}

/// Publish a `Normal` event.
pub async fn normal<K: Managed>(store: &dyn ResourceStore, obj: &K, reason: &str, message: impl AsRef<str>) {
    publish(store, obj, EventSeverity::Normal, reason, message).await;
}

/// Publish a `Warning` event.
pub async fn warning<K: Managed>(store: &dyn ResourceStore, obj: &K, reason: &str, message: impl AsRef<str>) {
    publish(store, obj, EventSeverity::Warning, reason, message).await;
}
