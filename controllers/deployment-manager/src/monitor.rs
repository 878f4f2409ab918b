//! Background monitors
//!
//! A monitor polls a predicate against the platform (or the declarative
//! store) on a fixed interval. When the predicate holds, the owning object is
//! re-enqueued by bumping its notifications annotation. Monitors never mutate
//! platform state. They are started and cancelled through
//! [`crate::manager::PlatformManager`], which keys them by owner uid and kind
//! so that at most one monitor of each kind runs per object.

use crate::error::Result;
use crate::reconciler::host::discovery;
use crate::store::{Managed, ResourceKind, ResourceStore};
use async_trait::async_trait;
use crds::MatchInfo;
use kube::ResourceExt;
use platform_client::{
    PlatformClientTrait, CEPH_MONITOR_CONFIGURED, DEPLOYMENT_MODEL_UNDEFINED, FILESYSTEM_STATE_RESIZING,
    PERSONALITY_CONTROLLER,
};
use std::fmt;
use std::time::Duration;

/// Kind of a monitor; a new monitor replaces the running one of the same
/// kind on the same owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MonitorKind {
    PartitionReady,
    ClusterPresence,
    ClusterDeploymentModel,
    StorageMonitorCount,
    StorageTier,
    HostState,
    InventoryCollected,
    EnabledControllers,
    AvailableControllers,
    ProvisioningAllowed,
    DynamicHostAppears,
    KubernetesResource,
    FilesystemResize,
    HostStateChange,
}

impl MonitorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartitionReady => "partition-ready",
            Self::ClusterPresence => "cluster-presence",
            Self::ClusterDeploymentModel => "cluster-deployment-model",
            Self::StorageMonitorCount => "storage-monitor-count",
            Self::StorageTier => "storage-tier",
            Self::HostState => "host-state",
            Self::InventoryCollected => "inventory-collected",
            Self::EnabledControllers => "enabled-controllers",
            Self::AvailableControllers => "available-controllers",
            Self::ProvisioningAllowed => "provisioning-allowed",
            Self::DynamicHostAppears => "dynamic-host-appears",
            Self::KubernetesResource => "kubernetes-resource",
            Self::FilesystemResize => "filesystem-resize",
            Self::HostStateChange => "host-state-change",
        }
    }

    /// Polling interval used unless the monitor overrides it.
    #[must_use]
    pub fn default_interval(self) -> Duration {
        let secs = match self {
            Self::HostState | Self::KubernetesResource => 10,
            Self::PartitionReady | Self::InventoryCollected => 15,
            Self::DynamicHostAppears | Self::FilesystemResize => 20,
            Self::ClusterPresence
            | Self::ClusterDeploymentModel
            | Self::StorageMonitorCount
            | Self::StorageTier
            | Self::EnabledControllers
            | Self::AvailableControllers
            | Self::ProvisioningAllowed => 30,
            Self::HostStateChange => 60,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative object a monitor re-enqueues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOwner {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl MonitorOwner {
    /// Owner descriptor for a managed object.
    pub fn of<K: Managed>(obj: &K) -> Self {
        Self {
            kind: K::KIND,
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
            uid: obj.uid().unwrap_or_else(|| format!("{}/{}", K::KIND, obj.name_any())),
        }
    }
}

impl fmt::Display for MonitorOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Predicate polled by a monitor.
#[async_trait]
pub trait Monitor: fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> MonitorKind;

    fn interval(&self) -> Duration {
        self.kind().default_interval()
    }

    /// `Ok(true)` once the owner should be reconciled again.
    async fn check(&self, client: &dyn PlatformClientTrait, store: &dyn ResourceStore) -> Result<bool>;
}

/// Waits until no partition of the host is being created, deleted or
/// modified.
#[derive(Debug, Clone)]
pub struct PartitionReady {
    pub host_id: String,
}

#[async_trait]
impl Monitor for PartitionReady {
    fn kind(&self) -> MonitorKind {
        MonitorKind::PartitionReady
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let partitions = client.list_partitions(&self.host_id).await?;
        Ok(!partitions.iter().any(|p| p.is_transient()))
    }
}

/// Waits for a storage cluster to exist.
#[derive(Debug, Clone)]
pub struct ClusterPresence {
    pub name: String,
}

#[async_trait]
impl Monitor for ClusterPresence {
    fn kind(&self) -> MonitorKind {
        MonitorKind::ClusterPresence
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        Ok(client.list_clusters().await?.iter().any(|c| c.name == self.name))
    }
}

/// Waits for the cluster deployment model to be decided.
#[derive(Debug, Clone)]
pub struct ClusterDeploymentModel {
    pub name: String,
}

#[async_trait]
impl Monitor for ClusterDeploymentModel {
    fn kind(&self) -> MonitorKind {
        MonitorKind::ClusterDeploymentModel
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        Ok(client.list_clusters().await?.iter().any(|c| {
            c.name == self.name
                && !c.deployment_model.is_empty()
                && c.deployment_model != DEPLOYMENT_MODEL_UNDEFINED
        }))
    }
}

/// Waits for enough storage monitors to be configured.
#[derive(Debug, Clone)]
pub struct StorageMonitorCount {
    pub required: usize,
}

#[async_trait]
impl Monitor for StorageMonitorCount {
    fn kind(&self) -> MonitorKind {
        MonitorKind::StorageMonitorCount
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let configured = client
            .list_ceph_monitors()
            .await?
            .iter()
            .filter(|m| m.state == CEPH_MONITOR_CONFIGURED)
            .count();
        Ok(configured >= self.required)
    }
}

/// Waits for a storage tier to exist in a cluster.
#[derive(Debug, Clone)]
pub struct StorageTier {
    pub cluster_name: String,
    pub tier: String,
}

#[async_trait]
impl Monitor for StorageTier {
    fn kind(&self) -> MonitorKind {
        MonitorKind::StorageTier
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let clusters = client.list_clusters().await?;
        let Some(cluster) = clusters.iter().find(|c| c.name == self.cluster_name) else {
            return Ok(false);
        };
        let tiers = client.list_storage_tiers(&cluster.id).await?;
        Ok(tiers.iter().any(|t| t.name == self.tier))
    }
}

/// Host state a [`HostState`] monitor waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStateSelector {
    Idle,
    LockedDisabled,
    UnlockedEnabled,
    UnlockedAvailable,
}

/// Waits for a host to reach a state. A host that disappeared also ends
/// the wait so the owner can rediscover it.
#[derive(Debug, Clone)]
pub struct HostState {
    pub host_id: String,
    pub selector: HostStateSelector,
}

#[async_trait]
impl Monitor for HostState {
    fn kind(&self) -> MonitorKind {
        MonitorKind::HostState
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let host = match client.get_host(&self.host_id).await {
            Ok(host) => host,
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        if !host.is_idle() {
            return Ok(false);
        }
        Ok(match self.selector {
            HostStateSelector::Idle => true,
            HostStateSelector::LockedDisabled => host.is_locked_disabled(),
            HostStateSelector::UnlockedEnabled => host.is_unlocked_enabled(),
            HostStateSelector::UnlockedAvailable => host.is_unlocked_available(),
        })
    }
}

/// Waits for the platform to finish the hardware inventory of a host.
#[derive(Debug, Clone)]
pub struct InventoryCollected {
    pub host_id: String,
}

#[async_trait]
impl Monitor for InventoryCollected {
    fn kind(&self) -> MonitorKind {
        MonitorKind::InventoryCollected
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let host = match client.get_host(&self.host_id).await {
            Ok(host) => host,
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        if !host.is_idle() || !host.is_online() {
            return Ok(false);
        }
        Ok(!client.list_disks(&self.host_id).await?.is_empty())
    }
}

/// Waits until the given number of controllers are unlocked and enabled.
#[derive(Debug, Clone)]
pub struct EnabledControllers {
    pub required: usize,
}

#[async_trait]
impl Monitor for EnabledControllers {
    fn kind(&self) -> MonitorKind {
        MonitorKind::EnabledControllers
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let enabled = client
            .list_hosts()
            .await?
            .iter()
            .filter(|h| h.personality() == PERSONALITY_CONTROLLER && h.is_unlocked_enabled())
            .count();
        Ok(enabled >= self.required)
    }
}

/// Waits until the given number of controllers are unlocked and available.
#[derive(Debug, Clone)]
pub struct AvailableControllers {
    pub required: usize,
}

#[async_trait]
impl Monitor for AvailableControllers {
    fn kind(&self) -> MonitorKind {
        MonitorKind::AvailableControllers
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let available = client
            .list_hosts()
            .await?
            .iter()
            .filter(|h| h.personality() == PERSONALITY_CONTROLLER && h.is_unlocked_available())
            .count();
        Ok(available >= self.required)
    }
}

/// Waits until the primary controller is unlocked and enabled, after which
/// other hosts may be provisioned.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningAllowed;

#[async_trait]
impl Monitor for ProvisioningAllowed {
    fn kind(&self) -> MonitorKind {
        MonitorKind::ProvisioningAllowed
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let hosts = client.list_hosts().await?;
        Ok(discovery::primary_controller(&hosts).is_some_and(|h| h.is_unlocked_enabled()))
    }
}

/// Waits for a dynamically provisioned host to be discovered by the
/// platform.
#[derive(Debug, Clone)]
pub struct DynamicHostAppears {
    pub hostname: String,
    pub match_info: Option<MatchInfo>,
    pub boot_mac: Option<String>,
}

#[async_trait]
impl Monitor for DynamicHostAppears {
    fn kind(&self) -> MonitorKind {
        MonitorKind::DynamicHostAppears
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let hosts = client.list_hosts().await?;
        Ok(discovery::find_host(
            &hosts,
            &self.hostname,
            self.match_info.as_ref(),
            self.boot_mac.as_deref(),
        )
        .is_some())
    }
}

/// Waits for a secret to be created.
#[derive(Debug, Clone)]
pub struct KubernetesResource {
    pub namespace: String,
    pub secret: String,
}

#[async_trait]
impl Monitor for KubernetesResource {
    fn kind(&self) -> MonitorKind {
        MonitorKind::KubernetesResource
    }

    async fn check(&self, _client: &dyn PlatformClientTrait, store: &dyn ResourceStore) -> Result<bool> {
        Ok(store.get_secret(&self.namespace, &self.secret).await?.is_some())
    }
}

/// Waits until no controller filesystem is being resized.
#[derive(Debug, Clone, Default)]
pub struct FilesystemResize;

#[async_trait]
impl Monitor for FilesystemResize {
    fn kind(&self) -> MonitorKind {
        MonitorKind::FilesystemResize
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        let filesystems = client.list_controller_filesystems().await?;
        Ok(!filesystems.iter().any(|fs| fs.state == FILESYSTEM_STATE_RESIZING))
    }
}

/// Administrative, operational and availability state of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStateSnapshot {
    pub administrative: String,
    pub operational: String,
    pub availability: String,
}

impl HostStateSnapshot {
    #[must_use]
    pub fn of(host: &platform_client::Host) -> Self {
        Self {
            administrative: host.administrative_state.clone(),
            operational: host.operational_status.clone(),
            availability: host.availability_status.clone(),
        }
    }
}

/// Watches an in-sync host for out-of-band state changes.
#[derive(Debug, Clone)]
pub struct HostStateChange {
    pub host_id: String,
    pub snapshot: HostStateSnapshot,
}

#[async_trait]
impl Monitor for HostStateChange {
    fn kind(&self) -> MonitorKind {
        MonitorKind::HostStateChange
    }

    async fn check(&self, client: &dyn PlatformClientTrait, _store: &dyn ResourceStore) -> Result<bool> {
        match client.get_host(&self.host_id).await {
            Ok(host) => Ok(HostStateSnapshot::of(&host) != self.snapshot),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockResourceStore;
    use platform_client::{
        CephMonitor, Cluster, ControllerFilesystem, Host, MockPlatformClient, Partition, StorageTier as Tier,
        ADMIN_LOCKED, ADMIN_UNLOCKED, AVAIL_AVAILABLE, AVAIL_ONLINE, OPER_DISABLED, OPER_ENABLED,
        PARTITION_STATUS_CREATING,
    };

    fn controller(id: &str, hostname: &str, unlocked: bool) -> Host {
        Host {
            id: id.to_string(),
            hostname: Some(hostname.to_string()),
            personality: Some(PERSONALITY_CONTROLLER.to_string()),
            administrative_state: if unlocked { ADMIN_UNLOCKED } else { ADMIN_LOCKED }.to_string(),
            operational_status: if unlocked { OPER_ENABLED } else { OPER_DISABLED }.to_string(),
            availability_status: if unlocked { AVAIL_AVAILABLE } else { AVAIL_ONLINE }.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_partition_ready_waits_for_transient_partitions() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        client.add_partition(Partition {
            id: "p1".to_string(),
            host_id: "h1".to_string(),
            status: PARTITION_STATUS_CREATING,
            ..Default::default()
        });
        let monitor = PartitionReady { host_id: "h1".to_string() };
        assert!(!monitor.check(&client, &store).await.unwrap());

        let other = PartitionReady { host_id: "h2".to_string() };
        assert!(other.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_cluster_monitors() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        let presence = ClusterPresence { name: "ceph_cluster".to_string() };
        let model = ClusterDeploymentModel { name: "ceph_cluster".to_string() };
        assert!(!presence.check(&client, &store).await.unwrap());

        client.add_cluster(Cluster {
            id: "c1".to_string(),
            name: "ceph_cluster".to_string(),
            deployment_model: DEPLOYMENT_MODEL_UNDEFINED.to_string(),
            ..Default::default()
        });
        assert!(presence.check(&client, &store).await.unwrap());
        assert!(!model.check(&client, &store).await.unwrap());

        let tier = StorageTier {
            cluster_name: "ceph_cluster".to_string(),
            tier: "storage".to_string(),
        };
        assert!(!tier.check(&client, &store).await.unwrap());
        client.add_storage_tier(Tier {
            id: "t1".to_string(),
            name: "storage".to_string(),
            cluster_id: "c1".to_string(),
            ..Default::default()
        });
        assert!(tier.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_monitor_count_counts_configured_only() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        for (id, state) in [("m1", "configured"), ("m2", "configuring")] {
            client.add_ceph_monitor(CephMonitor {
                id: id.to_string(),
                state: state.to_string(),
                ..Default::default()
            });
        }
        assert!(!StorageMonitorCount { required: 2 }.check(&client, &store).await.unwrap());
        assert!(StorageMonitorCount { required: 1 }.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_host_state_selectors() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        client.add_host(controller("h1", "controller-0", false));

        let locked = HostState {
            host_id: "h1".to_string(),
            selector: HostStateSelector::LockedDisabled,
        };
        let unlocked = HostState {
            host_id: "h1".to_string(),
            selector: HostStateSelector::UnlockedEnabled,
        };
        assert!(locked.check(&client, &store).await.unwrap());
        assert!(!unlocked.check(&client, &store).await.unwrap());

        let gone = HostState {
            host_id: "missing".to_string(),
            selector: HostStateSelector::Idle,
        };
        assert!(gone.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_controller_counts_and_provisioning() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        client.add_host(controller("h0", "controller-0", true));
        client.add_host(controller("h1", "controller-1", false));

        assert!(EnabledControllers { required: 1 }.check(&client, &store).await.unwrap());
        assert!(!EnabledControllers { required: 2 }.check(&client, &store).await.unwrap());
        assert!(!AvailableControllers { required: 2 }.check(&client, &store).await.unwrap());
        assert!(ProvisioningAllowed.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_filesystem_resize_and_secret() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        client.add_controller_filesystem(ControllerFilesystem {
            id: "fs1".to_string(),
            name: "database".to_string(),
            size: 10,
            state: FILESYSTEM_STATE_RESIZING.to_string(),
        });
        assert!(!FilesystemResize.check(&client, &store).await.unwrap());

        let secret = KubernetesResource {
            namespace: "deployment".to_string(),
            secret: "bmc-secret".to_string(),
        };
        assert!(!secret.check(&client, &store).await.unwrap());
        store.add_secret("deployment", "bmc-secret", &[("username", "admin")]);
        assert!(secret.check(&client, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_host_state_change_detects_transition() {
        let client = MockPlatformClient::new("http://mock");
        let store = MockResourceStore::new();
        let host = controller("h1", "controller-0", true);
        client.add_host(host.clone());

        let monitor = HostStateChange {
            host_id: "h1".to_string(),
            snapshot: HostStateSnapshot::of(&host),
        };
        assert!(!monitor.check(&client, &store).await.unwrap());

        client
            .host_action("h1", platform_client::HostAction::Lock)
            .await
            .unwrap();
        assert!(monitor.check(&client, &store).await.unwrap());
    }
}
