//! Inventory API models
//!
//! These models match the inventory REST API resources. Responses carry the
//! platform's wire names; request types (`*Opts`) only serialize the fields
//! that are set so they can be used for both create (POST) and update
//! (PATCH) requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// System capabilities reported alongside the system record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemCapabilities {
    /// Whether the API is served over HTTPS
    #[serde(default)]
    pub https_enabled: bool,
    /// vSwitch implementation
    #[serde(default)]
    pub vswitch_type: Option<String>,
}

/// System record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub system_mode: String,
    #[serde(default)]
    pub software_version: String,
    #[serde(default)]
    pub capabilities: SystemCapabilities,
}

/// System type: all-in-one
pub const SYSTEM_TYPE_ALL_IN_ONE: &str = "All-in-one";
/// System type: standard
pub const SYSTEM_TYPE_STANDARD: &str = "Standard";
/// System mode: simplex
pub const SYSTEM_MODE_SIMPLEX: &str = "simplex";
/// System mode: duplex
pub const SYSTEM_MODE_DUPLEX: &str = "duplex";

/// System update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_enabled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vswitch_type: Option<String>,
}

/// DNS configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dns {
    #[serde(rename = "uuid")]
    pub id: String,
    /// Comma separated server list
    #[serde(default)]
    pub nameservers: String,
}

/// NTP configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ntp {
    #[serde(rename = "uuid")]
    pub id: String,
    /// Comma separated server list
    #[serde(default)]
    pub ntpservers: String,
}

/// Value sent to clear a server list
pub const CLEAR_SERVERS_SENTINEL: &str = "NC";

/// PTP configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ptp {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub transport: String,
    #[serde(default)]
    pub mechanism: String,
}

/// PTP update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PtpOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

/// DRBD configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drbd {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "link_util", default)]
    pub link_utilization: i32,
}

/// Installed certificate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "certtype")]
    pub cert_type: String,
    /// `{type}_{serial}` as reported by the platform
    #[serde(default)]
    pub signature: String,
}

/// Installed licence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub content: String,
}

/// Service parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceParameter {
    #[serde(rename = "uuid")]
    pub id: String,
    pub service: String,
    pub section: String,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
}

/// Service parameter create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceParameterOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// `{name: value}` on create
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
    /// New value on update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Storage backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageBackend {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub task: Option<String>,
    /// Comma separated service list
    #[serde(default)]
    pub services: Option<String>,
    #[serde(default)]
    pub replication: Option<i32>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
}

/// Storage backend create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageBackendOpts {
    pub confirmed: bool,
    pub backend: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeMap<String, String>>,
}

/// Controller filesystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerFilesystem {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    /// Size in GiB
    pub size: i32,
    #[serde(default)]
    pub state: String,
}

/// Controller filesystem resize in progress
pub const FILESYSTEM_STATE_RESIZING: &str = "drbd_fs_resizing_in_progress";

/// Filesystem resize request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSystemOpts {
    pub name: String,
    /// Size in GiB
    pub size: i32,
}

// ---------------------------------------------------------------------------
// Hosts
// ---------------------------------------------------------------------------

/// Administrative state: locked
pub const ADMIN_LOCKED: &str = "locked";
/// Administrative state: unlocked
pub const ADMIN_UNLOCKED: &str = "unlocked";
/// Operational status: enabled
pub const OPER_ENABLED: &str = "enabled";
/// Operational status: disabled
pub const OPER_DISABLED: &str = "disabled";
/// Availability: available
pub const AVAIL_AVAILABLE: &str = "available";
/// Availability: online
pub const AVAIL_ONLINE: &str = "online";
/// Availability: offline
pub const AVAIL_OFFLINE: &str = "offline";
/// Availability: degraded
pub const AVAIL_DEGRADED: &str = "degraded";
/// Availability: powered off
pub const AVAIL_POWER_OFF: &str = "power-off";
/// Inventory collection complete
pub const INV_STATE_INVENTORIED: &str = "inventoried";
/// Capability value carried by the active controller
pub const ACTIVE_CONTROLLER: &str = "Controller-Active";
/// Hostname of the primary controller
pub const CONTROLLER_0: &str = "controller-0";
/// Personality: controller
pub const PERSONALITY_CONTROLLER: &str = "controller";
/// Personality: worker
pub const PERSONALITY_WORKER: &str = "worker";
/// Personality: storage
pub const PERSONALITY_STORAGE: &str = "storage";

/// Host capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostCapabilities {
    #[serde(rename = "Personality", default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub stor_function: Option<String>,
}

/// Host location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostLocation {
    #[serde(rename = "locn", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Host record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    /// Comma separated subfunction list
    #[serde(default)]
    pub subfunctions: String,
    #[serde(default)]
    pub capabilities: HostCapabilities,
    #[serde(default)]
    pub location: HostLocation,
    #[serde(default)]
    pub install_output: Option<String>,
    #[serde(default)]
    pub console: Option<String>,
    #[serde(rename = "mgmt_mac", default)]
    pub boot_mac: Option<String>,
    #[serde(rename = "mgmt_ip", default)]
    pub boot_ip: Option<String>,
    #[serde(rename = "rootfs_device", default)]
    pub root_device: Option<String>,
    #[serde(default)]
    pub boot_device: Option<String>,
    #[serde(default)]
    pub bm_type: Option<String>,
    #[serde(rename = "bm_ip", default)]
    pub bm_address: Option<String>,
    #[serde(default)]
    pub bm_username: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(rename = "administrative", default)]
    pub administrative_state: String,
    #[serde(rename = "operational", default)]
    pub operational_status: String,
    #[serde(rename = "availability", default)]
    pub availability_status: String,
    #[serde(default)]
    pub inv_state: Option<String>,
    #[serde(default)]
    pub clock_synchronization: Option<String>,
}

impl Host {
    /// Hostname or the empty string.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or_default()
    }

    /// Personality or the empty string.
    #[must_use]
    pub fn personality(&self) -> &str {
        self.personality.as_deref().unwrap_or_default()
    }

    /// Subfunctions as a list.
    #[must_use]
    pub fn subfunction_list(&self) -> Vec<String> {
        self.subfunctions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// No task is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.task.as_deref().is_none_or(str::is_empty)
    }

    /// Unlocked and enabled.
    #[must_use]
    pub fn is_unlocked_enabled(&self) -> bool {
        self.administrative_state == ADMIN_UNLOCKED && self.operational_status == OPER_ENABLED
    }

    /// Unlocked, enabled and available.
    #[must_use]
    pub fn is_unlocked_available(&self) -> bool {
        self.is_unlocked_enabled() && self.availability_status == AVAIL_AVAILABLE
    }

    /// Locked and disabled.
    #[must_use]
    pub fn is_locked_disabled(&self) -> bool {
        self.administrative_state == ADMIN_LOCKED && self.operational_status == OPER_DISABLED
    }

    /// Locked, disabled and online.
    #[must_use]
    pub fn is_locked_online(&self) -> bool {
        self.is_locked_disabled() && self.availability_status == AVAIL_ONLINE
    }

    /// Powered off.
    #[must_use]
    pub fn is_powered_off(&self) -> bool {
        self.availability_status == AVAIL_POWER_OFF
    }

    /// Reachable (neither offline nor powered off).
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.availability_status != AVAIL_OFFLINE && self.availability_status != AVAIL_POWER_OFF
    }

    /// Inventory has been collected.
    #[must_use]
    pub fn is_inventory_collected(&self) -> bool {
        self.inv_state.as_deref() == Some(INV_STATE_INVENTORIED)
    }

    /// The host is the active controller.
    #[must_use]
    pub fn is_active_controller(&self) -> bool {
        self.capabilities.personality.as_deref() == Some(ACTIVE_CONTROLLER)
    }
}

/// Host administrative actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Lock the host
    Lock,
    /// Force lock the host
    ForceLock,
    /// Unlock the host
    Unlock,
    /// Power on through board management
    PowerOn,
    /// Power off through board management
    PowerOff,
    /// Reinstall the host
    Reinstall,
}

impl HostAction {
    /// Wire value of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::ForceLock => "force-lock",
            Self::Unlock => "unlock",
            Self::PowerOn => "power-on",
            Self::PowerOff => "power-off",
            Self::Reinstall => "reinstall",
        }
    }
}

impl std::fmt::Display for HostAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfunctions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<HostLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
    #[serde(rename = "mgmt_mac", skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,
    #[serde(rename = "rootfs_device", skip_serializing_if = "Option::is_none")]
    pub root_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_device: Option<String>,
    #[serde(rename = "bm_ip", skip_serializing_if = "Option::is_none")]
    pub bm_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_synchronization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl HostOpts {
    /// True when no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Host label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub host_uuid: String,
    #[serde(rename = "label_key")]
    pub key: String,
    #[serde(rename = "label_value")]
    pub value: String,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Physical disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(default)]
    pub device_node: String,
    #[serde(default)]
    pub device_path: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(rename = "size_mib", default)]
    pub size_mib: i32,
    #[serde(rename = "available_mib", default)]
    pub available_mib: i32,
    #[serde(rename = "ipv_uuid", default)]
    pub physical_volume_id: Option<String>,
}

/// Partition is being created
pub const PARTITION_STATUS_CREATING: i32 = 2;
/// Partition is being deleted
pub const PARTITION_STATUS_DELETING: i32 = 4;
/// Partition is being modified
pub const PARTITION_STATUS_MODIFYING: i32 = 5;
/// Partition type for LVM physical volumes
pub const PARTITION_TYPE_LVM: &str = "lvm_phys_vol";
/// Partition GUID for user managed LVM physical volumes
pub const PARTITION_GUID_LVM: &str = "ba5eba11-0000-1111-2222-000000000001";

/// Disk partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "idisk_uuid", default)]
    pub disk_id: String,
    #[serde(default)]
    pub device_path: String,
    #[serde(default)]
    pub device_node: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(rename = "size_mib", default)]
    pub size_mib: i32,
    #[serde(rename = "ipv_uuid", default)]
    pub physical_volume_id: Option<String>,
    #[serde(default)]
    pub status: i32,
}

impl Partition {
    /// Size in GiB.
    #[must_use]
    pub fn gibibytes(&self) -> i32 {
        self.size_mib / 1024
    }

    /// Creating, deleting or modifying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.status,
            PARTITION_STATUS_CREATING | PARTITION_STATUS_DELETING | PARTITION_STATUS_MODIFYING
        )
    }
}

/// Partition create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionOpts {
    #[serde(rename = "ihost_uuid")]
    pub host_id: String,
    #[serde(rename = "idisk_uuid")]
    pub disk_id: String,
    pub size_mib: i32,
    pub type_name: String,
    pub type_guid: String,
}

/// Physical volume backed by a disk
pub const PV_TYPE_DISK: &str = "disk";
/// Physical volume backed by a partition
pub const PV_TYPE_PARTITION: &str = "partition";

/// LVM physical volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalVolume {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "pv_type")]
    pub pv_type: String,
    #[serde(rename = "pv_state", default)]
    pub state: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "disk_or_part_device_path", default)]
    pub device_path: String,
    #[serde(rename = "disk_or_part_uuid", default)]
    pub device_id: String,
    #[serde(rename = "ilvg_uuid", default)]
    pub volume_group_id: String,
    #[serde(rename = "lvm_vg_name", default)]
    pub volume_group_name: String,
}

/// Physical volume create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhysicalVolumeOpts {
    #[serde(rename = "ihost_uuid")]
    pub host_id: String,
    #[serde(rename = "ilvg_uuid")]
    pub volume_group_id: String,
    #[serde(rename = "disk_or_part_uuid")]
    pub device_id: String,
    #[serde(rename = "pv_type")]
    pub pv_type: String,
}

/// Volume group capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeGroupCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lvm_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_disk_operations: Option<i32>,
}

/// LVM volume group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeGroup {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "lvm_vg_name")]
    pub name: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "vg_state", default)]
    pub state: String,
    #[serde(default)]
    pub capabilities: VolumeGroupCapabilities,
}

/// Volume group create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeGroupOpts {
    #[serde(rename = "ihost_uuid")]
    pub host_id: String,
    #[serde(rename = "lvm_vg_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<VolumeGroupCapabilities>,
}

/// OSD function: data
pub const OSD_FUNCTION_OSD: &str = "osd";
/// OSD function: journal
pub const OSD_FUNCTION_JOURNAL: &str = "journal";

/// Ceph OSD
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Osd {
    #[serde(rename = "uuid")]
    pub id: String,
    pub function: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "idisk_uuid", default)]
    pub disk_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub tier_name: Option<String>,
    #[serde(default)]
    pub tier_uuid: Option<String>,
    #[serde(default)]
    pub journal_location: Option<String>,
    #[serde(default)]
    pub journal_size_mib: Option<i32>,
    #[serde(default)]
    pub journal_path: Option<String>,
}

impl Osd {
    /// Journal size in GiB.
    #[must_use]
    pub fn journal_gibibytes(&self) -> Option<i32> {
        self.journal_size_mib.map(|s| s / 1024)
    }
}

/// OSD create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsdOpts {
    #[serde(rename = "ihost_uuid", skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(rename = "idisk_uuid", skip_serializing_if = "Option::is_none")]
    pub disk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_size_mib: Option<i32>,
}

/// Name of the default storage tier
pub const STORAGE_TIER_NAME: &str = "storage";

/// Storage tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageTier {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub tier_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "cluster_uuid", default)]
    pub cluster_id: String,
}

/// Deployment model: all-in-one
pub const DEPLOYMENT_MODEL_AIO: &str = "aio-sx";
/// Deployment model: OSDs on controllers
pub const DEPLOYMENT_MODEL_CONTROLLER: &str = "controller-nodes";
/// Deployment model: OSDs on storage nodes
pub const DEPLOYMENT_MODEL_STORAGE: &str = "storage-nodes";
/// Deployment model not yet decided
pub const DEPLOYMENT_MODEL_UNDEFINED: &str = "undefined";
/// Minimum number of enabled monitors before OSDs may be provisioned
pub const OSD_MINIMUM_MONITOR_COUNT: usize = 2;

/// Storage cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub cluster_type: String,
    #[serde(default)]
    pub deployment_model: String,
}

/// Ceph monitor state once provisioning completed
pub const CEPH_MONITOR_CONFIGURED: &str = "configured";

/// Ceph monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CephMonitor {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(rename = "ceph_mon_gib", default)]
    pub size: i32,
}

/// Ceph monitor create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CephMonitorOpts {
    #[serde(rename = "ihost_uuid", skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(rename = "ceph_mon_gib", skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
}

/// Host filesystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostFilesystem {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    /// Size in GiB
    pub size: i32,
    #[serde(default)]
    pub logical_volume: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
}

// ---------------------------------------------------------------------------
// Processors and memory
// ---------------------------------------------------------------------------

/// Logical CPU
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "numa_node")]
    pub processor: i32,
    #[serde(rename = "cpu")]
    pub logical_core: i32,
    #[serde(rename = "core")]
    pub physical_core: i32,
    pub thread: i32,
    #[serde(rename = "allocated_function")]
    pub function: String,
}

/// CPU function: platform
pub const CPU_FUNCTION_PLATFORM: &str = "platform";
/// CPU function: vswitch
pub const CPU_FUNCTION_VSWITCH: &str = "vswitch";
/// CPU function: shared
pub const CPU_FUNCTION_SHARED: &str = "shared";
/// CPU function: applications
pub const CPU_FUNCTION_APPLICATIONS: &str = "applications";

/// Per-function CPU allocation request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuOpts {
    pub function: String,
    /// One `{node: count}` entry per NUMA node
    pub sockets: Vec<BTreeMap<String, i32>>,
}

/// Memory function: platform
pub const MEMORY_FUNCTION_PLATFORM: &str = "platform";
/// Memory function: vswitch
pub const MEMORY_FUNCTION_VSWITCH: &str = "vswitch";
/// Memory function: virtual machines
pub const MEMORY_FUNCTION_VM: &str = "vm";

/// Memory of one NUMA node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "numa_node")]
    pub processor: i32,
    #[serde(rename = "memtotal_mib", default)]
    pub total: i32,
    #[serde(rename = "platform_reserved_mib", default)]
    pub platform: i32,
    #[serde(rename = "vm_hugepages_nr_1G", default)]
    pub vm_1g_count: i32,
    #[serde(rename = "vm_hugepages_nr_1G_pending", default)]
    pub vm_1g_pending: Option<i32>,
    #[serde(rename = "vm_hugepages_nr_2M", default)]
    pub vm_2m_count: i32,
    #[serde(rename = "vm_hugepages_nr_2M_pending", default)]
    pub vm_2m_pending: Option<i32>,
    #[serde(rename = "vswitch_hugepages_size_mib", default)]
    pub vswitch_page_size_mib: i32,
    #[serde(rename = "vswitch_hugepages_nr", default)]
    pub vswitch_count: i32,
    #[serde(rename = "vswitch_hugepages_reqd", default)]
    pub vswitch_required: Option<i32>,
}

/// Memory update request for one NUMA node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryOpts {
    #[serde(rename = "platform_reserved_mib", skip_serializing_if = "Option::is_none")]
    pub platform: Option<i32>,
    #[serde(rename = "vm_hugepages_nr_2M_pending", skip_serializing_if = "Option::is_none")]
    pub vm_2m: Option<i32>,
    #[serde(rename = "vm_hugepages_nr_1G_pending", skip_serializing_if = "Option::is_none")]
    pub vm_1g: Option<i32>,
    #[serde(rename = "vswitch_hugepages_reqd", skip_serializing_if = "Option::is_none")]
    pub vswitch_pages: Option<i32>,
    #[serde(rename = "vswitch_hugepages_size_mib", skip_serializing_if = "Option::is_none")]
    pub vswitch_page_size_mib: Option<i32>,
}

impl MemoryOpts {
    /// True when no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

/// Interface type: aggregated ethernet (bond)
pub const IF_TYPE_AE: &str = "ae";
/// Interface type: VLAN
pub const IF_TYPE_VLAN: &str = "vlan";
/// Interface type: ethernet
pub const IF_TYPE_ETHERNET: &str = "ethernet";
/// Interface type: virtual (loopback)
pub const IF_TYPE_VIRTUAL: &str = "virtual";
/// Interface type: SR-IOV virtual function
pub const IF_TYPE_VF: &str = "vf";
/// Interface class: platform
pub const IF_CLASS_PLATFORM: &str = "platform";
/// Interface class: data
pub const IF_CLASS_DATA: &str = "data";
/// Interface class: none
pub const IF_CLASS_NONE: &str = "none";
/// Interface class: SR-IOV
pub const IF_CLASS_PCI_SRIOV: &str = "pci-sriov";
/// Interface class: PCI passthrough
pub const IF_CLASS_PCI_PASSTHROUGH: &str = "pci-passthrough";
/// Address mode: static
pub const ADDRESS_MODE_STATIC: &str = "static";
/// Address mode: pool
pub const ADDRESS_MODE_POOL: &str = "pool";
/// Address mode: disabled
pub const ADDRESS_MODE_DISABLED: &str = "disabled";

/// Ethernet port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "host_uuid", default)]
    pub host_id: String,
    pub name: String,
    #[serde(rename = "pciaddr", default)]
    pub pci_address: String,
    #[serde(rename = "interface_uuid", default)]
    pub interface_id: String,
}

/// Network interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "ihost_uuid", default)]
    pub host_id: String,
    #[serde(rename = "ifname")]
    pub name: String,
    #[serde(rename = "iftype")]
    pub if_type: String,
    #[serde(rename = "ifclass", default)]
    pub class: Option<String>,
    #[serde(rename = "imtu", default)]
    pub mtu: i32,
    #[serde(rename = "vlan_id", default)]
    pub vid: Option<i32>,
    #[serde(default)]
    pub ipv4_mode: Option<String>,
    #[serde(default)]
    pub ipv4_pool: Option<String>,
    #[serde(default)]
    pub ipv6_mode: Option<String>,
    #[serde(default)]
    pub ipv6_pool: Option<String>,
    #[serde(rename = "aemode", default)]
    pub ae_mode: Option<String>,
    #[serde(rename = "txhashpolicy", default)]
    pub ae_transmit_hash: Option<String>,
    #[serde(rename = "sriov_numvfs", default)]
    pub vf_count: Option<i32>,
    #[serde(rename = "sriov_vf_driver", default)]
    pub vf_driver: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub datanetworks: Vec<String>,
    #[serde(default)]
    pub uses: Vec<String>,
    #[serde(rename = "used_by", default)]
    pub users: Vec<String>,
}

impl Interface {
    /// Interface class or "none".
    #[must_use]
    pub fn class(&self) -> &str {
        self.class.as_deref().unwrap_or(IF_CLASS_NONE)
    }
}

/// Interface create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterfaceOpts {
    #[serde(rename = "ihost_uuid", skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(rename = "iftype", skip_serializing_if = "Option::is_none")]
    pub if_type: Option<String>,
    #[serde(rename = "ifname", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "ifclass", skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "imtu", skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    #[serde(rename = "vlan_id", skip_serializing_if = "Option::is_none")]
    pub vid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_pool: Option<String>,
    #[serde(rename = "aemode", skip_serializing_if = "Option::is_none")]
    pub ae_mode: Option<String>,
    #[serde(rename = "txhashpolicy", skip_serializing_if = "Option::is_none")]
    pub ae_transmit_hash: Option<String>,
    #[serde(rename = "sriov_numvfs", skip_serializing_if = "Option::is_none")]
    pub vf_count: Option<i32>,
    #[serde(rename = "sriov_vf_driver", skip_serializing_if = "Option::is_none")]
    pub vf_driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<Vec<String>>,
    /// Replacement member list on update
    #[serde(rename = "usesmodify", skip_serializing_if = "Option::is_none")]
    pub uses_modify: Option<String>,
}

impl InterfaceOpts {
    /// True when no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Interface to platform network binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceNetwork {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub network_uuid: String,
    #[serde(default)]
    pub network_type: String,
    #[serde(default)]
    pub network_name: String,
    #[serde(rename = "ifname", default)]
    pub interface_name: String,
    #[serde(rename = "interface_uuid", default)]
    pub interface_id: String,
}

/// Interface to platform network binding request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterfaceNetworkOpts {
    pub interface_uuid: String,
    pub network_uuid: String,
}

/// Interface to data network binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDataNetwork {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "datanetwork_uuid", default)]
    pub datanetwork_id: String,
    #[serde(default)]
    pub datanetwork_name: String,
    #[serde(rename = "ifname", default)]
    pub interface_name: String,
    #[serde(rename = "interface_uuid", default)]
    pub interface_id: String,
}

/// Interface to data network binding request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterfaceDataNetworkOpts {
    pub interface_uuid: String,
    pub datanetwork_uuid: String,
}

/// IP address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "uuid")]
    pub id: String,
    pub address: String,
    pub prefix: i32,
    #[serde(rename = "ifname", default)]
    pub interface_name: String,
    #[serde(rename = "interface_uuid", default)]
    pub interface_id: String,
    #[serde(default)]
    pub pool_uuid: Option<String>,
}

/// Address create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressOpts {
    pub interface_uuid: String,
    pub address: String,
    pub prefix: i32,
}

/// Static route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "uuid")]
    pub id: String,
    pub network: String,
    pub prefix: i32,
    pub gateway: String,
    #[serde(default)]
    pub metric: i32,
    #[serde(rename = "ifname", default)]
    pub interface_name: String,
    #[serde(rename = "interface_uuid", default)]
    pub interface_id: String,
}

/// Route create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteOpts {
    pub interface_uuid: String,
    pub network: String,
    pub prefix: i32,
    pub gateway: String,
    pub metric: i32,
}

// ---------------------------------------------------------------------------
// Platform networks, data networks and PTP
// ---------------------------------------------------------------------------

/// Address pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressPool {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    pub network: String,
    pub prefix: i32,
    #[serde(rename = "gateway_address", default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub order: String,
    /// `[start, end]` pairs
    #[serde(default)]
    pub ranges: Vec<Vec<String>>,
}

/// Address pool create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressPoolOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<i32>,
    #[serde(rename = "gateway_address", skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<Vec<String>>>,
}

impl AddressPoolOpts {
    /// True when no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Platform network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub pool_uuid: String,
}

/// Platform network create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkOpts {
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: String,
    pub dynamic: bool,
    pub pool_uuid: String,
}

/// Data network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataNetwork {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "network_type")]
    pub network_type: String,
    #[serde(default)]
    pub mtu: i32,
    #[serde(default)]
    pub ttl: Option<i32>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub multicast_group: Option<String>,
    #[serde(rename = "port_num", default)]
    pub udp_port: Option<i32>,
}

/// Data network create/update request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataNetworkOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "network_type", skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<String>,
    #[serde(rename = "port_num", skip_serializing_if = "Option::is_none")]
    pub udp_port: Option<i32>,
}

impl DataNetworkOpts {
    /// True when no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// PTP instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PtpInstance {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    pub service: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// PTP interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PtpInterface {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(rename = "ptp_instance_uuid", default)]
    pub ptp_instance_id: String,
    #[serde(default)]
    pub ptp_instance_name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// PTP instance/interface create request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PtpOwnerOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(rename = "ptp_instance_uuid", skip_serializing_if = "Option::is_none")]
    pub ptp_instance_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_state_helpers() {
        let host = Host {
            administrative_state: ADMIN_UNLOCKED.to_string(),
            operational_status: OPER_ENABLED.to_string(),
            availability_status: AVAIL_AVAILABLE.to_string(),
            subfunctions: "controller, worker".to_string(),
            ..Default::default()
        };
        assert!(host.is_unlocked_enabled());
        assert!(host.is_unlocked_available());
        assert!(!host.is_locked_disabled());
        assert!(host.is_idle());
        assert_eq!(host.subfunction_list(), vec!["controller", "worker"]);
    }

    #[test]
    fn test_host_deserializes_wire_names() {
        let json = serde_json::json!({
            "uuid": "h1",
            "hostname": "controller-0",
            "administrative": "locked",
            "operational": "disabled",
            "availability": "online",
            "mgmt_mac": "aa:bb:cc:dd:ee:01",
            "capabilities": {"Personality": "Controller-Active"},
            "location": {"locn": "lab"},
            "task": ""
        });
        let host: Host = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(host.id, "h1");
        assert!(host.is_locked_online());
        assert!(host.is_active_controller());
        assert!(host.is_idle());
        assert_eq!(host.location.name.as_deref(), Some("lab"));
    }

    #[test]
    fn test_opts_skip_unset_fields() {
        let opts = HostOpts {
            console: Some("ttyS0,115200".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&opts).unwrap_or_default();
        assert_eq!(value, serde_json::json!({"console": "ttyS0,115200"}));
        assert!(HostOpts::default().is_empty());
    }

    #[test]
    fn test_partition_helpers() {
        let partition = Partition {
            size_mib: 20480,
            status: PARTITION_STATUS_CREATING,
            ..Default::default()
        };
        assert_eq!(partition.gibibytes(), 20);
        assert!(partition.is_transient());
    }
}
