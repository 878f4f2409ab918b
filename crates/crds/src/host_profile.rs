//! HostProfile CRD
//!
//! Defines the configurable surface of a host. Profiles are sparse: any
//! attribute may be omitted at one level and supplied by a base profile, by
//! per-host overrides, or by the defaults captured from the live host.

use crate::merge::{
    self, Keyed, Merge, Normalize, merge_keyed_list, merge_list, merge_map, merge_struct,
    merge_value, normalize_keyed, normalize_keyed_list,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Host personality: controller
pub const PERSONALITY_CONTROLLER: &str = "controller";
/// Host personality: worker
pub const PERSONALITY_WORKER: &str = "worker";
/// Host personality: storage
pub const PERSONALITY_STORAGE: &str = "storage";
/// Subfunction carried by hosts running workloads
pub const SUBFUNCTION_WORKER: &str = "worker";
/// Administrative state: locked
pub const ADMIN_LOCKED: &str = "locked";
/// Administrative state: unlocked
pub const ADMIN_UNLOCKED: &str = "unlocked";
/// Static provisioning: the controller creates the host record
pub const PROVISIONING_STATIC: &str = "static";
/// Dynamic provisioning: the platform discovers the host
pub const PROVISIONING_DYNAMIC: &str = "dynamic";
/// Name of the loopback interface and port
pub const LOOPBACK_INTERFACE: &str = "lo";

/// Reference to the secret holding board management credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BmPasswordInfo {
    /// Name of a secret carrying `username` and `password` keys
    pub secret: String,
}

/// Board management credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BmCredentials {
    /// Password secret reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<BmPasswordInfo>,
}

/// Board management controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BmInfo {
    /// Controller type (e.g. "dynamic", "ipmi", "redfish")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub bm_type: Option<String>,

    /// Controller address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Credentials used to access the controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BmCredentials>,
}

impl Merge for BmInfo {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.bm_type, &src.bm_type);
        merge_value(&mut self.address, &src.address);
        merge_value(&mut self.credentials, &src.credentials);
    }
}

/// Core count assigned to a CPU function on one NUMA node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorFunctionInfo {
    /// CPU function (platform, vswitch, shared, application-isolated)
    pub function: String,
    /// Number of physical cores
    pub count: i32,
}

impl Keyed for ProcessorFunctionInfo {
    type Key = String;
    fn key(&self) -> String {
        self.function.clone()
    }
}

impl Merge for ProcessorFunctionInfo {
    fn merge(&mut self, src: &Self) {
        self.count = src.count;
    }
}

impl Normalize for ProcessorFunctionInfo {
    fn normalize(&mut self) {}
}

/// Processor tuning for one NUMA node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorInfo {
    /// NUMA node
    pub node: i32,
    /// Per-function core counts
    pub functions: Vec<ProcessorFunctionInfo>,
}

impl Keyed for ProcessorInfo {
    type Key = i32;
    fn key(&self) -> i32 {
        self.node
    }
}

impl Merge for ProcessorInfo {
    fn merge(&mut self, src: &Self) {
        merge::merge_keyed(&mut self.functions, &src.functions);
    }
}

impl Normalize for ProcessorInfo {
    fn normalize(&mut self) {
        normalize_keyed(&mut self.functions);
    }
}

/// Page count allocated to a memory function on one NUMA node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFunctionInfo {
    /// Memory function (platform, vm, vswitch)
    pub function: String,
    /// Page size (4KB, 2MB, 1GB)
    pub page_size: String,
    /// Number of pages
    pub page_count: i32,
}

impl Keyed for MemoryFunctionInfo {
    type Key = (String, String);
    fn key(&self) -> (String, String) {
        (self.function.clone(), self.page_size.clone())
    }
}

impl Merge for MemoryFunctionInfo {
    fn merge(&mut self, src: &Self) {
        self.page_count = src.page_count;
    }
}

impl Normalize for MemoryFunctionInfo {
    fn normalize(&mut self) {}
}

/// Memory tuning for one NUMA node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNodeInfo {
    /// NUMA node
    pub node: i32,
    /// Per-function page counts
    pub functions: Vec<MemoryFunctionInfo>,
}

impl Keyed for MemoryNodeInfo {
    type Key = i32;
    fn key(&self) -> i32 {
        self.node
    }
}

impl Merge for MemoryNodeInfo {
    fn merge(&mut self, src: &Self) {
        merge::merge_keyed(&mut self.functions, &src.functions);
    }
}

impl Normalize for MemoryNodeInfo {
    fn normalize(&mut self) {
        normalize_keyed(&mut self.functions);
    }
}

/// OSD journal placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalInfo {
    /// Path of the journal OSD
    pub location: String,
    /// Journal size in GiB
    pub size: i32,
}

/// Ceph OSD configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OsdInfo {
    /// OSD function ("osd" or "journal")
    pub function: String,
    /// Disk device path
    pub path: String,
    /// Storage cluster name (defaults to "ceph_cluster")
    #[serde(rename = "cluster", skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Journal placement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<JournalInfo>,
}

/// Default storage cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "ceph_cluster";

impl OsdInfo {
    /// Cluster name, falling back to the platform default.
    #[must_use]
    pub fn cluster(&self) -> &str {
        self.cluster_name.as_deref().unwrap_or(DEFAULT_CLUSTER_NAME)
    }
}

impl Keyed for OsdInfo {
    type Key = String;
    fn key(&self) -> String {
        self.path.clone()
    }
}

impl Merge for OsdInfo {
    fn merge(&mut self, src: &Self) {
        self.function.clone_from(&src.function);
        merge_value(&mut self.cluster_name, &src.cluster_name);
        merge_value(&mut self.journal, &src.journal);
    }
}

impl Normalize for OsdInfo {
    fn normalize(&mut self) {}
}

/// LVM physical volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalVolumeInfo {
    /// Volume type ("disk" or "partition")
    #[serde(rename = "type")]
    pub pv_type: String,
    /// Disk device path
    pub path: String,
    /// Partition size in GiB (partitions only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
}

/// Physical volume backed by a partition
pub const PV_TYPE_PARTITION: &str = "partition";
/// Physical volume backed by a whole disk
pub const PV_TYPE_DISK: &str = "disk";

impl Keyed for PhysicalVolumeInfo {
    type Key = (String, String);
    fn key(&self) -> (String, String) {
        (self.path.clone(), self.pv_type.clone())
    }
}

impl Merge for PhysicalVolumeInfo {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.size, &src.size);
    }
}

impl Normalize for PhysicalVolumeInfo {
    fn normalize(&mut self) {}
}

/// LVM volume group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupInfo {
    /// Volume group name
    pub name: String,
    /// Concurrent disk operations capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_disk_operations: Option<i32>,
    /// LVM provisioning type ("thin" or "thick")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lvm_type: Option<String>,
    /// Member physical volumes
    pub physical_volumes: Vec<PhysicalVolumeInfo>,
}

impl Keyed for VolumeGroupInfo {
    type Key = String;
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Merge for VolumeGroupInfo {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.concurrent_disk_operations, &src.concurrent_disk_operations);
        merge_value(&mut self.lvm_type, &src.lvm_type);
        if src.physical_volumes.is_empty() {
            self.physical_volumes.clear();
        } else {
            merge::merge_keyed(&mut self.physical_volumes, &src.physical_volumes);
        }
    }
}

impl Normalize for VolumeGroupInfo {
    fn normalize(&mut self) {
        normalize_keyed(&mut self.physical_volumes);
    }
}

/// Ceph monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    /// Monitor filesystem size in GiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
}

impl Merge for MonitorInfo {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.size, &src.size);
    }
}

/// Host filesystem size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemInfo {
    /// Filesystem name
    pub name: String,
    /// Size in GiB
    pub size: i32,
}

impl Keyed for FileSystemInfo {
    type Key = String;
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Merge for FileSystemInfo {
    fn merge(&mut self, src: &Self) {
        self.size = src.size;
    }
}

impl Normalize for FileSystemInfo {
    fn normalize(&mut self) {}
}

/// Host storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStorageInfo {
    /// Ceph monitor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorInfo>,
    /// Ceph OSDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osds: Option<Vec<OsdInfo>>,
    /// LVM volume groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_groups: Option<Vec<VolumeGroupInfo>>,
    /// Host filesystems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystems: Option<Vec<FileSystemInfo>>,
}

impl Merge for ProfileStorageInfo {
    fn merge(&mut self, src: &Self) {
        merge_struct(&mut self.monitor, &src.monitor);
        merge_keyed_list(&mut self.osds, &src.osds);
        merge_keyed_list(&mut self.volume_groups, &src.volume_groups);
        merge_keyed_list(&mut self.filesystems, &src.filesystems);
    }
}

impl Normalize for ProfileStorageInfo {
    fn normalize(&mut self) {
        normalize_keyed_list(&mut self.osds);
        normalize_keyed_list(&mut self.volume_groups);
        normalize_keyed_list(&mut self.filesystems);
    }
}

/// Physical port backing an ethernet interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EthernetPortInfo {
    /// Port name as reported by inventory
    pub name: String,
}

/// Attributes shared by every interface type.
pub trait CommonInterface: Sync {
    /// Interface name
    fn name(&self) -> &str;
    /// Interface class (platform, data, pci-sriov, pci-passthrough, none)
    fn class(&self) -> &str;
    /// Configured MTU
    fn mtu(&self) -> Option<i32>;
    /// Attached platform networks
    fn platform_networks(&self) -> Option<&Vec<String>>;
    /// Attached data networks
    fn data_networks(&self) -> Option<&Vec<String>>;
}

macro_rules! common_interface {
    ($ty:ty) => {
        impl CommonInterface for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn class(&self) -> &str {
                &self.class
            }
            fn mtu(&self) -> Option<i32> {
                self.mtu
            }
            fn platform_networks(&self) -> Option<&Vec<String>> {
                self.platform_networks.as_ref()
            }
            fn data_networks(&self) -> Option<&Vec<String>> {
                self.data_networks.as_ref()
            }
        }
    };
}

/// Ethernet interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EthernetInfo {
    /// Interface name
    pub name: String,
    /// Interface class
    pub class: String,
    /// MTU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    /// Platform networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_networks: Option<Vec<String>>,
    /// Data networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_networks: Option<Vec<String>>,
    /// SR-IOV virtual function count
    #[serde(rename = "vfCount", skip_serializing_if = "Option::is_none")]
    pub vf_count: Option<i32>,
    /// SR-IOV virtual function driver
    #[serde(rename = "vfDriver", skip_serializing_if = "Option::is_none")]
    pub vf_driver: Option<String>,
    /// Backing port
    pub port: EthernetPortInfo,
}

common_interface!(EthernetInfo);

impl Keyed for EthernetInfo {
    type Key = String;
    fn key(&self) -> String {
        self.port.name.clone()
    }
}

impl Merge for EthernetInfo {
    fn merge(&mut self, src: &Self) {
        self.name.clone_from(&src.name);
        self.class.clone_from(&src.class);
        merge_value(&mut self.mtu, &src.mtu);
        merge_list(&mut self.platform_networks, &src.platform_networks);
        merge_list(&mut self.data_networks, &src.data_networks);
        merge_value(&mut self.vf_count, &src.vf_count);
        merge_value(&mut self.vf_driver, &src.vf_driver);
    }
}

impl Normalize for EthernetInfo {
    fn normalize(&mut self) {
        sort_names(&mut self.platform_networks);
        sort_names(&mut self.data_networks);
    }
}

/// VLAN interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VlanInfo {
    /// Interface name
    pub name: String,
    /// Interface class
    pub class: String,
    /// MTU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    /// Platform networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_networks: Option<Vec<String>>,
    /// Data networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_networks: Option<Vec<String>>,
    /// Name of the lower interface
    pub lower: String,
    /// VLAN identifier
    pub vid: i32,
}

common_interface!(VlanInfo);

impl Keyed for VlanInfo {
    type Key = String;
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Merge for VlanInfo {
    fn merge(&mut self, src: &Self) {
        self.class.clone_from(&src.class);
        merge_value(&mut self.mtu, &src.mtu);
        merge_list(&mut self.platform_networks, &src.platform_networks);
        merge_list(&mut self.data_networks, &src.data_networks);
        self.lower.clone_from(&src.lower);
        self.vid = src.vid;
    }
}

impl Normalize for VlanInfo {
    fn normalize(&mut self) {
        sort_names(&mut self.platform_networks);
        sort_names(&mut self.data_networks);
    }
}

/// Bonded (aggregated) interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BondInfo {
    /// Interface name
    pub name: String,
    /// Interface class
    pub class: String,
    /// MTU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    /// Platform networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_networks: Option<Vec<String>>,
    /// Data networks attached to this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_networks: Option<Vec<String>>,
    /// Member interface names
    pub members: Vec<String>,
    /// Aggregation mode (balanced, active_standby, 802.3ad)
    pub mode: String,
    /// Transmit hash policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmit_hash_policy: Option<String>,
}

common_interface!(BondInfo);

impl Keyed for BondInfo {
    type Key = Vec<String>;
    fn key(&self) -> Vec<String> {
        let mut members = self.members.clone();
        members.sort();
        members
    }
}

impl Merge for BondInfo {
    fn merge(&mut self, src: &Self) {
        self.name.clone_from(&src.name);
        self.class.clone_from(&src.class);
        merge_value(&mut self.mtu, &src.mtu);
        merge_list(&mut self.platform_networks, &src.platform_networks);
        merge_list(&mut self.data_networks, &src.data_networks);
        self.mode.clone_from(&src.mode);
        merge_value(&mut self.transmit_hash_policy, &src.transmit_hash_policy);
    }
}

impl Normalize for BondInfo {
    fn normalize(&mut self) {
        self.members.sort();
        sort_names(&mut self.platform_networks);
        sort_names(&mut self.data_networks);
    }
}

/// Interface configuration grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    /// Ethernet interfaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<Vec<EthernetInfo>>,
    /// VLAN interfaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Vec<VlanInfo>>,
    /// Bond interfaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<Vec<BondInfo>>,
}

impl InterfaceInfo {
    /// Declared ethernet interfaces (empty when unset).
    #[must_use]
    pub fn ethernets(&self) -> &[EthernetInfo] {
        self.ethernet.as_deref().unwrap_or_default()
    }

    /// Declared VLAN interfaces (empty when unset).
    #[must_use]
    pub fn vlans(&self) -> &[VlanInfo] {
        self.vlan.as_deref().unwrap_or_default()
    }

    /// Declared bond interfaces (empty when unset).
    #[must_use]
    pub fn bonds(&self) -> &[BondInfo] {
        self.bond.as_deref().unwrap_or_default()
    }
}

impl Merge for InterfaceInfo {
    fn merge(&mut self, src: &Self) {
        merge_keyed_list(&mut self.ethernet, &src.ethernet);
        merge_keyed_list(&mut self.vlan, &src.vlan);
        merge_keyed_list(&mut self.bond, &src.bond);
    }
}

impl Normalize for InterfaceInfo {
    fn normalize(&mut self) {
        normalize_keyed_list(&mut self.ethernet);
        normalize_keyed_list(&mut self.vlan);
        normalize_keyed_list(&mut self.bond);
    }
}

/// Static IP address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    /// Interface name
    pub interface: String,
    /// IP address
    pub address: String,
    /// Prefix length
    pub prefix: i32,
}

impl Keyed for AddressInfo {
    type Key = (String, String);
    fn key(&self) -> (String, String) {
        (self.interface.clone(), self.address.to_lowercase())
    }
}

impl Merge for AddressInfo {
    fn merge(&mut self, src: &Self) {
        self.prefix = src.prefix;
    }
}

impl Normalize for AddressInfo {
    fn normalize(&mut self) {}
}

/// Static route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    /// Interface name
    pub interface: String,
    /// Destination network
    #[serde(rename = "subnet")]
    pub network: String,
    /// Destination prefix length
    pub prefix: i32,
    /// Next hop
    pub gateway: String,
    /// Route metric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<i32>,
}

/// Metric applied to routes that do not specify one
pub const DEFAULT_ROUTE_METRIC: i32 = 1;

impl Keyed for RouteInfo {
    type Key = (String, String, i32);
    fn key(&self) -> (String, String, i32) {
        (self.interface.clone(), self.network.to_lowercase(), self.prefix)
    }
}

impl Merge for RouteInfo {
    fn merge(&mut self, src: &Self) {
        self.gateway.clone_from(&src.gateway);
        merge_value(&mut self.metric, &src.metric);
    }
}

impl Normalize for RouteInfo {
    fn normalize(&mut self) {}
}

/// Configurable surface of a host, layered through base profiles, per-host
/// overrides and captured defaults.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "HostProfile",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HostProfileSpec {
    /// Parent profile from which unset attributes are inherited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Host personality (controller, worker, storage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,

    /// Desired administrative state (locked, unlocked)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_state: Option<String>,

    /// Secondary functions carried by the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfunctions: Option<Vec<String>>,

    /// Physical location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Host labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Installer output type (text, graphical)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_output: Option<String>,

    /// Console device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,

    /// Boot device path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_device: Option<String>,

    /// Whether the host should be powered on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,

    /// Provisioning mode (static, dynamic)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_mode: Option<String>,

    /// MAC address of the boot interface
    #[serde(rename = "bootMAC", skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,

    /// Root filesystem device path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_device: Option<String>,

    /// Clock synchronization source (ntp, ptp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_synchronization: Option<String>,

    /// Board management controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_management: Option<BmInfo>,

    /// Processor tuning per NUMA node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<Vec<ProcessorInfo>>,

    /// Memory tuning per NUMA node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<MemoryNodeInfo>>,

    /// Storage configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<ProfileStorageInfo>,

    /// Interface configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<InterfaceInfo>,

    /// Static addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressInfo>>,

    /// Static routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteInfo>>,
}

impl HostProfileSpec {
    /// True when the host runs workloads, either as a worker or through a
    /// worker subfunction.
    #[must_use]
    pub fn has_worker_subfunction(&self) -> bool {
        if self.personality.as_deref() == Some(PERSONALITY_WORKER) {
            return true;
        }
        self.subfunctions
            .iter()
            .flatten()
            .any(|s| s == SUBFUNCTION_WORKER)
    }

    /// True for statically provisioned hosts.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.provisioning_mode.as_deref() == Some(PROVISIONING_STATIC)
    }

    /// Personality or the empty string.
    #[must_use]
    pub fn personality(&self) -> &str {
        self.personality.as_deref().unwrap_or_default()
    }

    /// Declared interfaces (empty when unset).
    #[must_use]
    pub fn interfaces(&self) -> InterfaceInfo {
        self.interfaces.clone().unwrap_or_default()
    }

    /// Declared addresses (empty when unset).
    #[must_use]
    pub fn addresses(&self) -> &[AddressInfo] {
        self.addresses.as_deref().unwrap_or_default()
    }

    /// Declared routes (empty when unset).
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        self.routes.as_deref().unwrap_or_default()
    }
}

impl Merge for HostProfileSpec {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.base, &src.base);
        merge_value(&mut self.personality, &src.personality);
        merge_value(&mut self.administrative_state, &src.administrative_state);
        merge_list(&mut self.subfunctions, &src.subfunctions);
        merge_value(&mut self.location, &src.location);
        merge_map(&mut self.labels, &src.labels);
        merge_value(&mut self.install_output, &src.install_output);
        merge_value(&mut self.console, &src.console);
        merge_value(&mut self.boot_device, &src.boot_device);
        merge_value(&mut self.power_on, &src.power_on);
        merge_value(&mut self.provisioning_mode, &src.provisioning_mode);
        merge_value(&mut self.boot_mac, &src.boot_mac);
        merge_value(&mut self.root_device, &src.root_device);
        merge_value(&mut self.clock_synchronization, &src.clock_synchronization);
        merge_struct(&mut self.board_management, &src.board_management);
        merge_keyed_list(&mut self.processors, &src.processors);
        merge_keyed_list(&mut self.memory, &src.memory);
        merge_struct(&mut self.storage, &src.storage);
        merge_struct(&mut self.interfaces, &src.interfaces);
        merge_keyed_list(&mut self.addresses, &src.addresses);
        merge_keyed_list(&mut self.routes, &src.routes);
    }
}

impl Normalize for HostProfileSpec {
    fn normalize(&mut self) {
        sort_names(&mut self.subfunctions);
        normalize_keyed_list(&mut self.processors);
        normalize_keyed_list(&mut self.memory);
        if let Some(storage) = self.storage.as_mut() {
            storage.normalize();
        }
        if let Some(interfaces) = self.interfaces.as_mut() {
            interfaces.normalize();
        }
        normalize_keyed_list(&mut self.addresses);
        normalize_keyed_list(&mut self.routes);
    }
}

fn sort_names(names: &mut Option<Vec<String>>) {
    if let Some(names) = names {
        names.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{equal, merged};

    fn ethernet(name: &str, port: &str, class: &str) -> EthernetInfo {
        EthernetInfo {
            name: name.to_string(),
            class: class.to_string(),
            port: EthernetPortInfo { name: port.to_string() },
            ..Default::default()
        }
    }

    #[test]
    fn test_common_interface_can_cross_await_points() {
        fn shared<T: Sync + ?Sized>(_: &T) {}
        let info = ethernet("data0", "eth1", "data");
        let info: &dyn CommonInterface = &info;
        shared(info);
        assert_eq!(info.name(), "data0");
    }

    #[test]
    fn test_merge_with_empty_profile_is_identity() {
        let profile = HostProfileSpec {
            base: Some("common".to_string()),
            personality: Some(PERSONALITY_WORKER.to_string()),
            administrative_state: Some("unlocked".to_string()),
            subfunctions: Some(vec!["worker".to_string(), "lowlatency".to_string()]),
            labels: Some(BTreeMap::from([("sriov".to_string(), "enabled".to_string())])),
            console: Some("ttyS0,115200".to_string()),
            power_on: Some(true),
            board_management: Some(BmInfo {
                bm_type: Some("ipmi".to_string()),
                address: Some("192.168.9.9".to_string()),
                ..Default::default()
            }),
            processors: Some(vec![ProcessorInfo {
                node: 0,
                functions: vec![ProcessorFunctionInfo {
                    function: "platform".to_string(),
                    count: 2,
                }],
            }]),
            memory: Some(vec![MemoryNodeInfo {
                node: 0,
                functions: vec![MemoryFunctionInfo {
                    function: "vm".to_string(),
                    page_size: "1GB".to_string(),
                    page_count: 4,
                }],
            }]),
            storage: Some(ProfileStorageInfo {
                filesystems: Some(vec![FileSystemInfo {
                    name: "docker".to_string(),
                    size: 30,
                }]),
                ..Default::default()
            }),
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("mgmt0", "eth0", "platform"), ethernet("data0", "eth1", "data")]),
                vlan: Some(vec![VlanInfo {
                    name: "vlan10".to_string(),
                    class: "data".to_string(),
                    lower: "data0".to_string(),
                    vid: 10,
                    ..Default::default()
                }]),
                bond: Some(Vec::new()),
            }),
            addresses: Some(vec![AddressInfo {
                interface: "data0".to_string(),
                address: "10.10.10.5".to_string(),
                prefix: 24,
            }]),
            routes: Some(vec![RouteInfo {
                interface: "data0".to_string(),
                network: "10.20.0.0".to_string(),
                prefix: 16,
                gateway: "10.10.10.1".to_string(),
                metric: Some(1),
            }]),
            ..Default::default()
        };
        let empty = HostProfileSpec::default();

        assert_eq!(merged(&profile, &empty), profile, "merge(P, empty) must equal P");
        assert_eq!(merged(&empty, &profile), profile, "merge(empty, P) must equal P");
    }

    #[test]
    fn test_ethernet_merges_by_port_name() {
        let parent = HostProfileSpec {
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("eth0", "eth0", "platform")]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let child = HostProfileSpec {
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("mgmt0", "eth0", "platform")]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = merged(&parent, &child);
        let ethernets = result.interfaces.unwrap_or_default().ethernet.unwrap_or_default();
        assert_eq!(ethernets.len(), 1, "renamed interface must not be appended");
        assert_eq!(ethernets[0].name, "mgmt0");
    }

    #[test]
    fn test_bond_key_ignores_member_order() {
        let a = BondInfo {
            members: vec!["eth1".to_string(), "eth0".to_string()],
            ..Default::default()
        };
        let b = BondInfo {
            members: vec!["eth0".to_string(), "eth1".to_string()],
            ..Default::default()
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_equal_ignores_keyed_list_order() {
        let a = HostProfileSpec {
            storage: Some(ProfileStorageInfo {
                filesystems: Some(vec![
                    FileSystemInfo { name: "docker".to_string(), size: 30 },
                    FileSystemInfo { name: "backup".to_string(), size: 20 },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut b = a.clone();
        if let Some(fs) = b.storage.as_mut().and_then(|s| s.filesystems.as_mut()) {
            fs.reverse();
        }
        assert!(equal(&a, &b));
    }

    #[test]
    fn test_has_worker_subfunction() {
        let mut profile = HostProfileSpec {
            personality: Some(PERSONALITY_CONTROLLER.to_string()),
            ..Default::default()
        };
        assert!(!profile.has_worker_subfunction());

        profile.subfunctions = Some(vec!["controller".to_string(), "worker".to_string()]);
        assert!(profile.has_worker_subfunction());
    }

    #[test]
    fn test_profile_round_trips_through_json_field_names() {
        let json = serde_json::json!({
            "personality": "worker",
            "bootMAC": "aa:bb:cc:dd:ee:01",
            "routes": [{"interface": "mgmt0", "subnet": "0.0.0.0", "prefix": 0, "gateway": "10.0.0.1"}],
            "boardManagement": {"type": "ipmi", "address": "10.10.10.10", "credentials": {"password": {"secret": "bmc"}}}
        });
        let profile: HostProfileSpec = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(profile.boot_mac.as_deref(), Some("aa:bb:cc:dd:ee:01"));
        assert_eq!(profile.routes()[0].network, "0.0.0.0");
        assert_eq!(
            profile.board_management.and_then(|b| b.bm_type).as_deref(),
            Some("ipmi")
        );
    }
}
