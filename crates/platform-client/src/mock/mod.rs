//! Mock PlatformClient for unit testing
//!
//! This module provides an in-memory implementation of PlatformClientTrait
//! that can be used in unit tests without a running platform.
//!
//! The mock is organized into domain-specific modules:
//! - `system.rs` - system wide singletons, certificates, licence, service parameters
//! - `host.rs` - hosts, labels, host actions
//! - `storage.rs` - disks, partitions, volume groups, OSDs, monitors, filesystems
//! - `networking.rs` - ports, interfaces, addresses, routes, processors, memory
//! - `network.rs` - address pools, networks, data networks, PTP
//! - `helpers.rs` - table helpers shared by the domain modules

mod helpers;
mod host;
mod network;
mod networking;
mod storage;
mod system;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::PlatformError;
use crate::models::*;
use crate::platform_trait::PlatformClientTrait;

macro_rules! tables {
    ($( $field:ident : $ty:ty => $add:ident ),* $(,)?) => {
        /// In-memory resource tables
        #[derive(Debug, Default)]
        pub(crate) struct Tables {
            pub(crate) system: SystemRecord,
            pub(crate) dns: Option<Dns>,
            pub(crate) ntp: Option<Ntp>,
            pub(crate) ptp: Option<Ptp>,
            pub(crate) drbd: Option<Drbd>,
            pub(crate) license: License,
            pub(crate) cpu_updates: Vec<(String, Vec<CpuOpts>)>,
            pub(crate) certificate_installs: Vec<(String, Vec<u8>)>,
            $( pub(crate) $field: Vec<$ty>, )*
        }

        impl MockPlatformClient {
            $(
                #[doc = concat!("Add a `", stringify!($ty), "` to the mock store (for test setup)")]
                pub fn $add(&self, item: $ty) {
                    self.state().$field.push(item);
                }

                #[doc = concat!("Current contents of the `", stringify!($field), "` table")]
                pub fn $field(&self) -> Vec<$ty> {
                    self.state().$field.clone()
                }
            )*
        }
    };
}

tables! {
    certificates: Certificate => add_certificate,
    service_parameters: ServiceParameter => add_service_parameter,
    storage_backends: StorageBackend => add_storage_backend,
    controller_filesystems: ControllerFilesystem => add_controller_filesystem,
    hosts: Host => add_host,
    labels: Label => add_label,
    disks: Disk => add_disk,
    partitions: Partition => add_partition,
    physical_volumes: PhysicalVolume => add_physical_volume,
    volume_groups: VolumeGroup => add_volume_group,
    osds: Osd => add_osd,
    clusters: Cluster => add_cluster,
    storage_tiers: StorageTier => add_storage_tier,
    ceph_monitors: CephMonitor => add_ceph_monitor,
    host_filesystems: HostFilesystem => add_host_filesystem,
    cpus: Cpu => add_cpu,
    memory: Memory => add_memory,
    ports: Port => add_port,
    interfaces: Interface => add_interface,
    interface_networks: InterfaceNetwork => add_interface_network,
    interface_datanetworks: InterfaceDataNetwork => add_interface_datanetwork,
    addresses: Address => add_address,
    routes: Route => add_route,
    address_pools: AddressPool => add_address_pool,
    networks: Network => add_network,
    data_networks: DataNetwork => add_data_network,
    ptp_instances: PtpInstance => add_ptp_instance,
    ptp_interfaces: PtpInterface => add_ptp_interface,
}

/// Mock PlatformClient for testing
///
/// Stores resources in memory, records every call, and can be told to
/// fail specific operations or refuse specific deletions.
#[derive(Clone)]
pub struct MockPlatformClient {
    pub(crate) base_url: String,
    pub(crate) tables: Arc<Mutex<Tables>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, u16>>>,
    pub(crate) delete_conflicts: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for MockPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlatformClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MockPlatformClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tables: Arc::new(Mutex::new(Tables::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delete_conflicts: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Record a call and return the injected failure for it, if any.
    pub(crate) fn enter(&self, op: &str, target: &str) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(if target.is_empty() {
            op.to_string()
        } else {
            format!("{} {}", op, target)
        });
        match self.failures.lock().unwrap().remove(op) {
            Some(404) => Err(PlatformError::NotFound(format!("{} {}", op, target))),
            Some(status) => Err(PlatformError::Api {
                status,
                message: format!("{} {} failed", op, target),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn check_delete(&self, id: &str) -> Result<(), PlatformError> {
        if self.delete_conflicts.lock().unwrap().contains(id) {
            return Err(PlatformError::Conflict(format!("{} is in use", id)));
        }
        Ok(())
    }

    /// Make the next call of `op` fail with the given HTTP status
    pub fn fail_next(&self, op: &str, status: u16) {
        self.failures.lock().unwrap().insert(op.to_string(), status);
    }

    /// Make deletion of `id` fail as in-use
    pub fn set_delete_conflict(&self, id: &str) {
        self.delete_conflicts.lock().unwrap().insert(id.to_string());
    }

    /// Allow deletion of `id` again
    pub fn clear_delete_conflict(&self, id: &str) {
        self.delete_conflicts.lock().unwrap().remove(id);
    }

    /// Every call made so far, as `"<operation> <target>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of one operation
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c == op || c.starts_with(&format!("{} ", op)))
            .collect()
    }

    /// Number of calls that modify platform state
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !(c.starts_with("list_") || c.starts_with("get_")))
            .count()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Replace the system record
    pub fn set_system(&self, system: SystemRecord) {
        self.state().system = system;
    }

    /// Current system record
    pub fn system(&self) -> SystemRecord {
        self.state().system.clone()
    }

    /// Replace the DNS record
    pub fn set_dns(&self, dns: Dns) {
        self.state().dns = Some(dns);
    }

    /// Replace the NTP record
    pub fn set_ntp(&self, ntp: Ntp) {
        self.state().ntp = Some(ntp);
    }

    /// Replace the PTP record
    pub fn set_ptp(&self, ptp: Ptp) {
        self.state().ptp = Some(ptp);
    }

    /// Replace the DRBD record
    pub fn set_drbd(&self, drbd: Drbd) {
        self.state().drbd = Some(drbd);
    }

    /// Replace the installed licence
    pub fn set_license(&self, content: &str) {
        self.state().license = License {
            content: content.to_string(),
        };
    }

    /// Current NTP record
    pub fn ntp(&self) -> Option<Ntp> {
        self.state().ntp.clone()
    }

    /// Current DNS record
    pub fn dns(&self) -> Option<Dns> {
        self.state().dns.clone()
    }

    /// Current licence
    pub fn license(&self) -> License {
        self.state().license.clone()
    }

    /// Certificates installed through the mock, as `(mode, pem)`
    pub fn certificate_installs(&self) -> Vec<(String, Vec<u8>)> {
        self.state().certificate_installs.clone()
    }

    /// CPU updates received, as `(host id, requests)`
    pub fn cpu_updates(&self) -> Vec<(String, Vec<CpuOpts>)> {
        self.state().cpu_updates.clone()
    }
}

#[async_trait::async_trait]
impl PlatformClientTrait for MockPlatformClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    // System - delegated to system module
    async fn get_system(&self) -> Result<SystemRecord, PlatformError> {
        system::get_system(self).await
    }
    async fn update_system(&self, id: &str, opts: &SystemOpts) -> Result<SystemRecord, PlatformError> {
        system::update_system(self, id, opts).await
    }
    async fn get_dns(&self) -> Result<Option<Dns>, PlatformError> {
        system::get_dns(self).await
    }
    async fn update_dns(&self, id: &str, nameservers: &str) -> Result<Dns, PlatformError> {
        system::update_dns(self, id, nameservers).await
    }
    async fn get_ntp(&self) -> Result<Option<Ntp>, PlatformError> {
        system::get_ntp(self).await
    }
    async fn update_ntp(&self, id: &str, ntpservers: &str) -> Result<Ntp, PlatformError> {
        system::update_ntp(self, id, ntpservers).await
    }
    async fn get_ptp(&self) -> Result<Option<Ptp>, PlatformError> {
        system::get_ptp(self).await
    }
    async fn update_ptp(&self, id: &str, opts: &PtpOpts) -> Result<Ptp, PlatformError> {
        system::update_ptp(self, id, opts).await
    }
    async fn get_drbd(&self) -> Result<Option<Drbd>, PlatformError> {
        system::get_drbd(self).await
    }
    async fn update_drbd(&self, id: &str, link_utilization: i32) -> Result<Drbd, PlatformError> {
        system::update_drbd(self, id, link_utilization).await
    }
    async fn list_certificates(&self) -> Result<Vec<Certificate>, PlatformError> {
        system::list_certificates(self).await
    }
    async fn install_certificate(&self, mode: &str, pem: Vec<u8>) -> Result<(), PlatformError> {
        system::install_certificate(self, mode, pem).await
    }
    async fn get_license(&self) -> Result<License, PlatformError> {
        system::get_license(self).await
    }
    async fn install_license(&self, content: Vec<u8>) -> Result<(), PlatformError> {
        system::install_license(self, content).await
    }
    async fn list_service_parameters(&self) -> Result<Vec<ServiceParameter>, PlatformError> {
        system::list_service_parameters(self).await
    }
    async fn create_service_parameter(&self, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError> {
        system::create_service_parameter(self, opts).await
    }
    async fn update_service_parameter(&self, id: &str, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError> {
        system::update_service_parameter(self, id, opts).await
    }
    async fn list_storage_backends(&self) -> Result<Vec<StorageBackend>, PlatformError> {
        system::list_storage_backends(self).await
    }
    async fn create_storage_backend(&self, opts: &StorageBackendOpts) -> Result<StorageBackend, PlatformError> {
        system::create_storage_backend(self, opts).await
    }
    async fn list_controller_filesystems(&self) -> Result<Vec<ControllerFilesystem>, PlatformError> {
        system::list_controller_filesystems(self).await
    }
    async fn update_controller_filesystems(&self, system_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError> {
        system::update_controller_filesystems(self, system_id, opts).await
    }

    // Hosts - delegated to host module
    async fn list_hosts(&self) -> Result<Vec<Host>, PlatformError> {
        host::list_hosts(self).await
    }
    async fn get_host(&self, id: &str) -> Result<Host, PlatformError> {
        host::get_host(self, id).await
    }
    async fn create_host(&self, opts: &HostOpts) -> Result<Host, PlatformError> {
        host::create_host(self, opts).await
    }
    async fn update_host(&self, id: &str, opts: &HostOpts) -> Result<Host, PlatformError> {
        host::update_host(self, id, opts).await
    }
    async fn host_action(&self, id: &str, action: HostAction) -> Result<Host, PlatformError> {
        host::host_action(self, id, action).await
    }
    async fn delete_host(&self, id: &str) -> Result<(), PlatformError> {
        host::delete_host(self, id).await
    }
    async fn list_labels(&self, host_id: &str) -> Result<Vec<Label>, PlatformError> {
        host::list_labels(self, host_id).await
    }
    async fn assign_labels(&self, host_id: &str, labels: &BTreeMap<String, String>) -> Result<(), PlatformError> {
        host::assign_labels(self, host_id, labels).await
    }
    async fn delete_label(&self, id: &str) -> Result<(), PlatformError> {
        host::delete_label(self, id).await
    }

    // Host storage - delegated to storage module
    async fn list_disks(&self, host_id: &str) -> Result<Vec<Disk>, PlatformError> {
        storage::list_disks(self, host_id).await
    }
    async fn list_partitions(&self, host_id: &str) -> Result<Vec<Partition>, PlatformError> {
        storage::list_partitions(self, host_id).await
    }
    async fn create_partition(&self, opts: &PartitionOpts) -> Result<Partition, PlatformError> {
        storage::create_partition(self, opts).await
    }
    async fn list_physical_volumes(&self, host_id: &str) -> Result<Vec<PhysicalVolume>, PlatformError> {
        storage::list_physical_volumes(self, host_id).await
    }
    async fn create_physical_volume(&self, opts: &PhysicalVolumeOpts) -> Result<PhysicalVolume, PlatformError> {
        storage::create_physical_volume(self, opts).await
    }
    async fn list_volume_groups(&self, host_id: &str) -> Result<Vec<VolumeGroup>, PlatformError> {
        storage::list_volume_groups(self, host_id).await
    }
    async fn create_volume_group(&self, opts: &VolumeGroupOpts) -> Result<VolumeGroup, PlatformError> {
        storage::create_volume_group(self, opts).await
    }
    async fn list_osds(&self, host_id: &str) -> Result<Vec<Osd>, PlatformError> {
        storage::list_osds(self, host_id).await
    }
    async fn create_osd(&self, opts: &OsdOpts) -> Result<Osd, PlatformError> {
        storage::create_osd(self, opts).await
    }
    async fn update_osd(&self, id: &str, opts: &OsdOpts) -> Result<Osd, PlatformError> {
        storage::update_osd(self, id, opts).await
    }
    async fn delete_osd(&self, id: &str) -> Result<(), PlatformError> {
        storage::delete_osd(self, id).await
    }
    async fn list_clusters(&self) -> Result<Vec<Cluster>, PlatformError> {
        storage::list_clusters(self).await
    }
    async fn list_storage_tiers(&self, cluster_id: &str) -> Result<Vec<StorageTier>, PlatformError> {
        storage::list_storage_tiers(self, cluster_id).await
    }
    async fn list_ceph_monitors(&self) -> Result<Vec<CephMonitor>, PlatformError> {
        storage::list_ceph_monitors(self).await
    }
    async fn create_ceph_monitor(&self, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError> {
        storage::create_ceph_monitor(self, opts).await
    }
    async fn update_ceph_monitor(&self, id: &str, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError> {
        storage::update_ceph_monitor(self, id, opts).await
    }
    async fn list_host_filesystems(&self, host_id: &str) -> Result<Vec<HostFilesystem>, PlatformError> {
        storage::list_host_filesystems(self, host_id).await
    }
    async fn update_host_filesystems(&self, host_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError> {
        storage::update_host_filesystems(self, host_id, opts).await
    }

    // Processors, memory and host networking - delegated to networking module
    async fn list_cpus(&self, host_id: &str) -> Result<Vec<Cpu>, PlatformError> {
        networking::list_cpus(self, host_id).await
    }
    async fn update_cpus(&self, host_id: &str, opts: &[CpuOpts]) -> Result<(), PlatformError> {
        networking::update_cpus(self, host_id, opts).await
    }
    async fn list_memory(&self, host_id: &str) -> Result<Vec<Memory>, PlatformError> {
        networking::list_memory(self, host_id).await
    }
    async fn update_memory(&self, id: &str, opts: &MemoryOpts) -> Result<Memory, PlatformError> {
        networking::update_memory(self, id, opts).await
    }
    async fn list_ports(&self, host_id: &str) -> Result<Vec<Port>, PlatformError> {
        networking::list_ports(self, host_id).await
    }
    async fn list_interfaces(&self, host_id: &str) -> Result<Vec<Interface>, PlatformError> {
        networking::list_interfaces(self, host_id).await
    }
    async fn create_interface(&self, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
        networking::create_interface(self, opts).await
    }
    async fn update_interface(&self, id: &str, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
        networking::update_interface(self, id, opts).await
    }
    async fn delete_interface(&self, id: &str) -> Result<(), PlatformError> {
        networking::delete_interface(self, id).await
    }
    async fn list_interface_networks(&self, host_id: &str) -> Result<Vec<InterfaceNetwork>, PlatformError> {
        networking::list_interface_networks(self, host_id).await
    }
    async fn create_interface_network(&self, opts: &InterfaceNetworkOpts) -> Result<InterfaceNetwork, PlatformError> {
        networking::create_interface_network(self, opts).await
    }
    async fn delete_interface_network(&self, id: &str) -> Result<(), PlatformError> {
        networking::delete_interface_network(self, id).await
    }
    async fn list_interface_datanetworks(&self, host_id: &str) -> Result<Vec<InterfaceDataNetwork>, PlatformError> {
        networking::list_interface_datanetworks(self, host_id).await
    }
    async fn create_interface_datanetwork(&self, opts: &InterfaceDataNetworkOpts) -> Result<InterfaceDataNetwork, PlatformError> {
        networking::create_interface_datanetwork(self, opts).await
    }
    async fn delete_interface_datanetwork(&self, id: &str) -> Result<(), PlatformError> {
        networking::delete_interface_datanetwork(self, id).await
    }
    async fn list_addresses(&self, host_id: &str) -> Result<Vec<Address>, PlatformError> {
        networking::list_addresses(self, host_id).await
    }
    async fn create_address(&self, opts: &AddressOpts) -> Result<Address, PlatformError> {
        networking::create_address(self, opts).await
    }
    async fn delete_address(&self, id: &str) -> Result<(), PlatformError> {
        networking::delete_address(self, id).await
    }
    async fn list_routes(&self, host_id: &str) -> Result<Vec<Route>, PlatformError> {
        networking::list_routes(self, host_id).await
    }
    async fn create_route(&self, opts: &RouteOpts) -> Result<Route, PlatformError> {
        networking::create_route(self, opts).await
    }
    async fn delete_route(&self, id: &str) -> Result<(), PlatformError> {
        networking::delete_route(self, id).await
    }

    // Platform networks, data networks and PTP - delegated to network module
    async fn list_address_pools(&self) -> Result<Vec<AddressPool>, PlatformError> {
        network::list_address_pools(self).await
    }
    async fn create_address_pool(&self, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError> {
        network::create_address_pool(self, opts).await
    }
    async fn update_address_pool(&self, id: &str, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError> {
        network::update_address_pool(self, id, opts).await
    }
    async fn delete_address_pool(&self, id: &str) -> Result<(), PlatformError> {
        network::delete_address_pool(self, id).await
    }
    async fn list_networks(&self) -> Result<Vec<Network>, PlatformError> {
        network::list_networks(self).await
    }
    async fn create_network(&self, opts: &NetworkOpts) -> Result<Network, PlatformError> {
        network::create_network(self, opts).await
    }
    async fn delete_network(&self, id: &str) -> Result<(), PlatformError> {
        network::delete_network(self, id).await
    }
    async fn list_data_networks(&self) -> Result<Vec<DataNetwork>, PlatformError> {
        network::list_data_networks(self).await
    }
    async fn create_data_network(&self, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError> {
        network::create_data_network(self, opts).await
    }
    async fn update_data_network(&self, id: &str, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError> {
        network::update_data_network(self, id, opts).await
    }
    async fn delete_data_network(&self, id: &str) -> Result<(), PlatformError> {
        network::delete_data_network(self, id).await
    }
    async fn list_ptp_instances(&self) -> Result<Vec<PtpInstance>, PlatformError> {
        network::list_ptp_instances(self).await
    }
    async fn create_ptp_instance(&self, opts: &PtpOwnerOpts) -> Result<PtpInstance, PlatformError> {
        network::create_ptp_instance(self, opts).await
    }
    async fn update_ptp_instance_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInstance, PlatformError> {
        network::update_ptp_instance_parameters(self, id, add, remove).await
    }
    async fn delete_ptp_instance(&self, id: &str) -> Result<(), PlatformError> {
        network::delete_ptp_instance(self, id).await
    }
    async fn list_ptp_interfaces(&self) -> Result<Vec<PtpInterface>, PlatformError> {
        network::list_ptp_interfaces(self).await
    }
    async fn create_ptp_interface(&self, opts: &PtpOwnerOpts) -> Result<PtpInterface, PlatformError> {
        network::create_ptp_interface(self, opts).await
    }
    async fn update_ptp_interface_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInterface, PlatformError> {
        network::update_ptp_interface_parameters(self, id, add, remove).await
    }
    async fn delete_ptp_interface(&self, id: &str) -> Result<(), PlatformError> {
        network::delete_ptp_interface(self, id).await
    }
}
