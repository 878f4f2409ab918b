//! PlatformClient trait for mocking
//!
//! This trait abstracts the PlatformClient to enable mocking in unit tests.
//! The concrete PlatformClient implements this trait, and tests can use the
//! in-memory mock behind the `test-util` feature.

use std::collections::BTreeMap;

use crate::error::PlatformError;
use crate::models::*;

/// Trait for inventory API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait PlatformClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// True when the client talks to the platform over HTTPS
    fn is_https(&self) -> bool {
        self.base_url().starts_with("https://")
    }

    // System
    async fn get_system(&self) -> Result<SystemRecord, PlatformError>;
    async fn update_system(&self, id: &str, opts: &SystemOpts) -> Result<SystemRecord, PlatformError>;
    async fn get_dns(&self) -> Result<Option<Dns>, PlatformError>;
    async fn update_dns(&self, id: &str, nameservers: &str) -> Result<Dns, PlatformError>;
    async fn get_ntp(&self) -> Result<Option<Ntp>, PlatformError>;
    async fn update_ntp(&self, id: &str, ntpservers: &str) -> Result<Ntp, PlatformError>;
    async fn get_ptp(&self) -> Result<Option<Ptp>, PlatformError>;
    async fn update_ptp(&self, id: &str, opts: &PtpOpts) -> Result<Ptp, PlatformError>;
    async fn get_drbd(&self) -> Result<Option<Drbd>, PlatformError>;
    async fn update_drbd(&self, id: &str, link_utilization: i32) -> Result<Drbd, PlatformError>;
    async fn list_certificates(&self) -> Result<Vec<Certificate>, PlatformError>;
    async fn install_certificate(&self, mode: &str, pem: Vec<u8>) -> Result<(), PlatformError>;
    async fn get_license(&self) -> Result<License, PlatformError>;
    async fn install_license(&self, content: Vec<u8>) -> Result<(), PlatformError>;
    async fn list_service_parameters(&self) -> Result<Vec<ServiceParameter>, PlatformError>;
    async fn create_service_parameter(&self, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError>;
    async fn update_service_parameter(&self, id: &str, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError>;
    async fn list_storage_backends(&self) -> Result<Vec<StorageBackend>, PlatformError>;
    async fn create_storage_backend(&self, opts: &StorageBackendOpts) -> Result<StorageBackend, PlatformError>;
    async fn list_controller_filesystems(&self) -> Result<Vec<ControllerFilesystem>, PlatformError>;
    async fn update_controller_filesystems(&self, system_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError>;

    // Hosts
    async fn list_hosts(&self) -> Result<Vec<Host>, PlatformError>;
    async fn get_host(&self, id: &str) -> Result<Host, PlatformError>;
    async fn create_host(&self, opts: &HostOpts) -> Result<Host, PlatformError>;
    async fn update_host(&self, id: &str, opts: &HostOpts) -> Result<Host, PlatformError>;
    async fn host_action(&self, id: &str, action: HostAction) -> Result<Host, PlatformError>;
    async fn delete_host(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_labels(&self, host_id: &str) -> Result<Vec<Label>, PlatformError>;
    async fn assign_labels(&self, host_id: &str, labels: &BTreeMap<String, String>) -> Result<(), PlatformError>;
    async fn delete_label(&self, id: &str) -> Result<(), PlatformError>;

    // Host storage
    async fn list_disks(&self, host_id: &str) -> Result<Vec<Disk>, PlatformError>;
    async fn list_partitions(&self, host_id: &str) -> Result<Vec<Partition>, PlatformError>;
    async fn create_partition(&self, opts: &PartitionOpts) -> Result<Partition, PlatformError>;
    async fn list_physical_volumes(&self, host_id: &str) -> Result<Vec<PhysicalVolume>, PlatformError>;
    async fn create_physical_volume(&self, opts: &PhysicalVolumeOpts) -> Result<PhysicalVolume, PlatformError>;
    async fn list_volume_groups(&self, host_id: &str) -> Result<Vec<VolumeGroup>, PlatformError>;
    async fn create_volume_group(&self, opts: &VolumeGroupOpts) -> Result<VolumeGroup, PlatformError>;
    async fn list_osds(&self, host_id: &str) -> Result<Vec<Osd>, PlatformError>;
    async fn create_osd(&self, opts: &OsdOpts) -> Result<Osd, PlatformError>;
    async fn update_osd(&self, id: &str, opts: &OsdOpts) -> Result<Osd, PlatformError>;
    async fn delete_osd(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_clusters(&self) -> Result<Vec<Cluster>, PlatformError>;
    async fn list_storage_tiers(&self, cluster_id: &str) -> Result<Vec<StorageTier>, PlatformError>;
    async fn list_ceph_monitors(&self) -> Result<Vec<CephMonitor>, PlatformError>;
    async fn create_ceph_monitor(&self, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError>;
    async fn update_ceph_monitor(&self, id: &str, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError>;
    async fn list_host_filesystems(&self, host_id: &str) -> Result<Vec<HostFilesystem>, PlatformError>;
    async fn update_host_filesystems(&self, host_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError>;

    // Host processors and memory
    async fn list_cpus(&self, host_id: &str) -> Result<Vec<Cpu>, PlatformError>;
    async fn update_cpus(&self, host_id: &str, opts: &[CpuOpts]) -> Result<(), PlatformError>;
    async fn list_memory(&self, host_id: &str) -> Result<Vec<Memory>, PlatformError>;
    async fn update_memory(&self, id: &str, opts: &MemoryOpts) -> Result<Memory, PlatformError>;

    // Host networking
    async fn list_ports(&self, host_id: &str) -> Result<Vec<Port>, PlatformError>;
    async fn list_interfaces(&self, host_id: &str) -> Result<Vec<Interface>, PlatformError>;
    async fn create_interface(&self, opts: &InterfaceOpts) -> Result<Interface, PlatformError>;
    async fn update_interface(&self, id: &str, opts: &InterfaceOpts) -> Result<Interface, PlatformError>;
    async fn delete_interface(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_interface_networks(&self, host_id: &str) -> Result<Vec<InterfaceNetwork>, PlatformError>;
    async fn create_interface_network(&self, opts: &InterfaceNetworkOpts) -> Result<InterfaceNetwork, PlatformError>;
    async fn delete_interface_network(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_interface_datanetworks(&self, host_id: &str) -> Result<Vec<InterfaceDataNetwork>, PlatformError>;
    async fn create_interface_datanetwork(&self, opts: &InterfaceDataNetworkOpts) -> Result<InterfaceDataNetwork, PlatformError>;
    async fn delete_interface_datanetwork(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_addresses(&self, host_id: &str) -> Result<Vec<Address>, PlatformError>;
    async fn create_address(&self, opts: &AddressOpts) -> Result<Address, PlatformError>;
    async fn delete_address(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_routes(&self, host_id: &str) -> Result<Vec<Route>, PlatformError>;
    async fn create_route(&self, opts: &RouteOpts) -> Result<Route, PlatformError>;
    async fn delete_route(&self, id: &str) -> Result<(), PlatformError>;

    // Platform networks
    async fn list_address_pools(&self) -> Result<Vec<AddressPool>, PlatformError>;
    async fn create_address_pool(&self, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError>;
    async fn update_address_pool(&self, id: &str, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError>;
    async fn delete_address_pool(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_networks(&self) -> Result<Vec<Network>, PlatformError>;
    async fn create_network(&self, opts: &NetworkOpts) -> Result<Network, PlatformError>;
    async fn delete_network(&self, id: &str) -> Result<(), PlatformError>;

    // Data networks
    async fn list_data_networks(&self) -> Result<Vec<DataNetwork>, PlatformError>;
    async fn create_data_network(&self, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError>;
    async fn update_data_network(&self, id: &str, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError>;
    async fn delete_data_network(&self, id: &str) -> Result<(), PlatformError>;

    // PTP instances and interfaces
    async fn list_ptp_instances(&self) -> Result<Vec<PtpInstance>, PlatformError>;
    async fn create_ptp_instance(&self, opts: &PtpOwnerOpts) -> Result<PtpInstance, PlatformError>;
    async fn update_ptp_instance_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInstance, PlatformError>;
    async fn delete_ptp_instance(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_ptp_interfaces(&self) -> Result<Vec<PtpInterface>, PlatformError>;
    async fn create_ptp_interface(&self, opts: &PtpOwnerOpts) -> Result<PtpInterface, PlatformError>;
    async fn update_ptp_interface_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInterface, PlatformError>;
    async fn delete_ptp_interface(&self, id: &str) -> Result<(), PlatformError>;
}
