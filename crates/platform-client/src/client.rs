//! Inventory API client implementation

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::auth::{authenticate, Credentials};
use crate::common::{to_patch, to_patch_strings, HttpClient};
use crate::error::PlatformError;
use crate::models::*;
use crate::platform_trait::PlatformClientTrait;

/// Inventory API client
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: HttpClient,
}

fn http_client(trust_anchors: &[Vec<u8>]) -> Result<Client, PlatformError> {
    let mut builder = Client::builder().timeout(Duration::from_secs(30));
    for pem in trust_anchors {
        let cert = reqwest::Certificate::from_pem(pem).map_err(PlatformError::Http)?;
        builder = builder.add_root_certificate(cert);
    }
    builder.build().map_err(PlatformError::Http)
}

fn first<T>(items: Vec<T>) -> Option<T> {
    items.into_iter().next()
}

impl PlatformClient {
    /// Create a client for an already authenticated endpoint.
    ///
    /// # Errors
    /// Returns `Http` when the underlying HTTP client cannot be built.
    pub fn new(base_url: String, token: String) -> Result<Self, PlatformError> {
        let client = http_client(&[])?;
        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Authenticate with the endpoint credentials and build a client.
    ///
    /// `trust_anchors` are extra PEM encoded CA certificates accepted for
    /// the inventory and keystone endpoints.
    ///
    /// # Errors
    /// Returns `Authentication` when the token exchange fails.
    pub async fn connect(creds: &Credentials, trust_anchors: &[Vec<u8>]) -> Result<Self, PlatformError> {
        let client = http_client(trust_anchors)?;
        let session = authenticate(&client, creds).await?;
        info!("Connected to inventory endpoint {}", session.endpoint);
        Ok(Self {
            http: HttpClient::new(client, session.endpoint, session.token),
        })
    }

    /// Access the raw HTTP wrapper
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    async fn ptp_parameters<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<T, PlatformError> {
        let ops = add
            .iter()
            .map(|p| ("add", p))
            .chain(remove.iter().map(|p| ("remove", p)))
            .map(|(op, p)| serde_json::json!({"op": op, "path": "/ptp_parameters/-", "value": p}))
            .collect::<Vec<_>>();
        self.http.patch(path, &serde_json::Value::Array(ops)).await
    }
}

#[async_trait::async_trait]
impl PlatformClientTrait for PlatformClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    // System

    async fn get_system(&self) -> Result<SystemRecord, PlatformError> {
        let systems: Vec<SystemRecord> = self.http.get_list("isystems", "isystems").await?;
        first(systems).ok_or_else(|| PlatformError::NotFound("isystems: no system record".to_string()))
    }

    async fn update_system(&self, id: &str, opts: &SystemOpts) -> Result<SystemRecord, PlatformError> {
        self.http.patch(&format!("isystems/{}", id), &to_patch(opts)?).await
    }

    async fn get_dns(&self) -> Result<Option<Dns>, PlatformError> {
        Ok(first(self.http.get_list("idns", "idnss").await?))
    }

    async fn update_dns(&self, id: &str, nameservers: &str) -> Result<Dns, PlatformError> {
        let body = serde_json::json!([
            {"op": "replace", "path": "/nameservers", "value": nameservers},
            {"op": "replace", "path": "/action", "value": "apply"},
        ]);
        self.http.patch(&format!("idns/{}", id), &body).await
    }

    async fn get_ntp(&self) -> Result<Option<Ntp>, PlatformError> {
        Ok(first(self.http.get_list("intp", "intps").await?))
    }

    async fn update_ntp(&self, id: &str, ntpservers: &str) -> Result<Ntp, PlatformError> {
        let body = serde_json::json!([
            {"op": "replace", "path": "/ntpservers", "value": ntpservers},
            {"op": "replace", "path": "/action", "value": "apply"},
        ]);
        self.http.patch(&format!("intp/{}", id), &body).await
    }

    async fn get_ptp(&self) -> Result<Option<Ptp>, PlatformError> {
        Ok(first(self.http.get_list("ptp", "ptps").await?))
    }

    async fn update_ptp(&self, id: &str, opts: &PtpOpts) -> Result<Ptp, PlatformError> {
        self.http.patch(&format!("ptp/{}", id), &to_patch(opts)?).await
    }

    async fn get_drbd(&self) -> Result<Option<Drbd>, PlatformError> {
        Ok(first(self.http.get_list("drbdconfig", "drbdconfigs").await?))
    }

    async fn update_drbd(&self, id: &str, link_utilization: i32) -> Result<Drbd, PlatformError> {
        let body = serde_json::json!([
            {"op": "replace", "path": "/link_util", "value": link_utilization.to_string()},
        ]);
        self.http.patch(&format!("drbdconfig/{}", id), &body).await
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>, PlatformError> {
        self.http.get_list("certificate", "certificates").await
    }

    async fn install_certificate(&self, mode: &str, pem: Vec<u8>) -> Result<(), PlatformError> {
        debug!("Installing {} certificate", mode);
        self.http
            .post_file(
                "certificate/certificate_install",
                "certificate.pem",
                pem,
                &[("mode", mode), ("force", "true")],
            )
            .await
            .map(|_| ())
    }

    async fn get_license(&self) -> Result<License, PlatformError> {
        self.http.get("license/get_license_file").await
    }

    async fn install_license(&self, content: Vec<u8>) -> Result<(), PlatformError> {
        self.http
            .post_file("license/install_license", "license.lic", content, &[])
            .await
            .map(|_| ())
    }

    async fn list_service_parameters(&self) -> Result<Vec<ServiceParameter>, PlatformError> {
        self.http.get_list("service_parameter", "parameters").await
    }

    async fn create_service_parameter(&self, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError> {
        let created: serde_json::Value = self.http.post("service_parameter", &serde_json::to_value(opts)?).await?;
        // Creation replies with the created list
        match created.get("parameters").and_then(|p| p.get(0)) {
            Some(item) => Ok(serde_json::from_value(item.clone())?),
            None => Ok(serde_json::from_value(created)?),
        }
    }

    async fn update_service_parameter(&self, id: &str, opts: &ServiceParameterOpts) -> Result<ServiceParameter, PlatformError> {
        self.http.patch(&format!("service_parameter/{}", id), &to_patch(opts)?).await
    }

    async fn list_storage_backends(&self) -> Result<Vec<StorageBackend>, PlatformError> {
        self.http.get_list("storage_backend", "storage_backends").await
    }

    async fn create_storage_backend(&self, opts: &StorageBackendOpts) -> Result<StorageBackend, PlatformError> {
        self.http.post("storage_backend", &serde_json::to_value(opts)?).await
    }

    async fn list_controller_filesystems(&self) -> Result<Vec<ControllerFilesystem>, PlatformError> {
        self.http.get_list("controller_fs", "controller_fs").await
    }

    async fn update_controller_filesystems(&self, system_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError> {
        let body = opts.iter().map(to_patch_strings).collect::<Result<Vec<_>, _>>()?;
        self.http
            .put(&format!("isystems/{}/controller_fs/update_many", system_id), &serde_json::Value::Array(body))
            .await
    }

    // Hosts

    async fn list_hosts(&self) -> Result<Vec<Host>, PlatformError> {
        self.http.get_list("ihosts", "ihosts").await
    }

    async fn get_host(&self, id: &str) -> Result<Host, PlatformError> {
        self.http.get(&format!("ihosts/{}", id)).await
    }

    async fn create_host(&self, opts: &HostOpts) -> Result<Host, PlatformError> {
        self.http.post("ihosts", &serde_json::to_value(opts)?).await
    }

    async fn update_host(&self, id: &str, opts: &HostOpts) -> Result<Host, PlatformError> {
        self.http.patch(&format!("ihosts/{}", id), &to_patch(opts)?).await
    }

    async fn host_action(&self, id: &str, action: HostAction) -> Result<Host, PlatformError> {
        info!("Host {} action {}", id, action);
        let body = serde_json::json!([{"op": "replace", "path": "/action", "value": action.as_str()}]);
        self.http.patch(&format!("ihosts/{}", id), &body).await
    }

    async fn delete_host(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("ihosts/{}", id)).await
    }

    async fn list_labels(&self, host_id: &str) -> Result<Vec<Label>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/labels", host_id), "labels").await
    }

    async fn assign_labels(&self, host_id: &str, labels: &BTreeMap<String, String>) -> Result<(), PlatformError> {
        self.http
            .post_no_content(&format!("labels/{}", host_id), &serde_json::to_value(labels)?)
            .await
    }

    async fn delete_label(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("labels/{}", id)).await
    }

    // Host storage

    async fn list_disks(&self, host_id: &str) -> Result<Vec<Disk>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/idisks", host_id), "idisks").await
    }

    async fn list_partitions(&self, host_id: &str) -> Result<Vec<Partition>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/partitions", host_id), "partitions").await
    }

    async fn create_partition(&self, opts: &PartitionOpts) -> Result<Partition, PlatformError> {
        self.http.post("partitions", &serde_json::to_value(opts)?).await
    }

    async fn list_physical_volumes(&self, host_id: &str) -> Result<Vec<PhysicalVolume>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/ipvs", host_id), "ipvs").await
    }

    async fn create_physical_volume(&self, opts: &PhysicalVolumeOpts) -> Result<PhysicalVolume, PlatformError> {
        self.http.post("ipvs", &serde_json::to_value(opts)?).await
    }

    async fn list_volume_groups(&self, host_id: &str) -> Result<Vec<VolumeGroup>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/ilvgs", host_id), "ilvgs").await
    }

    async fn create_volume_group(&self, opts: &VolumeGroupOpts) -> Result<VolumeGroup, PlatformError> {
        self.http.post("ilvgs", &serde_json::to_value(opts)?).await
    }

    async fn list_osds(&self, host_id: &str) -> Result<Vec<Osd>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/istors", host_id), "istors").await
    }

    async fn create_osd(&self, opts: &OsdOpts) -> Result<Osd, PlatformError> {
        self.http.post("istors", &serde_json::to_value(opts)?).await
    }

    async fn update_osd(&self, id: &str, opts: &OsdOpts) -> Result<Osd, PlatformError> {
        self.http.patch(&format!("istors/{}", id), &to_patch(opts)?).await
    }

    async fn delete_osd(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("istors/{}", id)).await
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, PlatformError> {
        self.http.get_list("clusters", "clusters").await
    }

    async fn list_storage_tiers(&self, cluster_id: &str) -> Result<Vec<StorageTier>, PlatformError> {
        self.http
            .get_list(&format!("clusters/{}/storage_tiers", cluster_id), "storage_tiers")
            .await
    }

    async fn list_ceph_monitors(&self) -> Result<Vec<CephMonitor>, PlatformError> {
        self.http.get_list("ceph_mon", "ceph_mon").await
    }

    async fn create_ceph_monitor(&self, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError> {
        self.http.post("ceph_mon", &serde_json::to_value(opts)?).await
    }

    async fn update_ceph_monitor(&self, id: &str, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError> {
        self.http.patch(&format!("ceph_mon/{}", id), &to_patch(opts)?).await
    }

    async fn list_host_filesystems(&self, host_id: &str) -> Result<Vec<HostFilesystem>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/host_fs", host_id), "host_fs").await
    }

    async fn update_host_filesystems(&self, host_id: &str, opts: &[FileSystemOpts]) -> Result<(), PlatformError> {
        let body = opts.iter().map(to_patch_strings).collect::<Result<Vec<_>, _>>()?;
        self.http
            .put(&format!("ihosts/{}/host_fs/update_many", host_id), &serde_json::Value::Array(body))
            .await
    }

    // Host processors and memory

    async fn list_cpus(&self, host_id: &str) -> Result<Vec<Cpu>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/icpus", host_id), "icpus").await
    }

    async fn update_cpus(&self, host_id: &str, opts: &[CpuOpts]) -> Result<(), PlatformError> {
        self.http
            .put(&format!("ihosts/{}/state/host_cpus_modify", host_id), &serde_json::to_value(opts)?)
            .await
    }

    async fn list_memory(&self, host_id: &str) -> Result<Vec<Memory>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/imemorys", host_id), "imemorys").await
    }

    async fn update_memory(&self, id: &str, opts: &MemoryOpts) -> Result<Memory, PlatformError> {
        self.http.patch(&format!("imemorys/{}", id), &to_patch_strings(opts)?).await
    }

    // Host networking

    async fn list_ports(&self, host_id: &str) -> Result<Vec<Port>, PlatformError> {
        self.http
            .get_list(&format!("ihosts/{}/ethernet_ports", host_id), "ethernet_ports")
            .await
    }

    async fn list_interfaces(&self, host_id: &str) -> Result<Vec<Interface>, PlatformError> {
        self.http
            .get_list(&format!("ihosts/{}/iinterfaces", host_id), "iinterfaces")
            .await
    }

    async fn create_interface(&self, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
        self.http.post("iinterfaces", &serde_json::to_value(opts)?).await
    }

    async fn update_interface(&self, id: &str, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
        self.http.patch(&format!("iinterfaces/{}", id), &to_patch(opts)?).await
    }

    async fn delete_interface(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("iinterfaces/{}", id)).await
    }

    async fn list_interface_networks(&self, host_id: &str) -> Result<Vec<InterfaceNetwork>, PlatformError> {
        self.http
            .get_list(&format!("ihosts/{}/interface_networks", host_id), "interface_networks")
            .await
    }

    async fn create_interface_network(&self, opts: &InterfaceNetworkOpts) -> Result<InterfaceNetwork, PlatformError> {
        self.http.post("interface_networks", &serde_json::to_value(opts)?).await
    }

    async fn delete_interface_network(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("interface_networks/{}", id)).await
    }

    async fn list_interface_datanetworks(&self, host_id: &str) -> Result<Vec<InterfaceDataNetwork>, PlatformError> {
        self.http
            .get_list(&format!("ihosts/{}/interface_datanetworks", host_id), "interface_datanetworks")
            .await
    }

    async fn create_interface_datanetwork(&self, opts: &InterfaceDataNetworkOpts) -> Result<InterfaceDataNetwork, PlatformError> {
        self.http.post("interface_datanetworks", &serde_json::to_value(opts)?).await
    }

    async fn delete_interface_datanetwork(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("interface_datanetworks/{}", id)).await
    }

    async fn list_addresses(&self, host_id: &str) -> Result<Vec<Address>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/addresses", host_id), "addresses").await
    }

    async fn create_address(&self, opts: &AddressOpts) -> Result<Address, PlatformError> {
        self.http.post("addresses", &serde_json::to_value(opts)?).await
    }

    async fn delete_address(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("addresses/{}", id)).await
    }

    async fn list_routes(&self, host_id: &str) -> Result<Vec<Route>, PlatformError> {
        self.http.get_list(&format!("ihosts/{}/routes", host_id), "routes").await
    }

    async fn create_route(&self, opts: &RouteOpts) -> Result<Route, PlatformError> {
        self.http.post("routes", &serde_json::to_value(opts)?).await
    }

    async fn delete_route(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("routes/{}", id)).await
    }

    // Platform networks

    async fn list_address_pools(&self) -> Result<Vec<AddressPool>, PlatformError> {
        self.http.get_list("addrpools", "addrpools").await
    }

    async fn create_address_pool(&self, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError> {
        self.http.post("addrpools", &serde_json::to_value(opts)?).await
    }

    async fn update_address_pool(&self, id: &str, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError> {
        // Ranges travel as a nested list, which the list flattening would mangle
        let mut ops = to_patch(&AddressPoolOpts { ranges: None, ..opts.clone() })?;
        if let (Some(ranges), serde_json::Value::Array(list)) = (&opts.ranges, &mut ops) {
            list.push(serde_json::json!({"op": "replace", "path": "/ranges", "value": ranges}));
        }
        self.http.patch(&format!("addrpools/{}", id), &ops).await
    }

    async fn delete_address_pool(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("addrpools/{}", id)).await
    }

    async fn list_networks(&self) -> Result<Vec<Network>, PlatformError> {
        self.http.get_list("networks", "networks").await
    }

    async fn create_network(&self, opts: &NetworkOpts) -> Result<Network, PlatformError> {
        self.http.post("networks", &serde_json::to_value(opts)?).await
    }

    async fn delete_network(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("networks/{}", id)).await
    }

    // Data networks

    async fn list_data_networks(&self) -> Result<Vec<DataNetwork>, PlatformError> {
        self.http.get_list("datanetworks", "datanetworks").await
    }

    async fn create_data_network(&self, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError> {
        self.http.post("datanetworks", &serde_json::to_value(opts)?).await
    }

    async fn update_data_network(&self, id: &str, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError> {
        self.http.patch(&format!("datanetworks/{}", id), &to_patch(opts)?).await
    }

    async fn delete_data_network(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("datanetworks/{}", id)).await
    }

    // PTP instances and interfaces

    async fn list_ptp_instances(&self) -> Result<Vec<PtpInstance>, PlatformError> {
        self.http.get_list("ptp_instances", "ptp_instances").await
    }

    async fn create_ptp_instance(&self, opts: &PtpOwnerOpts) -> Result<PtpInstance, PlatformError> {
        self.http.post("ptp_instances", &serde_json::to_value(opts)?).await
    }

    async fn update_ptp_instance_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInstance, PlatformError> {
        self.ptp_parameters(&format!("ptp_instances/{}", id), add, remove).await
    }

    async fn delete_ptp_instance(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("ptp_instances/{}", id)).await
    }

    async fn list_ptp_interfaces(&self) -> Result<Vec<PtpInterface>, PlatformError> {
        self.http.get_list("ptp_interfaces", "ptp_interfaces").await
    }

    async fn create_ptp_interface(&self, opts: &PtpOwnerOpts) -> Result<PtpInterface, PlatformError> {
        self.http.post("ptp_interfaces", &serde_json::to_value(opts)?).await
    }

    async fn update_ptp_interface_parameters(&self, id: &str, add: &[String], remove: &[String]) -> Result<PtpInterface, PlatformError> {
        self.ptp_parameters(&format!("ptp_interfaces/{}", id), add, remove).await
    }

    async fn delete_ptp_interface(&self, id: &str) -> Result<(), PlatformError> {
        self.http.delete(&format!("ptp_interfaces/{}", id)).await
    }
}
