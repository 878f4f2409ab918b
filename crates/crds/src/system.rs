//! System CRD
//!
//! Platform-wide configuration: identity, time and name services, TLS
//! certificates, licence, service parameters and storage. At most one System
//! exists per namespace.

use crate::merge::{
    Keyed, Merge, Normalize, merge_keyed_list, merge_list, merge_struct, merge_value,
    normalize_keyed_list,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platform (HTTPS endpoint) certificate
pub const CERT_PLATFORM: &str = "ssl";
/// Platform trusted CA certificate
pub const CERT_PLATFORM_CA: &str = "ssl_ca";
/// Openstack endpoint certificate
pub const CERT_OPENSTACK: &str = "openstack";
/// Openstack trusted CA certificate
pub const CERT_OPENSTACK_CA: &str = "openstack_ca";
/// Docker registry certificate
pub const CERT_DOCKER_REGISTRY: &str = "docker_registry";
/// TPM mode certificate
pub const CERT_TPM: &str = "tpm_mode";

/// Secret key holding the public certificate
pub const SECRET_CERT_KEY: &str = "tls.crt";
/// Secret key holding the private key
pub const SECRET_PRIVATE_KEY_KEY: &str = "tls.key";
/// Secret key holding the issuing CA certificate
pub const SECRET_CA_CERT_KEY: &str = "ca.crt";
/// Secret key holding the licence file
pub const SECRET_LICENSE_CONTENT_KEY: &str = "content";

/// A certificate to install through the platform API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Intended usage (ssl, ssl_ca, openstack, openstack_ca, docker_registry, tpm_mode)
    #[serde(rename = "type")]
    pub cert_type: String,

    /// Name of a TLS secret carrying `tls.crt`, and `tls.key`/`ca.crt` where
    /// the certificate type needs them
    pub secret: String,
}

impl CertificateInfo {
    /// CA-only certificate types install without a private key.
    #[must_use]
    pub fn private_key_expected(&self) -> bool {
        self.cert_type != CERT_PLATFORM_CA && self.cert_type != CERT_OPENSTACK_CA
    }
}

impl Keyed for CertificateInfo {
    type Key = (String, String);
    fn key(&self) -> (String, String) {
        (self.cert_type.clone(), self.secret.clone())
    }
}

impl Merge for CertificateInfo {
    fn merge(&mut self, _src: &Self) {}
}

impl Normalize for CertificateInfo {
    fn normalize(&mut self) {}
}

/// Licence secret reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    /// Name of a secret carrying the licence under `content`
    pub secret: String,
}

/// A platform service parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceParameterInfo {
    /// Service name
    pub service: String,
    /// Section within the service
    pub section: String,
    /// Parameter name
    pub paramname: String,
    /// Parameter value
    pub paramvalue: String,
    /// Restrict the parameter to a personality
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    /// Puppet resource the parameter maps to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Keyed for ServiceParameterInfo {
    type Key = (String, String, String);
    fn key(&self) -> (String, String, String) {
        (self.service.clone(), self.section.clone(), self.paramname.clone())
    }
}

impl Merge for ServiceParameterInfo {
    fn merge(&mut self, src: &Self) {
        self.paramvalue.clone_from(&src.paramvalue);
        merge_value(&mut self.personality, &src.personality);
        merge_value(&mut self.resource, &src.resource);
    }
}

impl Normalize for ServiceParameterInfo {
    fn normalize(&mut self) {}
}

/// A storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBackend {
    /// Backend name
    pub name: String,
    /// Backend type (file, lvm, ceph, ceph-rook)
    #[serde(rename = "type")]
    pub backend_type: String,
    /// Services enabled on the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    /// Replication factor (ceph only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<i32>,
    /// Partition size in GiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<i32>,
    /// Network type associated with this backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl Keyed for StorageBackend {
    type Key = String;
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Merge for StorageBackend {
    fn merge(&mut self, src: &Self) {
        self.backend_type.clone_from(&src.backend_type);
        merge_list(&mut self.services, &src.services);
        merge_value(&mut self.replication_factor, &src.replication_factor);
        merge_value(&mut self.partition_size, &src.partition_size);
        merge_value(&mut self.network, &src.network);
    }
}

impl Normalize for StorageBackend {
    fn normalize(&mut self) {
        if let Some(services) = self.services.as_mut() {
            services.sort();
        }
    }
}

/// DRBD tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrbdConfiguration {
    /// Percentage of link bandwidth usable for synchronisation
    pub link_utilization: i32,
}

impl Merge for DrbdConfiguration {
    fn merge(&mut self, src: &Self) {
        self.link_utilization = src.link_utilization;
    }
}

/// Controller filesystem size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControllerFileSystemInfo {
    /// Filesystem name
    pub name: String,
    /// Size in GiB
    pub size: i32,
}

impl Keyed for ControllerFileSystemInfo {
    type Key = String;
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Merge for ControllerFileSystemInfo {
    fn merge(&mut self, src: &Self) {
        self.size = src.size;
    }
}

impl Normalize for ControllerFileSystemInfo {
    fn normalize(&mut self) {}
}

/// System storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStorageInfo {
    /// Storage backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<StorageBackend>>,
    /// DRBD tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drbd: Option<DrbdConfiguration>,
    /// Controller filesystems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystems: Option<Vec<ControllerFileSystemInfo>>,
}

impl Merge for SystemStorageInfo {
    fn merge(&mut self, src: &Self) {
        merge_keyed_list(&mut self.backends, &src.backends);
        merge_struct(&mut self.drbd, &src.drbd);
        merge_keyed_list(&mut self.filesystems, &src.filesystems);
    }
}

/// PTP configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PtpInfo {
    /// Time stamping mode (hardware, software, legacy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Transport (l2, udp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Delay mechanism (e2e, p2p)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

impl Merge for PtpInfo {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.mode, &src.mode);
        merge_value(&mut self.transport, &src.transport);
        merge_value(&mut self.mechanism, &src.mechanism);
    }
}

/// Desired platform-wide configuration.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "System",
    namespaced,
    status = "SystemStatus",
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".status.systemMode"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Physical location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Latitude of the installation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,

    /// Longitude of the installation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,

    /// Administrative contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// DNS servers; an empty list clears the configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_servers: Option<Vec<String>>,

    /// NTP servers; an empty list clears the configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_servers: Option<Vec<String>>,

    /// PTP configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptp: Option<PtpInfo>,

    /// Certificates to install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateInfo>>,

    /// Licence to install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseInfo>,

    /// Service parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_parameters: Option<Vec<ServiceParameterInfo>>,

    /// Storage configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<SystemStorageInfo>,

    /// vSwitch implementation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vswitch_type: Option<String>,

    /// Whether the platform API should be served over HTTPS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_enabled: Option<bool>,
}

impl SystemSpec {
    /// HTTPS enablement, defaulting to the presence of a platform certificate.
    #[must_use]
    pub fn https_enabled(&self) -> bool {
        self.https_enabled.unwrap_or_else(|| {
            self.certificates
                .iter()
                .flatten()
                .any(|c| c.cert_type == CERT_PLATFORM)
        })
    }
}

impl Merge for SystemSpec {
    fn merge(&mut self, src: &Self) {
        merge_value(&mut self.description, &src.description);
        merge_value(&mut self.location, &src.location);
        merge_value(&mut self.latitude, &src.latitude);
        merge_value(&mut self.longitude, &src.longitude);
        merge_value(&mut self.contact, &src.contact);
        merge_list(&mut self.dns_servers, &src.dns_servers);
        merge_list(&mut self.ntp_servers, &src.ntp_servers);
        merge_struct(&mut self.ptp, &src.ptp);
        merge_keyed_list(&mut self.certificates, &src.certificates);
        merge_value(&mut self.license, &src.license);
        merge_keyed_list(&mut self.service_parameters, &src.service_parameters);
        merge_struct(&mut self.storage, &src.storage);
        merge_value(&mut self.vswitch_type, &src.vswitch_type);
        merge_value(&mut self.https_enabled, &src.https_enabled);
    }
}

impl Normalize for SystemSpec {
    fn normalize(&mut self) {
        normalize_keyed_list(&mut self.certificates);
        normalize_keyed_list(&mut self.service_parameters);
        if let Some(storage) = self.storage.as_mut() {
            normalize_keyed_list(&mut storage.backends);
            normalize_keyed_list(&mut storage.filesystems);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed platform-wide state.
pub struct SystemStatus {
    /// Platform-assigned system UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// System type (All-in-one, Standard)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,

    /// System mode (simplex, duplex, duplex-direct)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_mode: Option<String>,

    /// Installed software version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,

    /// Whether the platform matched the declared state on the last pass
    #[serde(default)]
    pub in_sync: bool,

    /// Whether the system has ever been in sync
    #[serde(default)]
    pub reconciled: bool,

    /// JSON snapshot of the configuration captured on first reconcile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<String>,
}

impl System {
    /// Parsed defaults snapshot, when one has been captured.
    ///
    /// # Errors
    ///
    /// Returns an error when the stored snapshot is not a valid spec.
    pub fn defaults(&self) -> Result<Option<SystemSpec>, crate::CrdError> {
        match self.status.as_ref().and_then(|s| s.defaults.as_deref()) {
            Some(raw) if !raw.is_empty() => Ok(Some(serde_json::from_str(raw)?)),
            _ => Ok(None),
        }
    }
}
