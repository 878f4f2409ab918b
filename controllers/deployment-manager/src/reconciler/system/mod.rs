//! System reconciler
//!
//! The System is reconciled first in every namespace. It builds the platform
//! client from the `system-endpoint` secret, applies the platform-wide
//! configuration and then flags the system as ready, which releases every
//! other reconciler in the namespace.
//!
//! On the first pass the live configuration is captured into
//! `status.defaults`; the effective spec is always those defaults with the
//! user's spec merged on top.

pub(crate) mod certificates;
pub(crate) mod filesystems;


use super::{Reconcile, Reconciler, SyncState};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_UPDATED};
use async_trait::async_trait;
use crds::merge::{equal, merged};
use crds::{
    ControllerFileSystemInfo, DrbdConfiguration, PtpInfo, ServiceParameterInfo, StorageBackend, System, SystemSpec,
    SystemStorageInfo, SYSTEM_ENDPOINT_SECRET,
};
use kube::ResourceExt;
use platform_client::{
    Credentials, PlatformClientTrait, Ptp, PtpOpts, ServiceParameter, ServiceParameterOpts, StorageBackendOpts,
    SystemOpts, SystemRecord, CLEAR_SERVERS_SENTINEL,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ceph backend type
const BACKEND_CEPH: &str = "ceph";
/// Network a ceph backend is attached to unless the object names one
const CEPH_DEFAULT_NETWORK: &str = "mgmt";

#[async_trait]
impl Reconcile for System {
    const TOGGLE: &'static str = names::SYSTEM;
    const NEEDS_PLATFORM: bool = false;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_system(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.release_system(self);
        Ok(())
    }
}

/// Comma separated server list, or the clear sentinel for an empty list.
pub(crate) fn server_list(servers: &[String]) -> String {
    if servers.is_empty() {
        CLEAR_SERVERS_SENTINEL.to_string()
    } else {
        servers.join(",")
    }
}

/// Value to send when the desired server list differs from `current`.
pub(crate) fn servers_update(desired: Option<&Vec<String>>, current: &str) -> Option<String> {
    let value = server_list(desired?);
    let changed = if value == CLEAR_SERVERS_SENTINEL {
        !current.is_empty()
    } else {
        value != current
    };
    changed.then_some(value)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Attribute changes needed on the system record.
pub(crate) fn system_update(name: &str, spec: &SystemSpec, record: &SystemRecord) -> Option<SystemOpts> {
    fn differs(desired: Option<&String>, current: Option<&String>) -> Option<String> {
        desired
            .filter(|d| current.is_none_or(|c| c != *d))
            .cloned()
    }

    let https = spec.https_enabled();
    let opts = SystemOpts {
        name: (record.name != name).then(|| name.to_string()),
        description: differs(spec.description.as_ref(), record.description.as_ref()),
        location: differs(spec.location.as_ref(), record.location.as_ref()),
        latitude: differs(spec.latitude.as_ref(), record.latitude.as_ref()),
        longitude: differs(spec.longitude.as_ref(), record.longitude.as_ref()),
        contact: differs(spec.contact.as_ref(), record.contact.as_ref()),
        https_enabled: (https != record.capabilities.https_enabled).then(|| https.to_string()),
        vswitch_type: differs(spec.vswitch_type.as_ref(), record.capabilities.vswitch_type.as_ref()),
    };
    (opts != SystemOpts::default()).then_some(opts)
}

/// PTP fields that differ from the platform.
pub(crate) fn ptp_update(desired: &PtpInfo, current: &Ptp) -> Option<PtpOpts> {
    let field = |want: &Option<String>, have: &str| want.as_ref().filter(|w| w.as_str() != have).cloned();
    let opts = PtpOpts {
        mode: field(&desired.mode, &current.mode),
        transport: field(&desired.transport, &current.transport),
        mechanism: field(&desired.mechanism, &current.mechanism),
    };
    (opts != PtpOpts::default()).then_some(opts)
}

/// Changes needed on an existing service parameter. Personality and
/// resource are only compared when both sides carry one.
pub(crate) fn service_parameter_update(
    desired: &ServiceParameterInfo,
    current: &ServiceParameter,
) -> Option<ServiceParameterOpts> {
    let both_differ = |want: &Option<String>, have: &Option<String>| match (want, have) {
        (Some(w), Some(h)) if w != h => Some(w.clone()),
        _ => None,
    };
    let opts = ServiceParameterOpts {
        value: (desired.paramvalue != current.value).then(|| desired.paramvalue.clone()),
        personality: both_differ(&desired.personality, &current.personality),
        resource: both_differ(&desired.resource, &current.resource),
        ..Default::default()
    };
    (opts != ServiceParameterOpts::default()).then_some(opts)
}

/// Create request for a storage backend missing from the platform.
pub(crate) fn backend_create(backend: &StorageBackend) -> StorageBackendOpts {
    let network = backend
        .network
        .clone()
        .or_else(|| (backend.backend_type == BACKEND_CEPH).then(|| CEPH_DEFAULT_NETWORK.to_string()));
    StorageBackendOpts {
        confirmed: true,
        backend: backend.backend_type.clone(),
        name: backend.name.clone(),
        services: backend.services.as_ref().map(|s| s.join(",")),
        network,
        capabilities: backend
            .replication_factor
            .map(|n| BTreeMap::from([("replication".to_string(), n.to_string())])),
    }
}

/// Spec describing the live platform configuration. Certificates and the
/// licence cannot be read back and are left out.
pub(crate) async fn live_spec(client: &dyn PlatformClientTrait, record: &SystemRecord) -> Result<SystemSpec> {
    let mut spec = SystemSpec {
        description: non_empty(record.description.as_ref()),
        location: non_empty(record.location.as_ref()),
        latitude: non_empty(record.latitude.as_ref()),
        longitude: non_empty(record.longitude.as_ref()),
        contact: non_empty(record.contact.as_ref()),
        vswitch_type: non_empty(record.capabilities.vswitch_type.as_ref()),
        ..Default::default()
    };

    spec.dns_servers = client.get_dns().await?.map(|dns| split_list(&dns.nameservers));
    spec.ntp_servers = client.get_ntp().await?.map(|ntp| split_list(&ntp.ntpservers));
    spec.ptp = client.get_ptp().await?.map(|ptp| PtpInfo {
        mode: Some(ptp.mode),
        transport: Some(ptp.transport),
        mechanism: Some(ptp.mechanism),
    });

    let parameters = client.list_service_parameters().await?;
    if !parameters.is_empty() {
        spec.service_parameters = Some(
            parameters
                .into_iter()
                .map(|p| ServiceParameterInfo {
                    service: p.service,
                    section: p.section,
                    paramname: p.name,
                    paramvalue: p.value,
                    personality: p.personality,
                    resource: p.resource,
                })
                .collect(),
        );
    }

    let mut storage = SystemStorageInfo {
        drbd: client.get_drbd().await?.map(|drbd| DrbdConfiguration {
            link_utilization: drbd.link_utilization,
        }),
        ..Default::default()
    };
    let backends = client.list_storage_backends().await?;
    if !backends.is_empty() {
        storage.backends = Some(
            backends
                .into_iter()
                .map(|b| StorageBackend {
                    name: b.name,
                    backend_type: b.backend,
                    services: b.services.as_deref().map(split_list),
                    replication_factor: b.replication,
                    ..Default::default()
                })
                .collect(),
        );
    }
    let filesystems = client.list_controller_filesystems().await?;
    if !filesystems.is_empty() {
        storage.filesystems = Some(
            filesystems
                .into_iter()
                .map(|fs| ControllerFileSystemInfo { name: fs.name, size: fs.size })
                .collect(),
        );
    }
    if storage != SystemStorageInfo::default() {
        spec.storage = Some(storage);
    }

    Ok(spec)
}

/// Projection of a spec onto what can be compared with the live state.
fn comparable(spec: &SystemSpec) -> SystemSpec {
    let mut spec = spec.clone();
    spec.certificates = None;
    spec.license = None;
    spec.https_enabled = None;
    if let Some(storage) = spec.storage.as_mut() {
        for backend in storage.backends.iter_mut().flatten() {
            backend.network = None;
            backend.partition_size = None;
        }
    }
    spec
}

impl Reconciler {
    pub async fn reconcile_system(&self, system: &System) -> Result<()> {
        let anchors = self.install_root_certificates(system).await?;
        let client = self.system_client(system, &anchors).await?;

        let status = system.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_system(client.as_ref(), system, previous.reconciled, &mut fields)
            .await;
        let status_result = self.sync_status(system, previous, result.is_ok(), fields).await;
        result.and(status_result)
    }

    /// Namespace client, built from the endpoint secret when absent.
    async fn system_client(&self, system: &System, anchors: &[Vec<u8>]) -> Result<Arc<dyn PlatformClientTrait>> {
        let namespace = system.namespace().unwrap_or_default();
        if let Some(client) = self.manager.client(&namespace) {
            return Ok(client);
        }

        let data = self.secret(system, SYSTEM_ENDPOINT_SECRET).await?;
        let values: BTreeMap<String, String> = data
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
            .collect();
        let credentials = Credentials::from_map(&values)
            .map_err(|e| ControllerError::UserData(format!("secret {}: {}", SYSTEM_ENDPOINT_SECRET, e)))?;
        let client = self.manager.build_client(&namespace, &credentials, anchors).await?;

        if self.manager.is_system_ready(&namespace) {
            // Refreshing a client after a transport failure; release the
            // waiting reconcilers without waiting for a full pass.
            self.manager.notify_dependents(&namespace).await?;
        }
        Ok(client)
    }

    async fn sync_system(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        reconciled: bool,
        fields: &mut Map<String, Value>,
    ) -> Result<()> {
        let namespace = system.namespace().unwrap_or_default();
        let record = client.get_system().await?;
        fields.insert("id".to_string(), json!(record.id));
        fields.insert("systemType".to_string(), json!(record.system_type));
        fields.insert("systemMode".to_string(), json!(record.system_mode));
        fields.insert("softwareVersion".to_string(), json!(record.software_version));
        self.manager
            .set_system_info(&namespace, &record.system_type, &record.system_mode);

        let live = live_spec(client, &record).await?;
        let defaults = match system.defaults()? {
            Some(defaults) => defaults,
            None => {
                fields.insert("defaults".to_string(), json!(serde_json::to_string(&live)?));
                events::normal(self.store(), system, REASON_UPDATED, "system defaults collected").await;
                live.clone()
            }
        };
        let desired = merged(&defaults, &system.spec);

        if reconciled {
            self.mark_system_ready(&namespace).await?;
            if equal(&comparable(&desired), &comparable(&live)) {
                debug!("System {} matches the platform configuration", system.name_any());
                return Ok(());
            }
            self.allow_change(system, names::SYSTEM, reconciled, false)?;
        }

        let record = self.reconcile_system_attributes(client, system, &desired, record).await?;
        // Certificates go early so that HTTPS is in place for what follows
        self.reconcile_certificates(client, system, &desired, &record).await?;
        self.reconcile_license(client, system, &desired).await?;
        self.reconcile_drbd(client, system, &desired).await?;
        self.reconcile_dns(client, system, &desired).await?;
        self.reconcile_ntp(client, system, &desired).await?;
        self.reconcile_ptp(client, system, &desired).await?;
        self.reconcile_service_parameters(client, system, &desired).await?;
        self.reconcile_storage_backends(client, system, &desired).await?;

        self.mark_system_ready(&namespace).await?;

        self.reconcile_controller_filesystems(client, system, &desired, &record).await?;
        events::normal(self.store(), system, REASON_UPDATED, "system has been provisioned").await;
        Ok(())
    }

    /// Flag the system ready and wake the reconcilers waiting on it.
    async fn mark_system_ready(&self, namespace: &str) -> Result<()> {
        if self.manager.is_system_ready(namespace) {
            return Ok(());
        }

        info!("System in namespace {} is ready", namespace);
        self.manager.set_system_ready(namespace, true);
        if let Err(e) = self.manager.notify_dependents(namespace).await {
            self.manager.set_system_ready(namespace, false);
            return Err(e);
        }
        Ok(())
    }

    /// Pause the namespace once its System is gone.
    pub fn release_system(&self, system: &System) {
        let namespace = system.namespace().unwrap_or_default();
        info!("System {} deleted, pausing reconcilers in {}", system.name_any(), namespace);
        self.manager.set_system_ready(&namespace, false);
    }

    async fn reconcile_system_attributes(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
        record: SystemRecord,
    ) -> Result<SystemRecord> {
        let Some(opts) = system_update(&system.name_any(), spec, &record) else {
            return Ok(record);
        };

        info!("Updating system attributes: {:?}", opts);
        let updated = client.update_system(&record.id, &opts).await?;
        events::normal(self.store(), system, REASON_UPDATED, "system has been updated").await;
        Ok(updated)
    }

    async fn reconcile_drbd(&self, client: &dyn PlatformClientTrait, system: &System, spec: &SystemSpec) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_DRBD) {
            return Ok(());
        }
        let Some(desired) = spec.storage.as_ref().and_then(|s| s.drbd.as_ref()) else {
            return Ok(());
        };

        let current = client
            .get_drbd()
            .await?
            .ok_or_else(|| ControllerError::MissingSystemResource("drbd configuration".to_string()))?;
        if current.link_utilization == desired.link_utilization {
            return Ok(());
        }

        info!("Updating DRBD link utilization to {}", desired.link_utilization);
        client.update_drbd(&current.id, desired.link_utilization).await?;
        events::normal(self.store(), system, REASON_UPDATED, "drbd configuration has been updated").await;
        Ok(())
    }

    async fn reconcile_dns(&self, client: &dyn PlatformClientTrait, system: &System, spec: &SystemSpec) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_DNS) || spec.dns_servers.is_none() {
            return Ok(());
        }

        let current = client
            .get_dns()
            .await?
            .ok_or_else(|| ControllerError::MissingSystemResource("dns configuration".to_string()))?;
        let Some(nameservers) = servers_update(spec.dns_servers.as_ref(), &current.nameservers) else {
            return Ok(());
        };

        info!("Updating DNS servers to {}", nameservers);
        client.update_dns(&current.id, &nameservers).await?;
        events::normal(self.store(), system, REASON_UPDATED, "dns servers have been updated").await;
        Ok(())
    }

    async fn reconcile_ntp(&self, client: &dyn PlatformClientTrait, system: &System, spec: &SystemSpec) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_NTP) || spec.ntp_servers.is_none() {
            return Ok(());
        }

        let current = client
            .get_ntp()
            .await?
            .ok_or_else(|| ControllerError::MissingSystemResource("ntp configuration".to_string()))?;
        let Some(ntpservers) = servers_update(spec.ntp_servers.as_ref(), &current.ntpservers) else {
            return Ok(());
        };

        info!("Updating NTP servers to {}", ntpservers);
        client.update_ntp(&current.id, &ntpservers).await?;
        events::normal(self.store(), system, REASON_UPDATED, "ntp servers have been updated").await;
        Ok(())
    }

    async fn reconcile_ptp(&self, client: &dyn PlatformClientTrait, system: &System, spec: &SystemSpec) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_PTP) {
            return Ok(());
        }
        let Some(desired) = spec.ptp.as_ref() else {
            return Ok(());
        };

        let current = client
            .get_ptp()
            .await?
            .ok_or_else(|| ControllerError::MissingSystemResource("ptp configuration".to_string()))?;
        let Some(opts) = ptp_update(desired, &current) else {
            return Ok(());
        };

        info!("Updating PTP configuration: {:?}", opts);
        client.update_ptp(&current.id, &opts).await?;
        events::normal(self.store(), system, REASON_UPDATED, "ptp configuration has been updated").await;
        Ok(())
    }

    /// Create or update the listed service parameters. Parameters missing
    /// from the list are left alone since the platform ships its own.
    async fn reconcile_service_parameters(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
    ) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_SERVICE_PARAMETERS) {
            return Ok(());
        }
        let Some(desired) = spec.service_parameters.as_ref() else {
            return Ok(());
        };

        let current = client.list_service_parameters().await?;
        for parameter in desired {
            let existing = current.iter().find(|c| {
                c.service == parameter.service && c.section == parameter.section && c.name == parameter.paramname
            });

            match existing {
                Some(existing) => {
                    let Some(opts) = service_parameter_update(parameter, existing) else {
                        continue;
                    };
                    client.update_service_parameter(&existing.id, &opts).await?;
                    events::normal(
                        self.store(),
                        system,
                        REASON_UPDATED,
                        format!(
                            "service parameter {:?} {:?} {:?} has been modified",
                            parameter.service, parameter.section, parameter.paramname
                        ),
                    )
                    .await;
                }
                None => {
                    let opts = ServiceParameterOpts {
                        service: Some(parameter.service.clone()),
                        section: Some(parameter.section.clone()),
                        parameters: Some(BTreeMap::from([(
                            parameter.paramname.clone(),
                            parameter.paramvalue.clone(),
                        )])),
                        personality: parameter.personality.clone(),
                        resource: parameter.resource.clone(),
                        ..Default::default()
                    };
                    client.create_service_parameter(&opts).await?;
                    events::normal(
                        self.store(),
                        system,
                        REASON_CREATED,
                        format!(
                            "service parameter {:?} {:?} {:?} has been created",
                            parameter.service, parameter.section, parameter.paramname
                        ),
                    )
                    .await;
                }
            }
        }
        Ok(())
    }

    /// Create the storage backends missing from the platform. Existing
    /// backends are never modified.
    async fn reconcile_storage_backends(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
    ) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_STORAGE_BACKEND) {
            return Ok(());
        }
        let Some(desired) = spec.storage.as_ref().and_then(|s| s.backends.as_ref()) else {
            return Ok(());
        };

        let current = client.list_storage_backends().await?;
        for backend in desired {
            if current
                .iter()
                .any(|c| c.backend == backend.backend_type && c.name == backend.name)
            {
                continue;
            }

            let opts = backend_create(backend);
            info!("Creating {} storage backend {}", opts.backend, opts.name);
            let created = client.create_storage_backend(&opts).await?;
            events::normal(
                self.store(),
                system,
                REASON_CREATED,
                format!("{} storage backend created", created.name),
            )
            .await;
        }
        Ok(())
    }
}
