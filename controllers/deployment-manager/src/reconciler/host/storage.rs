//! Ceph monitor, LVM, OSD and host filesystem provisioning

use super::defaults::{strip_partition_number, LiveHost};
use super::diff::osd_provisioning_state;
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use crate::monitor::{
    ClusterDeploymentModel, ClusterPresence, HostState, HostStateSelector, PartitionReady, StorageMonitorCount,
    StorageTier,
};
use crate::reconciler::Reconciler;
use crds::{Host, HostProfileSpec, OsdInfo, PhysicalVolumeInfo, ProfileStorageInfo, VolumeGroupInfo};
use kube::ResourceExt;
use platform_client::{
    CephMonitorOpts, Disk, FileSystemOpts, Osd, OsdOpts, Partition, PartitionOpts, PhysicalVolume,
    PhysicalVolumeOpts, PlatformClientTrait, VolumeGroupCapabilities, VolumeGroupOpts, CEPH_MONITOR_CONFIGURED,
    DEPLOYMENT_MODEL_CONTROLLER, DEPLOYMENT_MODEL_STORAGE, DEPLOYMENT_MODEL_UNDEFINED, OSD_FUNCTION_JOURNAL, OSD_FUNCTION_OSD,
    OSD_MINIMUM_MONITOR_COUNT, PARTITION_GUID_LVM, PARTITION_TYPE_LVM, PERSONALITY_WORKER, PV_TYPE_PARTITION,
    STORAGE_TIER_NAME, SYSTEM_TYPE_STANDARD,
};
use tracing::info;

const MIB_PER_GIB: i32 = 1024;

/// Partition backing a declared partition volume: same disk, same size and
/// either free or already in `group`.
pub(crate) fn find_partition<'a>(live: &'a LiveHost, path: &str, size: i32, group: &str) -> Option<&'a Partition> {
    live.partitions.iter().find(|p| {
        strip_partition_number(&p.device_path) == path
            && p.gibibytes() == size
            && p.physical_volume_id.as_deref().is_none_or(|pv| {
                live.physical_volumes
                    .iter()
                    .any(|v| v.id == pv && v.volume_group_name == group)
            })
    })
}

pub(crate) fn find_physical_volume<'a>(
    live: &'a LiveHost,
    group: &str,
    info: &PhysicalVolumeInfo,
) -> Option<&'a PhysicalVolume> {
    live.physical_volumes
        .iter()
        .filter(|pv| pv.volume_group_name == group && pv.pv_type == info.pv_type)
        .find(|pv| {
            live.pv_path(pv).is_ok_and(|(path, size)| {
                path == info.path && (info.pv_type != PV_TYPE_PARTITION || size == info.size)
            })
        })
}

pub(crate) fn find_osd<'a>(live: &'a LiveHost, path: &str) -> Option<&'a Osd> {
    let disk = live.disk_by_path(path)?;
    live.osds.iter().find(|o| o.disk_id == disk.id)
}

/// OSDs to delete: gone from the profile, or changed in a way the platform
/// cannot update in place.
pub(crate) fn stale_osds<'a>(live: &'a LiveHost, declared: &[OsdInfo]) -> Vec<&'a Osd> {
    live.osds
        .iter()
        .filter(|osd| {
            let Some(info) = live
                .disk(&osd.disk_id)
                .and_then(|disk| declared.iter().find(|i| i.path == disk.device_path))
            else {
                return true;
            };
            if osd.function != info.function {
                return true;
            }
            // Dropping an external journal means recreating the OSD
            info.journal.is_none() && osd.journal_location.as_ref().is_some_and(|l| *l != osd.id)
        })
        .collect()
}

/// Journal changes of an existing OSD.
pub(crate) fn osd_update(info: &OsdInfo, osd: &Osd) -> Option<OsdOpts> {
    let journal = info.journal.as_ref()?;
    if osd.journal_location.is_none() {
        return Some(OsdOpts {
            journal_location: Some(journal.location.clone()),
            journal_size_mib: Some(journal.size * MIB_PER_GIB),
            ..Default::default()
        });
    }
    (osd.journal_gibibytes() != Some(journal.size)).then(|| OsdOpts {
        journal_size_mib: Some(journal.size * MIB_PER_GIB),
        ..Default::default()
    })
}

fn osd_create_opts(live: &LiveHost, info: &OsdInfo) -> Result<OsdOpts> {
    let disk: &Disk = live.disk_by_path(&info.path).ok_or_else(|| {
        ControllerError::MissingSystemResource(format!("unable to find disk for path: {}", info.path))
    })?;

    let mut opts = OsdOpts {
        host_id: Some(live.id().to_string()),
        disk_id: Some(disk.id.clone()),
        function: Some(info.function.clone()),
        ..Default::default()
    };

    if let Some(journal) = &info.journal {
        let target = find_osd(live, &journal.location).ok_or_else(|| {
            ControllerError::MissingSystemResource(format!(
                "unable to find journal OSD with path: {}",
                journal.location
            ))
        })?;
        if target.function != OSD_FUNCTION_JOURNAL {
            return Err(ControllerError::UserData(format!(
                "OSD on disk {} is not a journal OSD",
                target.disk_id
            )));
        }
        opts.journal_location = Some(target.id.clone());
        opts.journal_size_mib = Some(journal.size * MIB_PER_GIB);
    }

    opts.tier_uuid = live
        .cluster(info.cluster())
        .and_then(|c| live.tier(&c.id, STORAGE_TIER_NAME))
        .map(|t| t.id.clone());
    Ok(opts)
}

impl Reconciler {
    /// Storage stages run while the host is locked.
    pub(crate) async fn reconcile_storage(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_STORAGE) {
            return Ok(());
        }
        let Some(storage) = desired.storage.as_ref() else {
            return Ok(());
        };

        self.reconcile_monitor(client, host, desired, storage, live).await?;
        self.reconcile_volume_groups(client, host, storage, live).await?;
        self.delete_stale_osds(client, host, storage, live).await?;

        let system_type = self.manager.system_type(&host.namespace().unwrap_or_default());
        if osd_provisioning_state(system_type.as_deref().unwrap_or_default(), live.host.personality()).allows(false) {
            self.reconcile_osds(client, host, storage, live).await?;
        }
        Ok(())
    }

    async fn reconcile_monitor(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        storage: &ProfileStorageInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_MONITOR) {
            return Ok(());
        }
        // Controller monitors are managed by the platform
        if desired.personality.as_deref() != Some(PERSONALITY_WORKER) {
            return Ok(());
        }

        let current = live.monitor().cloned();
        match (&storage.monitor, current) {
            (None, Some(monitor)) => {
                // The platform only removes a monitor along with its host
                info!("Stale ceph monitor {} on host {}; deleting monitors is not supported", monitor.id, live.id());
                events::warning(
                    self.store(),
                    host,
                    REASON_DELETED,
                    "stale ceph monitor detected; deleting monitors is not supported",
                )
                .await;
                Ok(())
            }
            (None, None) => Ok(()),
            (Some(info), Some(monitor)) => {
                let Some(size) = info.size.filter(|s| *s != monitor.size) else {
                    return Ok(());
                };
                let opts = CephMonitorOpts {
                    host_id: None,
                    size: Some(size),
                };
                info!("Updating ceph monitor {} on host {}: {:?}", monitor.id, live.id(), opts);
                let updated = client.update_ceph_monitor(&monitor.id, &opts).await?;
                live.monitors = vec![updated];
                events::normal(self.store(), host, REASON_UPDATED, "ceph monitor has been updated").await;
                Ok(())
            }
            (Some(info), None) => {
                let opts = CephMonitorOpts {
                    host_id: Some(live.id().to_string()),
                    size: info.size,
                };
                info!("Creating ceph monitor on host {}: {:?}", live.id(), opts);
                let created = client.create_ceph_monitor(&opts).await?;
                live.monitors = vec![created];
                events::normal(self.store(), host, REASON_CREATED, "ceph monitor has been created").await;
                Ok(())
            }
        }
    }

    async fn reconcile_volume_groups(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        storage: &ProfileStorageInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        let Some(groups) = storage.volume_groups.as_ref() else {
            return Ok(());
        };
        if !self.config.is_enabled(names::HOST_VOLUME_GROUP) {
            return Ok(());
        }

        let mut created = false;
        for group in groups {
            if live.volume_groups.iter().any(|g| g.name == group.name) {
                continue;
            }
            let capabilities = (group.lvm_type.is_some() || group.concurrent_disk_operations.is_some()).then(|| {
                VolumeGroupCapabilities {
                    lvm_type: group.lvm_type.clone(),
                    concurrent_disk_operations: group.concurrent_disk_operations,
                }
            });
            let opts = VolumeGroupOpts {
                host_id: live.id().to_string(),
                name: group.name.clone(),
                capabilities,
            };
            info!("Creating volume group on host {}: {:?}", live.id(), opts);
            client.create_volume_group(&opts).await?;
            events::normal(
                self.store(),
                host,
                REASON_CREATED,
                format!("volume group {:?} has been created", group.name),
            )
            .await;
            created = true;
        }
        if created {
            live.volume_groups = client.list_volume_groups(live.id()).await?;
        }

        for group in groups {
            self.reconcile_physical_volumes(client, host, group, live).await?;
        }
        Ok(())
    }

    async fn reconcile_partitions(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        group: &VolumeGroupInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_PARTITION) {
            return Ok(());
        }

        let mut created = false;
        for pv in &group.physical_volumes {
            let Some(size) = pv.size.filter(|_| pv.pv_type == PV_TYPE_PARTITION) else {
                continue;
            };
            if find_partition(live, &pv.path, size, &group.name).is_some() {
                continue;
            }

            let disk = live.disk_by_path(&pv.path).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("failed to find disk for path {}", pv.path))
            })?;
            let opts = PartitionOpts {
                host_id: live.id().to_string(),
                disk_id: disk.id.clone(),
                size_mib: size * MIB_PER_GIB,
                type_name: PARTITION_TYPE_LVM.to_string(),
                type_guid: PARTITION_GUID_LVM.to_string(),
            };
            info!("Creating partition on host {}: {:?}", live.id(), opts);
            let partition = client.create_partition(&opts).await?;
            events::normal(
                self.store(),
                host,
                REASON_CREATED,
                format!("partition {:?} has been created", partition.device_path),
            )
            .await;
            created = true;
        }
        if created {
            live.partitions = client.list_partitions(live.id()).await?;
        }

        if live.partitions.iter().any(Partition::is_transient) {
            return Err(self.wait_for(
                host,
                PartitionReady {
                    host_id: live.id().to_string(),
                },
                "waiting for partitions to transition to ready state",
            ));
        }
        Ok(())
    }

    async fn reconcile_physical_volumes(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        group: &VolumeGroupInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_PHYSICAL_VOLUME) {
            return Ok(());
        }
        let Some(vg_id) = live.volume_groups.iter().find(|g| g.name == group.name).map(|g| g.id.clone()) else {
            return Err(ControllerError::MissingSystemResource(format!(
                "unable to find volume group {}",
                group.name
            )));
        };

        self.reconcile_partitions(client, host, group, live).await?;

        let mut created = false;
        for pv in &group.physical_volumes {
            if find_physical_volume(live, &group.name, pv).is_some() {
                continue;
            }

            let device_id = if pv.pv_type == PV_TYPE_PARTITION {
                find_partition(live, &pv.path, pv.size.unwrap_or_default(), &group.name).map(|p| p.id.clone())
            } else {
                live.disk_by_path(&pv.path).map(|d| d.id.clone())
            }
            .ok_or_else(|| {
                ControllerError::MissingSystemResource(format!(
                    "failed to find physical volume device: {}({})",
                    pv.path, pv.pv_type
                ))
            })?;

            let opts = PhysicalVolumeOpts {
                host_id: live.id().to_string(),
                volume_group_id: vg_id.clone(),
                device_id,
                pv_type: pv.pv_type.clone(),
            };
            info!("Creating physical volume on host {}: {:?}", live.id(), opts);
            client.create_physical_volume(&opts).await?;
            events::normal(
                self.store(),
                host,
                REASON_CREATED,
                format!("physical volume '{}({})' has been created", pv.path, pv.pv_type),
            )
            .await;
            created = true;
        }
        if created {
            live.physical_volumes = client.list_physical_volumes(live.id()).await?;
            live.partitions = client.list_partitions(live.id()).await?;
        }
        Ok(())
    }

    async fn delete_stale_osds(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        storage: &ProfileStorageInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        let Some(declared) = storage.osds.as_ref() else {
            return Ok(());
        };
        if !self.config.is_enabled(names::HOST_OSD) {
            return Ok(());
        }

        let stale = stale_osds(live, declared).into_iter().map(|o| o.id.clone()).collect::<Vec<_>>();
        if stale.is_empty() {
            return Ok(());
        }
        for id in stale {
            info!("Deleting stale or updated OSD {} on host {}", id, live.id());
            client.delete_osd(&id).await?;
            events::normal(self.store(), host, REASON_DELETED, format!("osd {:?} deleted", id)).await;
        }
        live.osds = client.list_osds(live.id()).await?;
        Ok(())
    }

    /// Create and update OSDs, journals first since regular OSDs reference
    /// them.
    pub(crate) async fn reconcile_osds(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        storage: &ProfileStorageInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        let Some(declared) = storage.osds.as_ref().filter(|o| !o.is_empty()) else {
            return Ok(());
        };
        if !self.config.is_enabled(names::HOST_OSD) {
            return Ok(());
        }

        for function in [OSD_FUNCTION_JOURNAL, OSD_FUNCTION_OSD] {
            let mut changed = false;
            for info in declared.iter().filter(|o| o.function == function) {
                if let Some(osd) = find_osd(live, &info.path) {
                    let Some(opts) = osd_update(info, osd) else {
                        continue;
                    };
                    info!("Updating OSD {} on host {}: {:?}", osd.id, live.id(), opts);
                    client.update_osd(&osd.id, &opts).await?;
                    events::normal(
                        self.store(),
                        host,
                        REASON_UPDATED,
                        format!("OSD {:?} has been updated", info.path),
                    )
                    .await;
                } else {
                    let opts = osd_create_opts(live, info)?;
                    self.osd_provisioning_allowed(client, host, info, opts.tier_uuid.is_some(), live)
                        .await?;

                    info!("Creating OSD on host {}: {:?}", live.id(), opts);
                    client.create_osd(&opts).await?;
                    events::normal(
                        self.store(),
                        host,
                        REASON_CREATED,
                        format!("OSD {:?} has been created", info.path),
                    )
                    .await;
                }
                changed = true;
            }
            if changed {
                live.osds = client.list_osds(live.id()).await?;
            }
        }
        Ok(())
    }

    /// The cluster, its deployment model, its monitors and its storage tier
    /// must all be in place before an OSD is added.
    async fn osd_provisioning_allowed(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        info: &OsdInfo,
        has_tier: bool,
        live: &LiveHost,
    ) -> Result<()> {
        let name = info.cluster();
        let Some(cluster) = live.cluster(name) else {
            return Err(self.wait_for(
                host,
                ClusterPresence { name: name.to_string() },
                format!("waiting for the {:?} cluster to be created before allowing OSDs", name),
            ));
        };

        match cluster.deployment_model.as_str() {
            "" | DEPLOYMENT_MODEL_UNDEFINED => {
                return Err(self.wait_for(
                    host,
                    ClusterDeploymentModel { name: name.to_string() },
                    "waiting for storage deployment model to be defined before allowing OSDs",
                ));
            }
            DEPLOYMENT_MODEL_STORAGE | DEPLOYMENT_MODEL_CONTROLLER => {
                let standard = self.manager.system_type(&host.namespace().unwrap_or_default()).as_deref()
                    == Some(SYSTEM_TYPE_STANDARD);
                let configured = if standard {
                    client
                        .list_ceph_monitors()
                        .await?
                        .iter()
                        .filter(|m| m.state == CEPH_MONITOR_CONFIGURED)
                        .count()
                } else {
                    0
                };
                if standard && configured < OSD_MINIMUM_MONITOR_COUNT {
                    return Err(self.wait_for(
                        host,
                        StorageMonitorCount {
                            required: OSD_MINIMUM_MONITOR_COUNT,
                        },
                        format!(
                            "waiting for {} monitor(s) to be enabled before allowing OSDs",
                            OSD_MINIMUM_MONITOR_COUNT
                        ),
                    ));
                }
            }
            _ => {}
        }

        if !has_tier {
            return Err(self.wait_for(
                host,
                StorageTier {
                    cluster_name: name.to_string(),
                    tier: STORAGE_TIER_NAME.to_string(),
                },
                format!("waiting for the {:?} {} tier to be created", name, STORAGE_TIER_NAME),
            ));
        }
        Ok(())
    }

    /// Grow host filesystems to their declared size once the host is
    /// unlocked and available.
    pub(crate) async fn reconcile_filesystems(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_STORAGE) || !self.config.is_enabled(names::HOST_FILESYSTEMS) {
            return Ok(());
        }
        let Some(declared) = desired
            .storage
            .as_ref()
            .and_then(|s| s.filesystems.as_ref())
            .filter(|f| !f.is_empty())
        else {
            return Ok(());
        };

        if !live.host.is_unlocked_available() {
            return Err(self.wait_for(
                host,
                HostState {
                    host_id: live.id().to_string(),
                    selector: HostStateSelector::UnlockedAvailable,
                },
                "waiting for host to reach available state",
            ));
        }

        let mut updates = Vec::new();
        for info in declared {
            let fs = live.filesystems.iter().find(|f| f.name == info.name).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("unknown host filesystem {:?}", info.name))
            })?;
            if info.size > fs.size {
                updates.push(FileSystemOpts {
                    name: info.name.clone(),
                    size: info.size,
                });
            }
        }
        if updates.is_empty() {
            return Ok(());
        }

        info!("Updating filesystem sizes on host {}: {:?}", live.id(), updates);
        client.update_host_filesystems(live.id(), &updates).await?;
        live.filesystems = client.list_host_filesystems(live.id()).await?;
        events::normal(self.store(), host, REASON_UPDATED, "filesystem sizes have been updated").await;
        Ok(())
    }
}
