//! Live host snapshot and its expression as a profile
//!
//! [`LiveHost`] collects every platform table the host pipeline reads.
//! [`profile_of`] renders the snapshot in profile form; it is used both to
//! capture the defaults of a newly seen host and to describe the current
//! configuration when computing differences.

use crate::error::{ControllerError, Result};
use crds::{
    EthernetInfo, EthernetPortInfo, FileSystemInfo, HostProfileSpec, InterfaceInfo, JournalInfo,
    MemoryFunctionInfo, MemoryNodeInfo, MonitorInfo, OsdInfo, PhysicalVolumeInfo, ProcessorFunctionInfo,
    ProcessorInfo, ProfileStorageInfo, RouteInfo, AddressInfo, BondInfo, VlanInfo, VolumeGroupInfo,
    SUBFUNCTION_WORKER,
};
use platform_client::{
    Address, CephMonitor, Cluster, Cpu, Disk, Host as HostRecord, HostFilesystem, Interface, InterfaceDataNetwork,
    InterfaceNetwork, Label, Memory, Osd, Partition, PhysicalVolume, PlatformClientTrait, Port, Route, StorageTier,
    VolumeGroup, CPU_FUNCTION_APPLICATIONS, CPU_FUNCTION_VSWITCH, IF_CLASS_NONE, IF_CLASS_PCI_SRIOV, IF_TYPE_AE,
    IF_TYPE_ETHERNET, IF_TYPE_VIRTUAL, IF_TYPE_VLAN, MEMORY_FUNCTION_PLATFORM, MEMORY_FUNCTION_VM,
    MEMORY_FUNCTION_VSWITCH, PERSONALITY_WORKER, PV_TYPE_PARTITION,
};
use std::collections::BTreeMap;

/// Boot MAC reported for the first controller before its management
/// interface is configured
const ZERO_MAC: &str = "00:00:00:00:00:00";

pub(crate) const PAGE_SIZE_4K: &str = "4KB";
pub(crate) const PAGE_SIZE_2M: &str = "2MB";
pub(crate) const PAGE_SIZE_1G: &str = "1GB";

/// 4KiB pages per MiB
pub(crate) const PAGES_4K_PER_MIB: i32 = 256;

/// Hugepage size in MiB of a page size label.
pub(crate) fn page_size_mib(page_size: &str) -> Option<i32> {
    match page_size {
        PAGE_SIZE_2M => Some(2),
        PAGE_SIZE_1G => Some(1024),
        _ => None,
    }
}

/// Drop the partition suffix of a device path ("...-part2" becomes "...").
pub(crate) fn strip_partition_number(path: &str) -> String {
    match path.rfind("-part") {
        Some(idx) if path[idx + 5..].chars().all(|c| c.is_ascii_digit()) => path[..idx].to_string(),
        _ => path.to_string(),
    }
}

/// Every platform table describing one host.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveHost {
    pub host: HostRecord,
    pub labels: Vec<Label>,
    pub disks: Vec<Disk>,
    pub partitions: Vec<Partition>,
    pub physical_volumes: Vec<PhysicalVolume>,
    pub volume_groups: Vec<VolumeGroup>,
    pub osds: Vec<Osd>,
    pub clusters: Vec<Cluster>,
    pub tiers: Vec<StorageTier>,
    pub monitors: Vec<CephMonitor>,
    pub filesystems: Vec<HostFilesystem>,
    pub cpus: Vec<Cpu>,
    pub memory: Vec<Memory>,
    pub ports: Vec<Port>,
    pub interfaces: Vec<Interface>,
    pub interface_networks: Vec<InterfaceNetwork>,
    pub interface_datanetworks: Vec<InterfaceDataNetwork>,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
}

impl LiveHost {
    /// Read every table of `host` from the platform.
    pub(crate) async fn load(client: &dyn PlatformClientTrait, host: HostRecord) -> Result<Self> {
        let id = host.id.clone();

        let clusters = client.list_clusters().await?;
        let mut tiers = Vec::new();
        for cluster in &clusters {
            tiers.extend(client.list_storage_tiers(&cluster.id).await?);
        }
        let monitors = client
            .list_ceph_monitors()
            .await?
            .into_iter()
            .filter(|m| m.host_id == id || m.hostname == host.hostname())
            .collect();

        Ok(Self {
            labels: client.list_labels(&id).await?,
            disks: client.list_disks(&id).await?,
            partitions: client.list_partitions(&id).await?,
            physical_volumes: client.list_physical_volumes(&id).await?,
            volume_groups: client.list_volume_groups(&id).await?,
            osds: client.list_osds(&id).await?,
            clusters,
            tiers,
            monitors,
            filesystems: client.list_host_filesystems(&id).await?,
            cpus: client.list_cpus(&id).await?,
            memory: client.list_memory(&id).await?,
            ports: client.list_ports(&id).await?,
            interfaces: client.list_interfaces(&id).await?,
            interface_networks: client.list_interface_networks(&id).await?,
            interface_datanetworks: client.list_interface_datanetworks(&id).await?,
            addresses: client.list_addresses(&id).await?,
            routes: client.list_routes(&id).await?,
            host,
        })
    }

    /// Re-read the host after platform writes.
    pub(crate) async fn reload(&mut self, client: &dyn PlatformClientTrait) -> Result<()> {
        let host = client.get_host(&self.host.id).await?;
        *self = Self::load(client, host).await?;
        Ok(())
    }

    /// Re-read the interface tables and everything layered on them.
    pub(crate) async fn refresh_networking(&mut self, client: &dyn PlatformClientTrait) -> Result<()> {
        let id = self.host.id.clone();
        self.ports = client.list_ports(&id).await?;
        self.interfaces = client.list_interfaces(&id).await?;
        self.interface_networks = client.list_interface_networks(&id).await?;
        self.interface_datanetworks = client.list_interface_datanetworks(&id).await?;
        self.addresses = client.list_addresses(&id).await?;
        self.routes = client.list_routes(&id).await?;
        Ok(())
    }

    pub(crate) fn id(&self) -> &str {
        &self.host.id
    }

    /// Whether the host runs workloads.
    pub(crate) fn has_worker_subfunction(&self) -> bool {
        self.host.personality() == PERSONALITY_WORKER
            || self.host.subfunction_list().iter().any(|s| s == SUBFUNCTION_WORKER)
    }

    pub(crate) fn disk(&self, id: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.id == id)
    }

    pub(crate) fn disk_by_path(&self, path: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.device_path == path)
    }

    pub(crate) fn partition(&self, id: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.id == id)
    }

    pub(crate) fn interface(&self, id: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub(crate) fn interface_named(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Port backing an ethernet interface.
    pub(crate) fn port_of(&self, interface_id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.interface_id == interface_id)
    }

    /// Ethernet interface using the named port.
    pub(crate) fn interface_on_port(&self, port: &str) -> Option<&Interface> {
        let port = self.ports.iter().find(|p| p.name == port)?;
        self.interface(&port.interface_id)
    }

    /// Names of the platform networks bound to an interface.
    pub(crate) fn networks_of(&self, interface_id: &str) -> Vec<String> {
        self.interface_networks
            .iter()
            .filter(|n| n.interface_id == interface_id)
            .map(|n| n.network_name.clone())
            .collect()
    }

    /// Names of the data networks bound to an interface.
    pub(crate) fn datanetworks_of(&self, interface_id: &str) -> Vec<String> {
        self.interface_datanetworks
            .iter()
            .filter(|n| n.interface_id == interface_id)
            .map(|n| n.datanetwork_name.clone())
            .collect()
    }

    /// Cluster owning a storage tier.
    pub(crate) fn cluster_of_tier(&self, tier_id: &str) -> Option<&Cluster> {
        let tier = self.tiers.iter().find(|t| t.id == tier_id)?;
        self.clusters.iter().find(|c| c.id == tier.cluster_id)
    }

    pub(crate) fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub(crate) fn tier(&self, cluster_id: &str, name: &str) -> Option<&StorageTier> {
        self.tiers.iter().find(|t| t.cluster_id == cluster_id && t.name == name)
    }

    pub(crate) fn monitor(&self) -> Option<&CephMonitor> {
        self.monitors.first()
    }

    /// Device path of the disk or partition backing a physical volume.
    pub(crate) fn pv_path(&self, pv: &PhysicalVolume) -> Result<(String, Option<i32>)> {
        if pv.pv_type == PV_TYPE_PARTITION {
            let partition = self.partition(&pv.device_id).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("failed to lookup partition {}", pv.device_id))
            })?;
            return Ok((strip_partition_number(&partition.device_path), Some(partition.gibibytes())));
        }
        let path = self
            .disk(&pv.device_id)
            .map_or_else(|| pv.device_path.clone(), |d| d.device_path.clone());
        Ok((path, None))
    }
}

fn some_if_any<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

fn processors_of(live: &LiveHost) -> Vec<ProcessorInfo> {
    let mut nodes: BTreeMap<i32, BTreeMap<String, i32>> = BTreeMap::new();
    for cpu in live.cpus.iter().filter(|c| c.thread == 0) {
        let function = cpu.function.to_lowercase();
        if function == CPU_FUNCTION_APPLICATIONS {
            continue;
        }
        *nodes.entry(cpu.processor).or_default().entry(function).or_default() += 1;
    }
    // vswitch disappears from the table when it has no cores
    if let Some(node) = nodes.get_mut(&0) {
        node.entry(CPU_FUNCTION_VSWITCH.to_string()).or_default();
    }

    nodes
        .into_iter()
        .map(|(node, functions)| ProcessorInfo {
            node,
            functions: functions
                .into_iter()
                .map(|(function, count)| ProcessorFunctionInfo { function, count })
                .collect(),
        })
        .collect()
}

fn memory_of(live: &LiveHost, worker: bool) -> Vec<MemoryNodeInfo> {
    live.memory
        .iter()
        .map(|m| {
            let mut functions = vec![MemoryFunctionInfo {
                function: MEMORY_FUNCTION_PLATFORM.to_string(),
                page_size: PAGE_SIZE_4K.to_string(),
                page_count: m.platform * PAGES_4K_PER_MIB,
            }];
            if worker {
                let vswitch_size = match m.vswitch_page_size_mib {
                    2 => PAGE_SIZE_2M,
                    1024 => PAGE_SIZE_1G,
                    _ => PAGE_SIZE_4K,
                };
                functions.push(MemoryFunctionInfo {
                    function: MEMORY_FUNCTION_VSWITCH.to_string(),
                    page_size: vswitch_size.to_string(),
                    page_count: m.vswitch_required.unwrap_or(m.vswitch_count),
                });
                functions.push(MemoryFunctionInfo {
                    function: MEMORY_FUNCTION_VM.to_string(),
                    page_size: PAGE_SIZE_2M.to_string(),
                    page_count: m.vm_2m_pending.unwrap_or(m.vm_2m_count),
                });
                functions.push(MemoryFunctionInfo {
                    function: MEMORY_FUNCTION_VM.to_string(),
                    page_size: PAGE_SIZE_1G.to_string(),
                    page_count: m.vm_1g_pending.unwrap_or(m.vm_1g_count),
                });
            }
            MemoryNodeInfo {
                node: m.processor,
                functions,
            }
        })
        .collect()
}

fn storage_of(live: &LiveHost) -> Result<Option<ProfileStorageInfo>> {
    let monitor = if live.host.personality() == PERSONALITY_WORKER {
        live.monitor().map(|m| MonitorInfo { size: Some(m.size) })
    } else {
        None
    };

    let mut osds = Vec::new();
    for osd in &live.osds {
        let Some(disk) = live.disk(&osd.disk_id) else {
            continue;
        };
        let journal = match (&osd.journal_location, &osd.journal_path) {
            // A journal co-located with its OSD is platform generated
            (Some(location), Some(path)) if *location != osd.id => Some(JournalInfo {
                location: strip_partition_number(path),
                size: osd.journal_gibibytes().unwrap_or_default(),
            }),
            _ => None,
        };
        osds.push(OsdInfo {
            function: osd.function.clone(),
            path: disk.device_path.clone(),
            cluster_name: osd
                .tier_uuid
                .as_deref()
                .and_then(|t| live.cluster_of_tier(t))
                .map(|c| c.name.clone()),
            journal,
        });
    }

    let mut volume_groups = Vec::new();
    for vg in &live.volume_groups {
        let mut physical_volumes = Vec::new();
        for pv in live.physical_volumes.iter().filter(|pv| pv.volume_group_id == vg.id) {
            let (path, size) = live.pv_path(pv)?;
            physical_volumes.push(PhysicalVolumeInfo {
                pv_type: pv.pv_type.clone(),
                path,
                size,
            });
        }
        volume_groups.push(VolumeGroupInfo {
            name: vg.name.clone(),
            concurrent_disk_operations: vg.capabilities.concurrent_disk_operations,
            lvm_type: vg.capabilities.lvm_type.clone(),
            physical_volumes,
        });
    }

    let filesystems: Vec<FileSystemInfo> = live
        .filesystems
        .iter()
        .map(|fs| FileSystemInfo {
            name: fs.name.clone(),
            size: fs.size,
        })
        .collect();

    let storage = ProfileStorageInfo {
        monitor,
        osds: some_if_any(osds),
        volume_groups: some_if_any(volume_groups),
        filesystems: some_if_any(filesystems),
    };
    Ok((storage != ProfileStorageInfo::default()).then_some(storage))
}

fn interfaces_of(live: &LiveHost) -> Result<InterfaceInfo> {
    let mut ethernets = Vec::new();
    let mut vlans = Vec::new();
    let mut bonds = Vec::new();

    for iface in &live.interfaces {
        let class = iface.class.clone().filter(|c| !c.is_empty()).unwrap_or_else(|| IF_CLASS_NONE.to_string());
        let platform_networks = Some(live.networks_of(&iface.id));
        let data_networks = Some(live.datanetworks_of(&iface.id));
        let mtu = Some(iface.mtu);

        match iface.if_type.as_str() {
            IF_TYPE_ETHERNET | IF_TYPE_VIRTUAL => {
                let port = if iface.if_type == IF_TYPE_VIRTUAL {
                    iface.name.clone()
                } else {
                    live.port_of(&iface.id)
                        .ok_or_else(|| {
                            ControllerError::MissingSystemResource(format!(
                                "unable to find port name for interface id {}",
                                iface.id
                            ))
                        })?
                        .name
                        .clone()
                };
                let sriov = class.eq_ignore_ascii_case(IF_CLASS_PCI_SRIOV);
                ethernets.push(EthernetInfo {
                    name: iface.name.clone(),
                    class,
                    mtu,
                    platform_networks,
                    data_networks,
                    vf_count: if sriov { iface.vf_count } else { None },
                    vf_driver: if sriov { iface.vf_driver.clone() } else { None },
                    port: EthernetPortInfo { name: port },
                });
            }
            IF_TYPE_VLAN => vlans.push(VlanInfo {
                name: iface.name.clone(),
                class,
                mtu,
                platform_networks,
                data_networks,
                lower: iface.uses.first().cloned().unwrap_or_default(),
                vid: iface.vid.unwrap_or_default(),
            }),
            IF_TYPE_AE => bonds.push(BondInfo {
                name: iface.name.clone(),
                class,
                mtu,
                platform_networks,
                data_networks,
                members: iface.uses.clone(),
                mode: iface.ae_mode.clone().unwrap_or_default(),
                transmit_hash_policy: iface.ae_transmit_hash.clone(),
            }),
            _ => {}
        }
    }

    Ok(InterfaceInfo {
        ethernet: some_if_any(ethernets),
        vlan: some_if_any(vlans),
        bond: some_if_any(bonds),
    })
}

/// Express the live configuration of a host as a profile.
///
/// Board management, provisioning mode and power state are never included:
/// the platform does not report credentials, and the other two describe
/// intent rather than configuration.
///
/// # Errors
///
/// Returns `MissingSystemResource` when a table references a port or
/// partition the platform did not report.
pub(crate) fn profile_of(live: &LiveHost) -> Result<HostProfileSpec> {
    let host = &live.host;
    let worker = live.has_worker_subfunction();

    let labels: BTreeMap<String, String> = live.labels.iter().map(|l| (l.key.clone(), l.value.clone())).collect();

    let addresses: Vec<AddressInfo> = live
        .addresses
        .iter()
        .filter(|a| a.pool_uuid.as_deref().is_none_or(str::is_empty))
        .map(|a| AddressInfo {
            interface: a.interface_name.clone(),
            address: a.address.clone(),
            prefix: a.prefix,
        })
        .collect();

    let routes: Vec<RouteInfo> = live
        .routes
        .iter()
        .map(|r| RouteInfo {
            interface: r.interface_name.clone(),
            network: r.network.clone(),
            prefix: r.prefix,
            gateway: r.gateway.clone(),
            metric: Some(r.metric),
        })
        .collect();

    Ok(HostProfileSpec {
        personality: host.personality.clone(),
        administrative_state: Some(host.administrative_state.clone()).filter(|s| !s.is_empty()),
        subfunctions: some_if_any(host.subfunction_list()),
        location: host.location.name.clone().filter(|l| !l.is_empty()),
        labels: (!labels.is_empty()).then_some(labels),
        install_output: host.install_output.clone(),
        console: host.console.clone(),
        boot_device: host.boot_device.clone(),
        boot_mac: host.boot_mac.as_deref().map(str::to_lowercase).filter(|m| m != ZERO_MAC),
        root_device: host.root_device.clone(),
        clock_synchronization: host.clock_synchronization.clone(),
        processors: if worker { some_if_any(processors_of(live)) } else { None },
        memory: some_if_any(memory_of(live, worker)),
        storage: storage_of(live)?,
        interfaces: Some(interfaces_of(live)?),
        addresses: some_if_any(addresses),
        routes: some_if_any(routes),
        ..Default::default()
    })
}
