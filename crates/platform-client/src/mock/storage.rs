//! Storage operations for MockPlatformClient
//!
//! Handles disks, partitions, physical volumes, volume groups, OSDs,
//! clusters, storage tiers, ceph monitors and host filesystems

use super::helpers::{get, get_mut, new_id, remove, set_opt};
use super::MockPlatformClient;
use crate::error::PlatformError;
use crate::models::*;

pub async fn list_disks(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Disk>, PlatformError> {
    client.enter("list_disks", host_id)?;
    Ok(client
        .state()
        .disks
        .iter()
        .filter(|d| d.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn list_partitions(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Partition>, PlatformError> {
    client.enter("list_partitions", host_id)?;
    Ok(client
        .state()
        .partitions
        .iter()
        .filter(|p| p.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn create_partition(client: &MockPlatformClient, opts: &PartitionOpts) -> Result<Partition, PlatformError> {
    client.enter("create_partition", &opts.disk_id)?;
    let mut state = client.state();
    let disk = get(&state.disks, "disk", &opts.disk_id)?;
    let index = state.partitions.iter().filter(|p| p.disk_id == disk.id).count() + 1;
    let partition = Partition {
        id: new_id(),
        host_id: opts.host_id.clone(),
        disk_id: disk.id.clone(),
        device_path: format!("{}-part{}", disk.device_path, index),
        device_node: format!("{}{}", disk.device_node, index),
        type_name: opts.type_name.clone(),
        size_mib: opts.size_mib,
        physical_volume_id: None,
        status: PARTITION_STATUS_CREATING,
    };
    state.partitions.push(partition.clone());
    Ok(partition)
}

pub async fn list_physical_volumes(client: &MockPlatformClient, host_id: &str) -> Result<Vec<PhysicalVolume>, PlatformError> {
    client.enter("list_physical_volumes", host_id)?;
    Ok(client
        .state()
        .physical_volumes
        .iter()
        .filter(|p| p.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn create_physical_volume(
    client: &MockPlatformClient,
    opts: &PhysicalVolumeOpts,
) -> Result<PhysicalVolume, PlatformError> {
    client.enter("create_physical_volume", &opts.device_id)?;
    let mut state = client.state();
    let group = get(&state.volume_groups, "volume group", &opts.volume_group_id)?;
    let pv_id = new_id();
    let device_path = if opts.pv_type == PV_TYPE_PARTITION {
        let partition = get_mut(&mut state.partitions, "partition", &opts.device_id)?;
        partition.physical_volume_id = Some(pv_id.clone());
        partition.device_path.clone()
    } else {
        let disk = get_mut(&mut state.disks, "disk", &opts.device_id)?;
        disk.physical_volume_id = Some(pv_id.clone());
        disk.device_path.clone()
    };
    let volume = PhysicalVolume {
        id: pv_id,
        pv_type: opts.pv_type.clone(),
        state: "adding".to_string(),
        host_id: opts.host_id.clone(),
        device_path,
        device_id: opts.device_id.clone(),
        volume_group_id: group.id,
        volume_group_name: group.name,
    };
    state.physical_volumes.push(volume.clone());
    Ok(volume)
}

pub async fn list_volume_groups(client: &MockPlatformClient, host_id: &str) -> Result<Vec<VolumeGroup>, PlatformError> {
    client.enter("list_volume_groups", host_id)?;
    Ok(client
        .state()
        .volume_groups
        .iter()
        .filter(|g| g.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn create_volume_group(client: &MockPlatformClient, opts: &VolumeGroupOpts) -> Result<VolumeGroup, PlatformError> {
    client.enter("create_volume_group", &opts.name)?;
    let group = VolumeGroup {
        id: new_id(),
        name: opts.name.clone(),
        host_id: opts.host_id.clone(),
        state: "adding".to_string(),
        capabilities: opts.capabilities.clone().unwrap_or_default(),
    };
    client.state().volume_groups.push(group.clone());
    Ok(group)
}

pub async fn list_osds(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Osd>, PlatformError> {
    client.enter("list_osds", host_id)?;
    Ok(client
        .state()
        .osds
        .iter()
        .filter(|o| o.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn create_osd(client: &MockPlatformClient, opts: &OsdOpts) -> Result<Osd, PlatformError> {
    let disk_id = opts.disk_id.clone().unwrap_or_default();
    client.enter("create_osd", &disk_id)?;
    let id = new_id();
    let function = opts.function.clone().unwrap_or_else(|| OSD_FUNCTION_OSD.to_string());
    let journal_location = match (&opts.journal_location, function.as_str()) {
        (Some(location), _) => Some(location.clone()),
        (None, OSD_FUNCTION_OSD) => Some(id.clone()),
        _ => None,
    };
    let osd = Osd {
        id,
        function,
        host_id: opts.host_id.clone().unwrap_or_default(),
        disk_id,
        state: "configuring".to_string(),
        tier_name: None,
        tier_uuid: opts.tier_uuid.clone(),
        journal_location,
        journal_size_mib: opts.journal_size_mib,
        journal_path: None,
    };
    client.state().osds.push(osd.clone());
    Ok(osd)
}

pub async fn update_osd(client: &MockPlatformClient, id: &str, opts: &OsdOpts) -> Result<Osd, PlatformError> {
    client.enter("update_osd", id)?;
    let mut state = client.state();
    let osd = get_mut(&mut state.osds, "osd", id)?;
    set_opt(&mut osd.journal_location, opts.journal_location.as_ref());
    set_opt(&mut osd.journal_size_mib, opts.journal_size_mib.as_ref());
    set_opt(&mut osd.tier_uuid, opts.tier_uuid.as_ref());
    Ok(osd.clone())
}

pub async fn delete_osd(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_osd", id)?;
    client.check_delete(id)?;
    remove(&mut client.state().osds, "osd", id).map(|_| ())
}

pub async fn list_clusters(client: &MockPlatformClient) -> Result<Vec<Cluster>, PlatformError> {
    client.enter("list_clusters", "")?;
    Ok(client.state().clusters.clone())
}

pub async fn list_storage_tiers(client: &MockPlatformClient, cluster_id: &str) -> Result<Vec<StorageTier>, PlatformError> {
    client.enter("list_storage_tiers", cluster_id)?;
    Ok(client
        .state()
        .storage_tiers
        .iter()
        .filter(|t| t.cluster_id == cluster_id)
        .cloned()
        .collect())
}

pub async fn list_ceph_monitors(client: &MockPlatformClient) -> Result<Vec<CephMonitor>, PlatformError> {
    client.enter("list_ceph_monitors", "")?;
    Ok(client.state().ceph_monitors.clone())
}

pub async fn create_ceph_monitor(client: &MockPlatformClient, opts: &CephMonitorOpts) -> Result<CephMonitor, PlatformError> {
    let host_id = opts.host_id.clone().unwrap_or_default();
    client.enter("create_ceph_monitor", &host_id)?;
    let monitor = CephMonitor {
        id: new_id(),
        host_id,
        state: "configuring".to_string(),
        size: opts.size.unwrap_or_default(),
        ..Default::default()
    };
    client.state().ceph_monitors.push(monitor.clone());
    Ok(monitor)
}

pub async fn update_ceph_monitor(
    client: &MockPlatformClient,
    id: &str,
    opts: &CephMonitorOpts,
) -> Result<CephMonitor, PlatformError> {
    client.enter("update_ceph_monitor", id)?;
    let mut state = client.state();
    let monitor = get_mut(&mut state.ceph_monitors, "ceph monitor", id)?;
    if let Some(size) = opts.size {
        monitor.size = size;
    }
    Ok(monitor.clone())
}

pub async fn list_host_filesystems(client: &MockPlatformClient, host_id: &str) -> Result<Vec<HostFilesystem>, PlatformError> {
    client.enter("list_host_filesystems", host_id)?;
    Ok(client
        .state()
        .host_filesystems
        .iter()
        .filter(|f| f.host_id == host_id)
        .cloned()
        .collect())
}

pub async fn update_host_filesystems(
    client: &MockPlatformClient,
    host_id: &str,
    opts: &[FileSystemOpts],
) -> Result<(), PlatformError> {
    client.enter("update_host_filesystems", host_id)?;
    let mut state = client.state();
    for opt in opts {
        if let Some(fs) = state
            .host_filesystems
            .iter_mut()
            .find(|f| f.host_id == host_id && f.name == opt.name)
        {
            fs.size = opt.size;
        }
    }
    Ok(())
}
