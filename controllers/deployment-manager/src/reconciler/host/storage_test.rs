//! Unit tests for host storage reconciliation

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::host::defaults::LiveHost;
    use crate::reconciler::host::storage::{find_partition, osd_update, stale_osds};
    use crate::test_utils::*;
    use crds::{
        FileSystemInfo, HostProfileSpec, JournalInfo, OsdInfo, PhysicalVolumeInfo, ProfileStorageInfo,
        VolumeGroupInfo,
    };
    use platform_client::{
        CephMonitor, Cluster, Disk, HostFilesystem, MockPlatformClient, Osd, Partition, PhysicalVolume, StorageTier,
        ADMIN_LOCKED, ADMIN_UNLOCKED, AVAIL_AVAILABLE, AVAIL_ONLINE, CEPH_MONITOR_CONFIGURED,
        DEPLOYMENT_MODEL_CONTROLLER, OPER_DISABLED, OPER_ENABLED, OSD_FUNCTION_JOURNAL, OSD_FUNCTION_OSD,
        PARTITION_STATUS_CREATING, PERSONALITY_STORAGE, PERSONALITY_WORKER, PV_TYPE_PARTITION, STORAGE_TIER_NAME,
    };
    use std::sync::Arc;

    const HOST_ID: &str = "h1";

    fn disk_path(index: u32) -> String {
        format!("/dev/disk/by-path/pci-0000:00:0d.0-ata-{}.0", index)
    }

    fn disk(index: u32) -> Disk {
        Disk {
            id: format!("disk-{}", index),
            host_id: HOST_ID.to_string(),
            device_node: format!("/dev/sd{}", char::from(b'a' + index as u8)),
            device_path: disk_path(index),
            device_type: "HDD".to_string(),
            size_mib: 200_000,
            available_mib: 200_000,
            physical_volume_id: None,
        }
    }

    fn osd(id: &str, disk_index: u32, function: &str, journal: Option<&str>) -> Osd {
        Osd {
            id: id.to_string(),
            function: function.to_string(),
            host_id: HOST_ID.to_string(),
            disk_id: format!("disk-{}", disk_index),
            state: "configured".to_string(),
            journal_location: journal.map(str::to_string),
            journal_size_mib: journal.map(|_| 1024),
            ..Default::default()
        }
    }

    fn osd_info(disk_index: u32, function: &str, journal: Option<JournalInfo>) -> OsdInfo {
        OsdInfo {
            function: function.to_string(),
            path: disk_path(disk_index),
            cluster_name: None,
            journal,
        }
    }

    fn monitor(id: &str, host_id: &str, state: &str) -> CephMonitor {
        CephMonitor {
            id: id.to_string(),
            host_id: host_id.to_string(),
            hostname: host_id.to_string(),
            state: state.to_string(),
            task: None,
            size: 20,
        }
    }

    fn storage_host(client: &MockPlatformClient) -> platform_client::Host {
        let record = platform_host(HOST_ID, "storage-0", PERSONALITY_STORAGE, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        client.add_host(record.clone());
        for index in 1..=3 {
            client.add_disk(disk(index));
        }
        record
    }

    fn add_ceph_cluster(client: &MockPlatformClient) {
        client.add_cluster(Cluster {
            id: "cluster-1".to_string(),
            name: "ceph_cluster".to_string(),
            cluster_type: "ceph".to_string(),
            deployment_model: DEPLOYMENT_MODEL_CONTROLLER.to_string(),
        });
        client.add_storage_tier(StorageTier {
            id: "tier-1".to_string(),
            name: STORAGE_TIER_NAME.to_string(),
            tier_type: "ceph".to_string(),
            status: "in-use".to_string(),
            cluster_id: "cluster-1".to_string(),
        });
    }

    fn osd_storage(osds: Vec<OsdInfo>) -> HostProfileSpec {
        HostProfileSpec {
            personality: Some(PERSONALITY_STORAGE.to_string()),
            storage: Some(ProfileStorageInfo {
                osds: Some(osds),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_stale_osds() {
        let live = LiveHost {
            disks: (1..=4).map(disk).collect(),
            osds: vec![
                osd("o1", 1, OSD_FUNCTION_OSD, Some("o1")),
                osd("o2", 2, OSD_FUNCTION_JOURNAL, None),
                osd("o3", 3, OSD_FUNCTION_OSD, Some("o2")),
                osd("o4", 4, OSD_FUNCTION_OSD, Some("o4")),
            ],
            ..Default::default()
        };
        let declared = vec![
            osd_info(1, OSD_FUNCTION_OSD, None),
            osd_info(2, OSD_FUNCTION_OSD, None),
            osd_info(3, OSD_FUNCTION_OSD, None),
        ];

        // o2 changed function, o3 lost its external journal and o4 is gone
        let stale = stale_osds(&live, &declared).into_iter().map(|o| o.id.as_str()).collect::<Vec<_>>();
        assert_eq!(stale, vec!["o2", "o3", "o4"]);
    }

    #[test]
    fn test_osd_update_only_touches_journals() {
        let journal = |size| {
            Some(JournalInfo {
                location: disk_path(2),
                size,
            })
        };

        let bare = osd("o1", 1, OSD_FUNCTION_OSD, None);
        let opts = osd_update(&osd_info(1, OSD_FUNCTION_OSD, journal(2)), &bare).unwrap();
        assert_eq!(opts.journal_location, Some(disk_path(2)));
        assert_eq!(opts.journal_size_mib, Some(2048));

        let journaled = osd("o1", 1, OSD_FUNCTION_OSD, Some("o2"));
        let opts = osd_update(&osd_info(1, OSD_FUNCTION_OSD, journal(2)), &journaled).unwrap();
        assert_eq!(opts.journal_location, None);
        assert_eq!(opts.journal_size_mib, Some(2048));

        assert!(osd_update(&osd_info(1, OSD_FUNCTION_OSD, journal(1)), &journaled).is_none());
        assert!(osd_update(&osd_info(1, OSD_FUNCTION_OSD, None), &journaled).is_none());
    }

    #[test]
    fn test_find_partition_ignores_partitions_of_other_groups() {
        let partition = |id: &str, index: u32, pv: Option<&str>| Partition {
            id: id.to_string(),
            host_id: HOST_ID.to_string(),
            disk_id: "disk-1".to_string(),
            device_path: format!("{}-part{}", disk_path(1), index),
            size_mib: 10 * 1024,
            physical_volume_id: pv.map(str::to_string),
            ..Default::default()
        };
        let live = LiveHost {
            disks: vec![disk(1)],
            partitions: vec![partition("p1", 1, Some("pv-1")), partition("p2", 2, None)],
            physical_volumes: vec![PhysicalVolume {
                id: "pv-1".to_string(),
                pv_type: PV_TYPE_PARTITION.to_string(),
                volume_group_id: "vg-1".to_string(),
                volume_group_name: "cgts-vg".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert_eq!(find_partition(&live, &disk_path(1), 10, "cgts-vg").map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(find_partition(&live, &disk_path(1), 10, "nova-local").map(|p| p.id.as_str()), Some("p2"));
        assert!(find_partition(&live, &disk_path(1), 20, "nova-local").is_none());
    }

    #[tokio::test]
    async fn test_new_partition_waits_for_ready_state() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = platform_host(HOST_ID, "worker-0", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        client.add_host(record.clone());
        client.add_disk(disk(1));
        let host = host("worker-0", "worker");
        store.insert(&host);

        let desired = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            storage: Some(ProfileStorageInfo {
                volume_groups: Some(vec![VolumeGroupInfo {
                    name: "nova-local".to_string(),
                    physical_volumes: vec![PhysicalVolumeInfo {
                        pv_type: PV_TYPE_PARTITION.to_string(),
                        path: disk_path(1),
                        size: Some(10),
                    }],
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut live = LiveHost::load(&client, record).await.unwrap();
        let err = reconciler
            .reconcile_storage(&client, &host, &desired, &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);

        assert_eq!(client.calls_to("create_volume_group").len(), 1);
        assert!(client.calls_to("create_physical_volume").is_empty());
        let partitions = client.partitions();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].size_mib, 10 * 1024);
        assert_eq!(partitions[0].status, PARTITION_STATUS_CREATING);
        assert!(store.has_event("Created", "volume group \"nova-local\" has been created"));
        assert!(store.has_event("Created", "has been created"));
    }

    #[tokio::test]
    async fn test_osd_waits_for_cluster() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = storage_host(&client);
        let host = host("storage-0", "storage");
        store.insert(&host);

        let desired = osd_storage(vec![osd_info(1, OSD_FUNCTION_OSD, None)]);
        let mut live = LiveHost::load(&client, record).await.unwrap();
        let err = reconciler
            .reconcile_storage(&client, &host, &desired, &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(ref m) if m.contains("cluster")), "{:?}", err);
        assert!(client.calls_to("create_osd").is_empty());
    }

    #[tokio::test]
    async fn test_osd_waits_for_monitor_quorum_then_creates() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = storage_host(&client);
        add_ceph_cluster(&client);
        client.add_ceph_monitor(monitor("m0", "c0", CEPH_MONITOR_CONFIGURED));
        client.add_ceph_monitor(monitor("m1", "c1", "configuring"));
        let host = host("storage-0", "storage");
        store.insert(&host);

        let desired = osd_storage(vec![osd_info(1, OSD_FUNCTION_OSD, None)]);
        let mut live = LiveHost::load(&client, record.clone()).await.unwrap();
        let err = reconciler
            .reconcile_storage(&client, &host, &desired, &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(ref m) if m.contains("monitor")), "{:?}", err);
        assert!(client.calls_to("create_osd").is_empty());

        client.add_ceph_monitor(monitor("m2", "w0", CEPH_MONITOR_CONFIGURED));
        let mut live = LiveHost::load(&client, record).await.unwrap();
        reconciler
            .reconcile_storage(&client, &host, &desired, &mut live)
            .await
            .expect("storage");

        let osds = client.osds();
        assert_eq!(osds.len(), 1);
        assert_eq!(osds[0].disk_id, "disk-1");
        assert_eq!(osds[0].tier_uuid.as_deref(), Some("tier-1"));
        assert_eq!(live.osds.len(), 1);
        assert!(store.has_event("Created", "has been created"));
    }

    #[tokio::test]
    async fn test_journal_creates_first_and_must_be_a_journal() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = storage_host(&client);
        add_ceph_cluster(&client);
        client.add_ceph_monitor(monitor("m0", "c0", CEPH_MONITOR_CONFIGURED));
        client.add_ceph_monitor(monitor("m1", "c1", CEPH_MONITOR_CONFIGURED));
        let host = host("storage-0", "storage");
        store.insert(&host);

        let journal = JournalInfo {
            location: disk_path(2),
            size: 2,
        };
        let desired = osd_storage(vec![
            osd_info(1, OSD_FUNCTION_OSD, Some(journal)),
            osd_info(2, OSD_FUNCTION_JOURNAL, None),
        ]);
        let mut live = LiveHost::load(&client, record.clone()).await.unwrap();
        reconciler
            .reconcile_storage(&client, &host, &desired, &mut live)
            .await
            .expect("storage");

        assert_eq!(client.calls_to("create_osd"), vec!["create_osd disk-2", "create_osd disk-1"]);
        let osds = client.osds();
        let journal_osd = osds.iter().find(|o| o.disk_id == "disk-2").unwrap();
        let data_osd = osds.iter().find(|o| o.disk_id == "disk-1").unwrap();
        assert_eq!(data_osd.journal_location.as_deref(), Some(journal_osd.id.as_str()));
        assert_eq!(data_osd.journal_size_mib, Some(2048));

        // Pointing a journal at a regular OSD is a profile error
        let desired = osd_storage(vec![
            osd_info(1, OSD_FUNCTION_OSD, None),
            osd_info(3, OSD_FUNCTION_OSD, Some(JournalInfo {
                location: disk_path(1),
                size: 2,
            })),
        ]);
        let mut live = LiveHost::load(&client, record).await.unwrap();
        live.osds.retain(|o| o.disk_id == "disk-1");
        let err = reconciler
            .reconcile_osds(&client, &host, desired.storage.as_ref().unwrap(), &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::UserData(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_filesystems_grow_only_when_available() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(HOST_ID, "worker-0", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        client.add_host(record.clone());
        for (name, size) in [("docker", 30), ("kubelet", 10)] {
            client.add_host_filesystem(HostFilesystem {
                id: format!("fs-{}", name),
                name: name.to_string(),
                size,
                logical_volume: format!("{}-lv", name),
                host_id: HOST_ID.to_string(),
            });
        }
        let host = host("worker-0", "worker");
        store.insert(&host);

        let filesystems = |entries: &[(&str, i32)]| HostProfileSpec {
            storage: Some(ProfileStorageInfo {
                filesystems: Some(
                    entries
                        .iter()
                        .map(|(name, size)| FileSystemInfo {
                            name: name.to_string(),
                            size: *size,
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        };
        let desired = filesystems(&[("docker", 40), ("kubelet", 5)]);

        let mut live = LiveHost::load(&client, record.clone()).await.unwrap();
        let err = reconciler
            .reconcile_filesystems(&client, &host, &desired, &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);

        record.administrative_state = ADMIN_UNLOCKED.to_string();
        record.operational_status = OPER_ENABLED.to_string();
        record.availability_status = AVAIL_AVAILABLE.to_string();
        let mut live = LiveHost::load(&client, record).await.unwrap();
        reconciler
            .reconcile_filesystems(&client, &host, &desired, &mut live)
            .await
            .expect("filesystems");

        let sizes = client
            .host_filesystems()
            .into_iter()
            .map(|f| (f.name, f.size))
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![("docker".to_string(), 40), ("kubelet".to_string(), 10)]);

        let err = reconciler
            .reconcile_filesystems(&client, &host, &filesystems(&[("scratch", 8)]), &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingSystemResource(_)), "{:?}", err);
    }
}
