//! Unit tests for the Host reconciler pipeline

#[cfg(test)]
mod tests {
    use crate::config::ReconcilerConfig;
    use crate::error::ControllerError;
    use crate::reconciler::host::defaults::{profile_of, LiveHost};
    use crate::reconciler::host::diff::host_diff;
    use crate::test_utils::*;
    use crds::{
        EthernetInfo, EthernetPortInfo, FileSystemInfo, Host, HostProfileSpec, HostStatus, InterfaceInfo, MatchInfo,
        MemoryFunctionInfo, MemoryNodeInfo, ProcessorFunctionInfo, ProcessorInfo, ProfileStorageInfo,
        PROVISIONING_DYNAMIC, PROVISIONING_STATIC,
    };
    use platform_client::{
        Address, Cpu, Disk, HostCapabilities, Interface, Memory, MockPlatformClient, Port, Route, ACTIVE_CONTROLLER,
        ADDRESS_MODE_STATIC, ADMIN_LOCKED, ADMIN_UNLOCKED, AVAIL_AVAILABLE, AVAIL_OFFLINE, AVAIL_ONLINE,
        IF_TYPE_ETHERNET, OPER_DISABLED, OPER_ENABLED, PERSONALITY_CONTROLLER, PERSONALITY_WORKER, SYSTEM_TYPE_STANDARD,
    };
    use std::sync::Arc;

    const BOOT_MAC: &str = "08:00:27:3a:bc:01";

    fn dynamic_profile(console: &str) -> HostProfileSpec {
        HostProfileSpec {
            personality: Some(PERSONALITY_CONTROLLER.to_string()),
            provisioning_mode: Some(PROVISIONING_DYNAMIC.to_string()),
            console: Some(console.to_string()),
            ..Default::default()
        }
    }

    fn matched_host(name: &str) -> Host {
        let mut host = with_finalizer(host(name, "controller"));
        host.spec.match_info = Some(MatchInfo {
            boot_mac: Some(BOOT_MAC.to_string()),
            ..Default::default()
        });
        host
    }

    fn root_disk(host_id: &str) -> Disk {
        Disk {
            id: format!("{}-sda", host_id),
            host_id: host_id.to_string(),
            device_node: "/dev/sda".to_string(),
            device_path: "/dev/disk/by-path/pci-0000:00:1f.2-ata-1.0".to_string(),
            device_type: "SSD".to_string(),
            size_mib: 512_000,
            available_mib: 100_000,
            physical_volume_id: None,
        }
    }

    fn stored_defaults(host: &mut Host, id: &str, defaults: &HostProfileSpec, reconciled: bool) {
        host.status = Some(HostStatus {
            id: Some(id.to_string()),
            in_sync: reconciled,
            reconciled,
            defaults: Some(serde_json::to_string(defaults).unwrap()),
            ..Default::default()
        });
    }

    fn console_defaults() -> HostProfileSpec {
        HostProfileSpec {
            personality: Some(PERSONALITY_CONTROLLER.to_string()),
            console: Some("ttyS0,115200".to_string()),
            ..Default::default()
        }
    }

    fn worker_host() -> Host {
        let mut host = with_finalizer(host("worker-1", "worker"));
        host.spec.match_info = Some(MatchInfo {
            boot_mac: Some(BOOT_MAC.to_string()),
            ..Default::default()
        });
        host
    }

    fn worker_profile(interface: &str) -> HostProfileSpec {
        HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            provisioning_mode: Some(PROVISIONING_DYNAMIC.to_string()),
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![EthernetInfo {
                    name: interface.to_string(),
                    class: "data".to_string(),
                    port: EthernetPortInfo {
                        name: "enp0s3".to_string(),
                    },
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn cpu(core: i32, function: &str) -> Cpu {
        Cpu {
            id: format!("cpu-{}", core),
            host_id: "h1".to_string(),
            processor: 0,
            logical_core: core,
            physical_core: core,
            thread: 0,
            function: function.to_string(),
        }
    }

    /// Locked worker with a data interface "data0" on port enp0s3 carrying
    /// a static address and a route, plus its CPU and memory tables.
    fn networked_worker(client: &MockPlatformClient) -> platform_client::Host {
        let record = platform_host("h1", "worker-1", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        client.add_host(record.clone());
        client.add_disk(root_disk("h1"));
        client.add_port(Port {
            id: "port-1".to_string(),
            host_id: "h1".to_string(),
            name: "enp0s3".to_string(),
            pci_address: "0000:00:03.0".to_string(),
            interface_id: "if-1".to_string(),
        });
        client.add_interface(Interface {
            id: "if-1".to_string(),
            host_id: "h1".to_string(),
            name: "data0".to_string(),
            if_type: IF_TYPE_ETHERNET.to_string(),
            class: Some("data".to_string()),
            mtu: 1500,
            ipv4_mode: Some(ADDRESS_MODE_STATIC.to_string()),
            ..Default::default()
        });
        client.add_address(Address {
            id: "a1".to_string(),
            address: "10.10.10.5".to_string(),
            prefix: 24,
            interface_name: "data0".to_string(),
            interface_id: "if-1".to_string(),
            pool_uuid: None,
        });
        client.add_route(Route {
            id: "r1".to_string(),
            network: "10.20.0.0".to_string(),
            prefix: 16,
            gateway: "10.10.10.1".to_string(),
            metric: 1,
            interface_name: "data0".to_string(),
            interface_id: "if-1".to_string(),
        });
        for (core, function) in [(0, "Platform"), (1, "Platform"), (2, "Applications")] {
            client.add_cpu(cpu(core, function));
        }
        client.add_memory(Memory {
            id: "m0".to_string(),
            host_id: "h1".to_string(),
            processor: 0,
            total: 65536,
            platform: 8000,
            vm_2m_count: 100,
            vm_1g_count: 2,
            vswitch_page_size_mib: 1024,
            vswitch_count: 1,
            ..Default::default()
        });
        record
    }

    #[tokio::test]
    async fn test_dynamic_host_waits_for_inventory() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let host = matched_host("controller-1");
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);
        assert_eq!(client.write_count(), 0);

        let status = store.object::<Host>("controller-1").and_then(|h| h.status).expect("status");
        assert!(!status.in_sync);
        assert!(status.id.is_none());
    }

    #[tokio::test]
    async fn test_static_host_is_created_once_primary_controller_is_enabled() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        client.add_host(platform_host(
            "c0",
            "controller-0",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        ));
        store.insert(&host_profile("worker", HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            provisioning_mode: Some(PROVISIONING_STATIC.to_string()),
            boot_mac: Some("08:00:27:3A:BC:02".to_string()),
            ..Default::default()
        }));
        let host = with_finalizer(host("worker-1", "worker"));
        store.insert(&host);

        // The new record is offline until it boots, so defaults cannot be
        // collected yet
        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);

        assert_eq!(client.calls_to("create_host").len(), 1);
        let created = client
            .hosts()
            .into_iter()
            .find(|h| h.hostname() == "worker-1")
            .expect("created host");
        assert_eq!(created.boot_mac.as_deref(), Some("08:00:27:3a:bc:02"));
        assert_eq!(created.personality(), PERSONALITY_WORKER);
        assert!(store.has_event("Created", "static host has been created"));

        let status = store.object::<Host>("worker-1").and_then(|h| h.status).expect("status");
        assert_eq!(status.id.as_deref(), Some(created.id.as_str()));
        assert_eq!(status.availability_status.as_deref(), Some(AVAIL_OFFLINE));
        assert!(status.defaults.is_none());
    }

    #[tokio::test]
    async fn test_static_host_waits_while_primary_controller_is_locked() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        client.add_host(platform_host(
            "c0",
            "controller-0",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        ));
        store.insert(&host_profile("worker", HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            provisioning_mode: Some(PROVISIONING_STATIC.to_string()),
            boot_mac: Some("08:00:27:3a:bc:02".to_string()),
            ..Default::default()
        }));
        let host = with_finalizer(host("worker-1", "worker"));
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);
        assert!(client.calls_to("create_host").is_empty());
        assert_eq!(client.hosts().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_host_waits_for_stable_state() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        );
        record.task = Some("Unlocking".to_string());
        client.add_host(record);

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let host = matched_host("controller-1");
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);
        assert!(client.calls_to("list_disks").is_empty());

        let status = store.object::<Host>("controller-1").and_then(|h| h.status).expect("status");
        assert_eq!(status.id.as_deref(), Some("h1"));
        assert_eq!(status.administrative_state.as_deref(), Some(ADMIN_LOCKED));
    }

    #[tokio::test]
    async fn test_defaults_wait_for_collected_inventory() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        client.add_host(platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        ));

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let host = matched_host("controller-1");
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);
        assert!(client.calls_to("update_host").is_empty());

        let status = store.object::<Host>("controller-1").and_then(|h| h.status).expect("status");
        assert!(status.defaults.is_none());
    }

    #[tokio::test]
    async fn test_locked_host_captures_defaults_and_applies_attributes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        );
        record.console = Some("ttyS0,115200".to_string());
        client.add_host(record);
        client.add_disk(root_disk("h1"));

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let host = matched_host("controller-1");
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");

        assert_eq!(client.calls_to("update_host").len(), 1);
        assert_eq!(client.hosts()[0].console.as_deref(), Some("tty0"));
        assert!(store.has_event("Created", "defaults collected and stored"));
        assert!(store.has_event("Updated", "attributes have been updated"));

        let host = store.object::<Host>("controller-1").expect("host");
        let defaults = host.defaults().unwrap().expect("defaults");
        assert_eq!(defaults.console.as_deref(), Some("ttyS0,115200"));
        assert_eq!(defaults.personality.as_deref(), Some(PERSONALITY_CONTROLLER));

        let status = host.status.expect("status");
        assert!(status.in_sync);
        assert!(status.reconciled);
    }

    #[tokio::test]
    async fn test_unlocked_host_waits_for_lock_before_locked_only_changes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        );
        record.console = Some("ttyS0,115200".to_string());
        client.add_host(record);
        client.add_disk(root_disk("h1"));

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let mut host = matched_host("controller-1");
        stored_defaults(&mut host, "h1", &console_defaults(), false);
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::WaitForMonitor(_)), "{:?}", err);
        assert!(client.calls_to("update_host").is_empty());
        assert!(client.calls_to("host_action").is_empty());
    }

    #[tokio::test]
    async fn test_reconciled_host_refuses_changes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        );
        record.console = Some("ttyS0,115200".to_string());
        client.add_host(record);
        client.add_disk(root_disk("h1"));

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let mut host = matched_host("controller-1");
        stored_defaults(&mut host, "h1", &console_defaults(), true);
        store.insert(&host);

        let err = reconciler.reconcile(Arc::new(host)).await.unwrap_err();
        assert!(matches!(err, ControllerError::ChangeAfterReconciled(_)), "{:?}", err);
        assert_eq!(client.write_count(), 0);

        let status = store.object::<Host>("controller-1").and_then(|h| h.status).expect("status");
        assert!(!status.in_sync);
        assert!(status.reconciled);
    }

    #[tokio::test]
    async fn test_in_sync_host_makes_no_changes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        );
        record.console = Some("tty0".to_string());
        client.add_host(record);
        client.add_disk(root_disk("h1"));

        store.insert(&host_profile("controller", dynamic_profile("tty0")));
        let mut host = matched_host("controller-1");
        stored_defaults(&mut host, "h1", &console_defaults(), true);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");
        assert_eq!(client.write_count(), 0);

        let status = store.object::<Host>("controller-1").and_then(|h| h.status).expect("status");
        assert!(status.in_sync);
        assert_eq!(status.availability_status.as_deref(), Some(AVAIL_AVAILABLE));
    }

    #[tokio::test]
    async fn test_unlocked_host_grows_filesystems() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        client.add_host(platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        ));
        client.add_disk(root_disk("h1"));
        client.add_host_filesystem(platform_client::HostFilesystem {
            id: "fs-1".to_string(),
            name: "docker".to_string(),
            size: 30,
            logical_volume: "docker-lv".to_string(),
            host_id: "h1".to_string(),
        });

        let mut profile = dynamic_profile("tty0");
        profile.console = None;
        profile.storage = Some(ProfileStorageInfo {
            filesystems: Some(vec![FileSystemInfo {
                name: "docker".to_string(),
                size: 40,
            }]),
            ..Default::default()
        });
        store.insert(&host_profile("controller", profile));
        let mut host = matched_host("controller-1");
        stored_defaults(
            &mut host,
            "h1",
            &HostProfileSpec {
                personality: Some(PERSONALITY_CONTROLLER.to_string()),
                ..Default::default()
            },
            false,
        );
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");

        assert_eq!(client.calls_to("update_host_filesystems").len(), 1);
        assert_eq!(client.host_filesystems()[0].size, 40);
        assert!(client.calls_to("update_host").is_empty());
        assert!(store.has_event("Updated", "filesystem sizes have been updated"));
    }

    #[tokio::test]
    async fn test_delete_locks_then_removes_host() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        client.add_host(platform_host(
            "h1",
            "worker-1",
            PERSONALITY_WORKER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        ));

        let mut host = with_finalizer(host("worker-1", "worker"));
        host.status = Some(HostStatus {
            id: Some("h1".to_string()),
            ..Default::default()
        });
        let host = deleting(host);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");

        assert_eq!(client.calls_to("host_action").len(), 1);
        assert_eq!(client.calls_to("delete_host").len(), 1);
        assert!(client.hosts().is_empty());
        assert!(store.has_event("Updated", "host has been locked"));
        assert!(store.has_event("Deleted", "host has been deleted"));
        assert!(store.object::<Host>("worker-1").is_none());
    }

    #[tokio::test]
    async fn test_delete_of_missing_record_releases_finalizer() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut host = with_finalizer(host("worker-1", "worker"));
        host.status = Some(HostStatus {
            id: Some("gone".to_string()),
            ..Default::default()
        });
        let host = deleting(host);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");
        assert!(client.calls_to("delete_host").is_empty());
        assert!(store.object::<Host>("worker-1").is_none());
    }

    #[tokio::test]
    async fn test_delete_skips_active_controller() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "c0",
            "controller-0",
            PERSONALITY_CONTROLLER,
            ADMIN_UNLOCKED,
            OPER_ENABLED,
            AVAIL_AVAILABLE,
        );
        record.capabilities = HostCapabilities {
            personality: Some(ACTIVE_CONTROLLER.to_string()),
            ..Default::default()
        };
        client.add_host(record);

        let host = deleting(with_finalizer(host("controller-0", "controller")));
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");
        assert!(client.calls_to("host_action").is_empty());
        assert!(client.calls_to("delete_host").is_empty());
        assert_eq!(client.hosts().len(), 1);
    }

    #[tokio::test]
    async fn test_interface_rename_keeps_addresses_and_routes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = networked_worker(&client);
        let defaults = profile_of(&LiveHost::load(&client, record).await.unwrap()).unwrap();
        store.insert(&host_profile("worker", worker_profile("data1")));
        let mut host = worker_host();
        stored_defaults(&mut host, "h1", &defaults, false);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host)).await.expect("reconcile");

        assert_eq!(client.calls_to("update_interface"), vec!["update_interface if-1"]);
        assert!(client.calls_to("delete_address").is_empty());
        assert!(client.calls_to("delete_route").is_empty());
        assert!(client.calls_to("create_address").is_empty());
        assert!(client.calls_to("create_route").is_empty());

        assert_eq!(client.interfaces()[0].name, "data1");
        let addresses = client.addresses();
        assert_eq!(addresses.len(), 1);
        assert_eq!((addresses[0].id.as_str(), addresses[0].interface_name.as_str()), ("a1", "data1"));
        let routes = client.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!((routes[0].id.as_str(), routes[0].interface_name.as_str()), ("r1", "data1"));

        let status = store.object::<Host>("worker-1").and_then(|h| h.status).expect("status");
        assert!(status.in_sync);
    }

    #[tokio::test]
    async fn test_host_matching_live_state_makes_no_writes() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = networked_worker(&client);
        let mut live = LiveHost::load(&client, record).await.unwrap();
        let current = profile_of(&live).unwrap();
        assert!(current.processors.is_some());
        assert!(current.memory.is_some());
        assert!(current.addresses.is_some());
        assert!(current.routes.is_some());

        store.insert(&host_profile("worker", worker_profile("data0")));
        let mut host = worker_host();
        stored_defaults(&mut host, "h1", &current, false);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host.clone())).await.expect("reconcile");
        assert_eq!(client.write_count(), 0, "{:?}", client.calls());

        // Every locked-state step leaves a matching host alone
        reconciler
            .reconcile_disabled_host(&client, &host, &current, &mut live)
            .await
            .expect("locked pass");
        assert_eq!(client.write_count(), 0, "{:?}", client.calls());
    }

    #[tokio::test]
    async fn test_memory_is_left_alone_on_non_worker_hosts() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let mut record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        );
        record.console = Some("ttyS0,115200".to_string());
        client.add_host(record.clone());
        client.add_disk(root_disk("h1"));
        client.add_memory(Memory {
            id: "m0".to_string(),
            host_id: "h1".to_string(),
            processor: 0,
            platform: 8000,
            ..Default::default()
        });

        let mut profile = dynamic_profile("ttyS0,115200");
        profile.memory = Some(vec![MemoryNodeInfo {
            node: 0,
            functions: vec![MemoryFunctionInfo {
                function: "platform".to_string(),
                page_size: "4KB".to_string(),
                page_count: 10000 * 256,
            }],
        }]);
        store.insert(&host_profile("controller", profile.clone()));
        let mut host = matched_host("controller-1");
        stored_defaults(&mut host, "h1", &console_defaults(), false);
        store.insert(&host);

        reconciler.reconcile(Arc::new(host.clone())).await.expect("reconcile");
        assert!(client.calls_to("update_memory").is_empty());
        assert_eq!(client.write_count(), 0);

        let mut live = LiveHost::load(&client, record).await.unwrap();
        reconciler
            .reconcile_memory(&client, &host, &profile, &mut live)
            .await
            .expect("memory");
        assert!(client.calls_to("update_memory").is_empty());
        assert_eq!(client.memory()[0].platform, 8000);
    }

    #[tokio::test]
    async fn test_processors_follow_the_desired_personality() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        // Live record still reports a controller while the profile makes it
        // a worker; the diff and the reconciler must agree
        let record = platform_host(
            "h1",
            "controller-1",
            PERSONALITY_CONTROLLER,
            ADMIN_LOCKED,
            OPER_DISABLED,
            AVAIL_ONLINE,
        );
        client.add_host(record.clone());
        for (core, function) in [(0, "Platform"), (1, "Applications"), (2, "Applications")] {
            client.add_cpu(cpu(core, function));
        }
        let host = matched_host("controller-1");
        store.insert(&host);

        let desired = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            processors: Some(vec![ProcessorInfo {
                node: 0,
                functions: vec![ProcessorFunctionInfo {
                    function: "platform".to_string(),
                    count: 2,
                }],
            }]),
            ..Default::default()
        };
        let mut live = LiveHost::load(&client, record).await.unwrap();
        let current = profile_of(&live).unwrap();
        let diff = host_diff(
            &ReconcilerConfig::default(),
            SYSTEM_TYPE_STANDARD,
            "controller-1",
            &desired,
            &current,
            &live.host,
        );
        assert!(diff.disabled.contains(&"processors"), "{:?}", diff);

        reconciler
            .reconcile_processors(&client, &host, &desired, &mut live)
            .await
            .expect("processors");
        assert_eq!(client.calls_to("update_cpus"), vec!["update_cpus h1"]);
    }
}
