//! Unit tests for host interface, address and route reconciliation

#[cfg(test)]
mod tests {
    use crate::reconciler::host::defaults::LiveHost;
    use crate::reconciler::host::networking::{
        binding_changes, bond_update, ethernet_update, interface_update, stale_addresses, stale_interfaces,
        stale_routes, Addressing, Planner,
    };
    use crate::test_utils::*;
    use crds::{
        AddressInfo, BondInfo, EthernetInfo, EthernetPortInfo, HostProfileSpec, InterfaceInfo, RouteInfo, VlanInfo,
    };
    use platform_client::{
        Address, AddressPool, Interface, MockPlatformClient, Port, Route, ADDRESS_MODE_DISABLED, ADDRESS_MODE_POOL,
        ADDRESS_MODE_STATIC, ADMIN_LOCKED, AVAIL_ONLINE, IF_TYPE_AE, IF_TYPE_ETHERNET, IF_TYPE_VLAN, OPER_DISABLED,
        PERSONALITY_WORKER,
    };
    use std::sync::Arc;

    fn port(name: &str, interface_id: &str) -> Port {
        Port {
            id: format!("port-{}", name),
            host_id: "h1".to_string(),
            name: name.to_string(),
            pci_address: "0000:00:03.0".to_string(),
            interface_id: interface_id.to_string(),
        }
    }

    fn iface(id: &str, name: &str, if_type: &str, class: &str) -> Interface {
        Interface {
            id: id.to_string(),
            host_id: "h1".to_string(),
            name: name.to_string(),
            if_type: if_type.to_string(),
            class: Some(class.to_string()),
            mtu: 1500,
            ..Default::default()
        }
    }

    fn vlan_iface(id: &str, name: &str, lower: &str, vid: i32) -> Interface {
        Interface {
            vid: Some(vid),
            uses: vec![lower.to_string()],
            ..iface(id, name, IF_TYPE_VLAN, "data")
        }
    }

    fn ethernet(name: &str, port: &str, class: &str) -> EthernetInfo {
        EthernetInfo {
            name: name.to_string(),
            class: class.to_string(),
            port: EthernetPortInfo { name: port.to_string() },
            ..Default::default()
        }
    }

    fn vlan(name: &str, lower: &str, vid: i32) -> VlanInfo {
        VlanInfo {
            name: name.to_string(),
            class: "data".to_string(),
            lower: lower.to_string(),
            vid,
            ..Default::default()
        }
    }

    fn route(id: &str, interface: &str, network: &str, metric: i32) -> Route {
        Route {
            id: id.to_string(),
            network: network.to_string(),
            prefix: 24,
            gateway: "192.168.10.1".to_string(),
            metric,
            interface_name: interface.to_string(),
            interface_id: String::new(),
        }
    }

    /// One ethernet named after its port, with a VLAN on top.
    fn live_host() -> LiveHost {
        LiveHost {
            host: platform_host("h1", "worker-1", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE),
            ports: vec![port("enp0s3", "if-1"), port("enp0s8", "if-3")],
            interfaces: vec![
                iface("if-1", "enp0s3", IF_TYPE_ETHERNET, "none"),
                vlan_iface("if-2", "vlan10", "enp0s3", 10),
                iface("if-3", "enp0s8", IF_TYPE_ETHERNET, "none"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_routes_survive_interface_rename() {
        let live = live_host();
        let declared = InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
            ..Default::default()
        };
        let planner = Planner::new(&declared, &live);

        let routes = vec![
            route("r1", "enp0s3", "10.10.0.0", 1),
            route("r2", "enp0s8", "10.20.0.0", 1),
        ];
        let wanted = vec![RouteInfo {
            interface: "data0".to_string(),
            network: "10.10.0.0".to_string(),
            prefix: 24,
            gateway: "192.168.10.1".to_string(),
            metric: None,
        }];

        let stale = stale_routes(&planner, &wanted, &routes);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "r2");
    }

    #[test]
    fn test_route_with_different_metric_is_stale() {
        let live = live_host();
        let declared = InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
            ..Default::default()
        };
        let planner = Planner::new(&declared, &live);

        let routes = vec![route("r1", "enp0s3", "10.10.0.0", 5)];
        let wanted = vec![RouteInfo {
            interface: "data0".to_string(),
            network: "10.10.0.0".to_string(),
            prefix: 24,
            gateway: "192.168.10.1".to_string(),
            metric: Some(1),
        }];
        assert_eq!(stale_routes(&planner, &wanted, &routes).len(), 1);
    }

    #[test]
    fn test_pool_addresses_are_never_stale() {
        let live = live_host();
        let declared = InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
            ..Default::default()
        };
        let planner = Planner::new(&declared, &live);

        let addresses = vec![
            Address {
                id: "a1".to_string(),
                address: "fd00:0::10".to_string(),
                prefix: 64,
                interface_name: "enp0s3".to_string(),
                ..Default::default()
            },
            Address {
                id: "a2".to_string(),
                address: "192.168.204.5".to_string(),
                prefix: 24,
                interface_name: "enp0s3".to_string(),
                pool_uuid: Some("pool-1".to_string()),
                ..Default::default()
            },
            Address {
                id: "a3".to_string(),
                address: "10.0.0.5".to_string(),
                prefix: 24,
                interface_name: "enp0s3".to_string(),
                ..Default::default()
            },
        ];
        let wanted = vec![AddressInfo {
            interface: "data0".to_string(),
            address: "fd00::10".to_string(),
            prefix: 64,
        }];

        let stale = stale_addresses(&planner, &wanted, &addresses);
        assert_eq!(stale.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["a3"]);
    }

    #[test]
    fn test_vlan_follows_renamed_lower_but_not_vid_change() {
        let live = live_host();

        let declared = InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
            vlan: Some(vec![vlan("tenant", "data0", 10)]),
            ..Default::default()
        };
        let planner = Planner::new(&declared, &live);
        assert!(stale_interfaces(&planner, &live.interfaces).is_empty());

        let declared = InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
            vlan: Some(vec![vlan("tenant", "data0", 11)]),
            ..Default::default()
        };
        let planner = Planner::new(&declared, &live);
        let stale = stale_interfaces(&planner, &live.interfaces);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].name, "vlan10");
    }

    #[test]
    fn test_stale_vlans_are_removed_before_bonds() {
        let mut live = live_host();
        live.interfaces.push(Interface {
            uses: vec!["enp0s8".to_string()],
            ae_mode: Some("active_standby".to_string()),
            ..iface("if-4", "bond0", IF_TYPE_AE, "platform")
        });
        live.interfaces.push(vlan_iface("if-5", "vlan20", "bond0", 20));

        let declared = InterfaceInfo::default();
        let planner = Planner::new(&declared, &live);
        let names = stale_interfaces(&planner, &live.interfaces)
            .into_iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["vlan10", "vlan20", "bond0"]);
    }

    #[test]
    fn test_binding_changes() {
        let current = vec!["mgmt".to_string(), "cluster-host".to_string()];

        let (removed, added) = binding_changes(&current, None);
        assert!(removed.is_empty() && added.is_empty());

        let declared = vec!["mgmt".to_string(), "oam".to_string()];
        let (removed, added) = binding_changes(&current, Some(&declared));
        assert_eq!(removed, vec!["cluster-host"]);
        assert_eq!(added, vec!["oam"]);
    }

    #[test]
    fn test_interface_update_addressing_modes() {
        let pools = vec![AddressPool {
            id: "pool-v6".to_string(),
            name: "tenant-v6".to_string(),
            network: "fd10::".to_string(),
            prefix: 64,
            ..Default::default()
        }];
        let addresses = vec![AddressInfo {
            interface: "data0".to_string(),
            address: "10.0.0.5".to_string(),
            prefix: 24,
        }];
        let addressing = Addressing {
            addresses: &addresses,
            pools: &pools,
        };

        let mut info = ethernet("data0", "enp0s3", "data");
        info.platform_networks = Some(vec!["tenant-v6".to_string()]);
        info.mtu = Some(9000);
        let live = iface("if-1", "enp0s3", IF_TYPE_ETHERNET, "none");

        let opts = interface_update(&info, &live, &addressing);
        assert_eq!(opts.name.as_deref(), Some("data0"));
        assert_eq!(opts.class.as_deref(), Some("data"));
        assert_eq!(opts.mtu, Some(9000));
        assert_eq!(opts.ipv4_mode.as_deref(), Some(ADDRESS_MODE_STATIC));
        assert_eq!(opts.ipv6_mode.as_deref(), Some(ADDRESS_MODE_POOL));
        assert_eq!(opts.ipv6_pool.as_deref(), Some("pool-v6"));

        // Platform interfaces without static addresses keep their modes
        let info = ethernet("mgmt0", "enp0s8", "platform");
        let live = Interface {
            ipv4_mode: Some(ADDRESS_MODE_DISABLED.to_string()),
            ..iface("if-3", "mgmt0", IF_TYPE_ETHERNET, "platform")
        };
        assert!(interface_update(&info, &live, &addressing).is_empty());
    }

    #[test]
    fn test_ethernet_update_resets_undeclared_vf_count() {
        let addressing = Addressing {
            addresses: &[],
            pools: &[],
        };
        let mut info = ethernet("sriov0", "enp0s3", "pci-sriov");
        let live = Interface {
            vf_count: Some(4),
            vf_driver: Some("vfio".to_string()),
            ..iface("if-1", "sriov0", IF_TYPE_ETHERNET, "pci-sriov")
        };

        let opts = ethernet_update(&info, &live, &addressing);
        assert_eq!(opts.vf_count, Some(0));
        assert_eq!(opts.vf_driver, None);

        info.vf_count = Some(8);
        info.vf_driver = Some("netdevice".to_string());
        let opts = ethernet_update(&info, &live, &addressing);
        assert_eq!(opts.vf_count, Some(8));
        assert_eq!(opts.vf_driver.as_deref(), Some("netdevice"));
    }

    #[test]
    fn test_bond_update_members_and_mode() {
        let addressing = Addressing {
            addresses: &[],
            pools: &[],
        };
        let info = BondInfo {
            name: "bond0".to_string(),
            class: "platform".to_string(),
            members: vec!["enp0s3".to_string(), "enp0s8".to_string()],
            mode: "802.3ad".to_string(),
            transmit_hash_policy: Some("layer3+4".to_string()),
            ..Default::default()
        };
        let live = Interface {
            uses: vec!["enp0s3".to_string()],
            ae_mode: Some("active_standby".to_string()),
            ae_transmit_hash: Some("layer2".to_string()),
            ..iface("if-4", "bond0", IF_TYPE_AE, "platform")
        };

        let opts = bond_update(&info, &live, &addressing);
        assert_eq!(opts.ae_mode.as_deref(), Some("802.3ad"));
        assert_eq!(opts.ae_transmit_hash.as_deref(), Some("layer3+4"));
        assert_eq!(opts.uses_modify.as_deref(), Some("enp0s3,enp0s8"));
        assert_eq!(opts.name, None);
    }

    #[tokio::test]
    async fn test_vid_change_replaces_vlan() {
        let store = Arc::new(MockResourceStore::new());
        let client = MockPlatformClient::new("https://mock");
        let reconciler = reconciler(&store, &client);

        let record = platform_host("h1", "worker-1", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        client.add_host(record.clone());
        client.add_port(port("enp0s3", "if-1"));
        client.add_interface(iface("if-1", "data0", IF_TYPE_ETHERNET, "data"));
        client.add_interface(vlan_iface("if-2", "vlan10", "data0", 10));

        let host = host("worker-1", "worker");
        store.insert(&host);
        let desired = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("data0", "enp0s3", "data")]),
                vlan: Some(vec![vlan("vlan11", "data0", 11)]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut live = LiveHost::load(&client, record).await.unwrap();
        reconciler
            .reconcile_networking(&client, &host, &desired, &mut live)
            .await
            .expect("networking");

        assert_eq!(client.calls_to("delete_interface"), vec!["delete_interface if-2"]);
        let vlans = client
            .interfaces()
            .into_iter()
            .filter(|i| i.if_type == IF_TYPE_VLAN)
            .collect::<Vec<_>>();
        assert_eq!(vlans.len(), 1);
        assert_eq!(vlans[0].name, "vlan11");
        assert_eq!(vlans[0].vid, Some(11));
        assert_eq!(vlans[0].uses, vec!["data0"]);
        assert!(client.calls_to("update_interface").is_empty());

        assert!(store.has_event("Deleted", "stale interface \"vlan10\" has been deleted"));
        assert!(store.has_event("Created", "vlan interface \"vlan11\" has been created"));
        assert!(live.interface_named("vlan11").is_some());
    }
}
