//! Unit tests for profile composition and validation

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::host::profile::{backed_by_defaults, compose, validate};
    use crate::test_utils::*;
    use crds::{
        AddressInfo, BmCredentials, BmInfo, BmPasswordInfo, EthernetInfo, EthernetPortInfo, HostProfile,
        HostProfileSpec, InterfaceInfo, MatchInfo, ProcessorInfo, RouteInfo, VlanInfo, PERSONALITY_CONTROLLER,
        PERSONALITY_WORKER, PROVISIONING_DYNAMIC, PROVISIONING_STATIC,
    };
    use std::collections::BTreeMap;

    fn profiles(items: Vec<HostProfile>) -> BTreeMap<String, HostProfile> {
        items.into_iter().map(|p| (p.metadata.name.clone().unwrap_or_default(), p)).collect()
    }

    fn ethernet(name: &str, port: &str) -> EthernetInfo {
        EthernetInfo {
            name: name.to_string(),
            class: "platform".to_string(),
            port: EthernetPortInfo { name: port.to_string() },
            ..Default::default()
        }
    }

    fn valid_worker() -> HostProfileSpec {
        HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            provisioning_mode: Some(PROVISIONING_STATIC.to_string()),
            boot_mac: Some("08:00:27:3a:bc:02".to_string()),
            ..Default::default()
        }
    }

    fn validation_message(result: crate::error::Result<()>) -> String {
        match result {
            Err(ControllerError::Validation(message)) => message,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_compose_layers_chain_and_overrides() {
        let all = profiles(vec![
            host_profile("common", HostProfileSpec {
                personality: Some(PERSONALITY_WORKER.to_string()),
                console: Some("ttyS0,115200".to_string()),
                install_output: Some("text".to_string()),
                labels: Some(BTreeMap::from([("sriov".to_string(), "enabled".to_string())])),
                ..Default::default()
            }),
            host_profile("worker", HostProfileSpec {
                base: Some("common".to_string()),
                console: Some("tty0".to_string()),
                labels: Some(BTreeMap::from([("zone".to_string(), "a".to_string())])),
                ..Default::default()
            }),
        ]);
        let mut host = host("worker-1", "worker");
        host.spec.overrides = Some(HostProfileSpec {
            location: Some("rack 7".to_string()),
            install_output: Some("graphical".to_string()),
            ..Default::default()
        });

        let composite = compose(&host, &all).unwrap();
        assert_eq!(composite.base, None);
        assert_eq!(composite.personality.as_deref(), Some(PERSONALITY_WORKER));
        assert_eq!(composite.console.as_deref(), Some("tty0"));
        assert_eq!(composite.install_output.as_deref(), Some("graphical"));
        assert_eq!(composite.location.as_deref(), Some("rack 7"));
        let labels = composite.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("zone").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_compose_rejects_profile_loop() {
        let all = profiles(vec![
            host_profile("a", HostProfileSpec {
                base: Some("b".to_string()),
                ..Default::default()
            }),
            host_profile("b", HostProfileSpec {
                base: Some("a".to_string()),
                ..Default::default()
            }),
        ]);

        let err = compose(&host("worker-1", "a"), &all).unwrap_err();
        assert!(matches!(err, ControllerError::Validation(ref m) if m.contains("loop")), "{:?}", err);
    }

    #[test]
    fn test_compose_requires_every_profile_of_chain() {
        let all = profiles(vec![host_profile("worker", HostProfileSpec {
            base: Some("missing".to_string()),
            ..Default::default()
        })]);

        let err = compose(&host("worker-1", "worker"), &all).unwrap_err();
        assert!(matches!(err, ControllerError::MissingKubernetesResource(_)), "{:?}", err);
    }

    #[test]
    fn test_compose_normalizes_values() {
        let all = profiles(vec![host_profile("worker", HostProfileSpec {
            boot_mac: Some("08:00:27:3A:BC:02".to_string()),
            addresses: Some(vec![AddressInfo {
                interface: "data0".to_string(),
                address: "FD00:0:0:0::0010".to_string(),
                prefix: 64,
            }]),
            routes: Some(vec![RouteInfo {
                interface: "data0".to_string(),
                network: "FD01:0::".to_string(),
                prefix: 64,
                gateway: "fd00::1".to_string(),
                metric: None,
            }]),
            ..Default::default()
        })]);

        let composite = compose(&host("worker-1", "worker"), &all).unwrap();
        assert_eq!(composite.boot_mac.as_deref(), Some("08:00:27:3a:bc:02"));
        assert_eq!(composite.addresses.unwrap()[0].address, "fd00::10");
        assert_eq!(composite.routes.unwrap()[0].network, "fd01::");
    }

    #[test]
    fn test_empty_ethernet_list_falls_back_to_defaults() {
        let all = profiles(vec![
            host_profile("common", HostProfileSpec {
                interfaces: Some(InterfaceInfo {
                    ethernet: Some(vec![ethernet("mgmt0", "enp0s8")]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            host_profile("worker", HostProfileSpec {
                base: Some("common".to_string()),
                interfaces: Some(InterfaceInfo {
                    ethernet: Some(Vec::new()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        ]);

        let composite = compose(&host("worker-1", "worker"), &all).unwrap();
        assert_eq!(composite.interfaces.as_ref().and_then(|i| i.ethernet.as_ref()), None);

        let defaults = HostProfileSpec {
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("enp0s3", "enp0s3")]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let desired = backed_by_defaults(Some(&defaults), &composite);
        let ethernets = desired.interfaces.and_then(|i| i.ethernet).unwrap();
        assert_eq!(ethernets.len(), 1);
        assert_eq!(ethernets[0].port.name, "enp0s3");
    }

    #[test]
    fn test_defaults_follow_interface_rename() {
        let defaults = HostProfileSpec {
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("data0", "enp0s3"), ethernet("mgmt0", "enp0s8")]),
                vlan: Some(vec![VlanInfo {
                    name: "vlan10".to_string(),
                    class: "data".to_string(),
                    lower: "data0".to_string(),
                    vid: 10,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            addresses: Some(vec![
                AddressInfo {
                    interface: "data0".to_string(),
                    address: "10.10.10.5".to_string(),
                    prefix: 24,
                },
                AddressInfo {
                    interface: "mgmt0".to_string(),
                    address: "192.168.204.5".to_string(),
                    prefix: 24,
                },
            ]),
            routes: Some(vec![RouteInfo {
                interface: "data0".to_string(),
                network: "10.20.0.0".to_string(),
                prefix: 16,
                gateway: "10.10.10.1".to_string(),
                metric: Some(1),
            }]),
            ..Default::default()
        };
        let composite = HostProfileSpec {
            interfaces: Some(InterfaceInfo {
                ethernet: Some(vec![ethernet("data1", "enp0s3")]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let desired = backed_by_defaults(Some(&defaults), &composite);
        let addresses = desired.addresses.clone().unwrap_or_default();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].interface, "data1");
        assert_eq!(addresses[1].interface, "mgmt0");
        assert_eq!(desired.routes.clone().unwrap_or_default()[0].interface, "data1");
        let interfaces = desired.interfaces.unwrap_or_default();
        assert_eq!(interfaces.vlan.unwrap_or_default()[0].lower, "data1");
        let names = interfaces
            .ethernet
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["data1", "mgmt0"]);

        // The captured snapshot itself is left untouched
        assert_eq!(defaults.addresses.unwrap_or_default()[0].interface, "data0");
    }

    #[test]
    fn test_defaults_back_unset_attributes_but_not_intent() {
        let defaults = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            console: Some("ttyS0,115200".to_string()),
            root_device: Some("/dev/sda".to_string()),
            power_on: Some(false),
            provisioning_mode: Some(PROVISIONING_DYNAMIC.to_string()),
            board_management: Some(BmInfo {
                bm_type: Some("ipmi".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let composite = HostProfileSpec {
            console: Some("tty0".to_string()),
            ..Default::default()
        };

        let desired = backed_by_defaults(Some(&defaults), &composite);
        assert_eq!(desired.console.as_deref(), Some("tty0"));
        assert_eq!(desired.root_device.as_deref(), Some("/dev/sda"));
        assert_eq!(desired.personality.as_deref(), Some(PERSONALITY_WORKER));
        assert_eq!(desired.power_on, None);
        assert_eq!(desired.provisioning_mode, None);
        assert_eq!(desired.board_management, None);

        assert_eq!(backed_by_defaults(None, &composite), composite);
    }

    #[test]
    fn test_validate_accepts_complete_profiles() {
        validate("worker-1", None, &valid_worker()).unwrap();

        let dynamic = HostProfileSpec {
            personality: Some(PERSONALITY_CONTROLLER.to_string()),
            provisioning_mode: Some(PROVISIONING_DYNAMIC.to_string()),
            ..Default::default()
        };
        let info = MatchInfo {
            boot_mac: Some("08:00:27:3a:bc:01".to_string()),
            ..Default::default()
        };
        validate("controller-0", Some(&info), &dynamic).unwrap();
    }

    #[test]
    fn test_validate_provisioning_rules() {
        let mut profile = valid_worker();
        profile.personality = None;
        assert!(validation_message(validate("worker-1", None, &profile)).contains("personality"));

        let mut profile = valid_worker();
        profile.provisioning_mode = None;
        assert!(validation_message(validate("worker-1", None, &profile)).contains("provisioningMode"));

        let profile = valid_worker();
        assert!(validation_message(validate("controller-0", None, &profile)).contains("dynamically"));

        let mut profile = valid_worker();
        profile.boot_mac = None;
        assert!(validation_message(validate("worker-1", None, &profile)).contains("bootMAC"));

        let mut profile = valid_worker();
        profile.provisioning_mode = Some(PROVISIONING_DYNAMIC.to_string());
        assert!(validation_message(validate("worker-1", Some(&MatchInfo::default()), &profile)).contains("match"));
    }

    #[test]
    fn test_validate_worker_only_attributes() {
        let mut profile = valid_worker();
        profile.personality = Some(PERSONALITY_CONTROLLER.to_string());
        profile.processors = Some(vec![ProcessorInfo {
            node: 0,
            functions: Vec::new(),
        }]);
        assert!(validation_message(validate("controller-1", None, &profile)).contains("processors"));
    }

    #[test]
    fn test_validate_interfaces_and_addresses() {
        let mut profile = valid_worker();
        profile.interfaces = Some(InterfaceInfo {
            ethernet: Some(vec![ethernet("data0", "enp0s3")]),
            vlan: Some(vec![VlanInfo {
                name: "data0".to_string(),
                class: "data".to_string(),
                lower: "data0".to_string(),
                vid: 10,
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(validation_message(validate("worker-1", None, &profile)).contains("duplicate"));

        let mut profile = valid_worker();
        profile.interfaces = Some(InterfaceInfo {
            ethernet: Some(vec![ethernet("lo", "enp0s3")]),
            ..Default::default()
        });
        assert!(validation_message(validate("worker-1", None, &profile)).contains("loopback"));

        let mut profile = valid_worker();
        profile.addresses = Some(vec![AddressInfo {
            interface: "data0".to_string(),
            address: "192.168.300.1".to_string(),
            prefix: 24,
        }]);
        assert!(validation_message(validate("worker-1", None, &profile)).contains("192.168.300.1"));
    }

    #[test]
    fn test_validate_board_management() {
        let mut profile = valid_worker();
        profile.board_management = Some(BmInfo {
            bm_type: Some("none".to_string()),
            ..Default::default()
        });
        validate("worker-1", None, &profile).unwrap();

        profile.board_management = Some(BmInfo {
            bm_type: Some("dynamic".to_string()),
            address: Some("10.10.10.3".to_string()),
            ..Default::default()
        });
        assert!(validation_message(validate("worker-1", None, &profile)).contains("credentials"));

        profile.board_management = Some(BmInfo {
            bm_type: Some("dynamic".to_string()),
            address: None,
            credentials: Some(BmCredentials {
                password: Some(BmPasswordInfo {
                    secret: "bmc-secret".to_string(),
                }),
            }),
        });
        assert!(validation_message(validate("worker-1", None, &profile)).contains("address"));
    }
}
