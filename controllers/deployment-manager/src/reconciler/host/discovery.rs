//! Binding Host objects to platform host records

use crds::MatchInfo;
use platform_client::{Host, CONTROLLER_0};

fn same(expected: &str, actual: Option<&String>) -> bool {
    actual.is_some_and(|a| a.eq_ignore_ascii_case(expected))
}

/// True when every attribute specified in `info` equals the host's value,
/// ignoring case. Criteria with no attribute never match.
pub(crate) fn host_matches(host: &Host, info: &MatchInfo) -> bool {
    let mut checked = 0;

    if let Some(mac) = &info.boot_mac {
        if !same(mac, host.boot_mac.as_ref()) {
            return false;
        }
        checked += 1;
    }

    if let Some(bm) = &info.board_management {
        if !same(&bm.address, host.bm_address.as_ref()) {
            return false;
        }
        checked += 1;
    }

    if let Some(dmi) = &info.dmi {
        if let Some(serial) = &dmi.serial_number {
            if !same(serial, host.serial_number.as_ref()) {
                return false;
            }
            checked += 1;
        }
        if let Some(tag) = &dmi.asset_tag {
            if !same(tag, host.asset_tag.as_ref()) {
                return false;
            }
            checked += 1;
        }
    }

    checked > 0
}

/// Find the platform record of a host.
///
/// Lookup order: hostname, then the match criteria (only against records
/// that are unnamed or carry the same name), then the boot MAC.
pub(crate) fn find_host<'a>(
    hosts: &'a [Host],
    hostname: &str,
    match_info: Option<&MatchInfo>,
    boot_mac: Option<&str>,
) -> Option<&'a Host> {
    if let Some(host) = hosts.iter().find(|h| h.hostname() == hostname) {
        return Some(host);
    }

    if let Some(info) = match_info {
        let found = hosts
            .iter()
            .filter(|h| h.hostname().is_empty() || h.hostname() == hostname)
            .find(|h| host_matches(h, info));
        if found.is_some() {
            return found;
        }
    }

    let mac = boot_mac?;
    hosts
        .iter()
        .find(|h| h.boot_mac.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(mac)))
}

/// Controller through which the rest of the system is provisioned: the
/// active controller when one is reported, otherwise controller-0.
pub(crate) fn primary_controller(hosts: &[Host]) -> Option<&Host> {
    hosts
        .iter()
        .find(|h| h.is_active_controller())
        .or_else(|| hosts.iter().find(|h| h.hostname() == CONTROLLER_0))
}

/// Other hosts may only be created or configured once the primary controller
/// is in service.
pub(crate) fn provisioning_allowed(hosts: &[Host]) -> bool {
    primary_controller(hosts).is_some_and(Host::is_unlocked_enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{MatchBmInfo, MatchDmiInfo};
    use platform_client::{ACTIVE_CONTROLLER, ADMIN_LOCKED, ADMIN_UNLOCKED, OPER_DISABLED, OPER_ENABLED};

    fn record(id: &str, hostname: Option<&str>, mac: &str) -> Host {
        Host {
            id: id.to_string(),
            hostname: hostname.map(str::to_string),
            boot_mac: Some(mac.to_string()),
            serial_number: Some("SN-1".to_string()),
            bm_address: Some("10.10.10.1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_requires_every_specified_attribute() {
        let host = record("h1", None, "AA:BB:CC:DD:EE:01");
        let by_mac = MatchInfo {
            boot_mac: Some("aa:bb:cc:dd:ee:01".to_string()),
            ..Default::default()
        };
        assert!(host_matches(&host, &by_mac));

        let conflicting = MatchInfo {
            boot_mac: Some("aa:bb:cc:dd:ee:01".to_string()),
            dmi: Some(MatchDmiInfo {
                serial_number: Some("SN-2".to_string()),
                asset_tag: None,
            }),
            ..Default::default()
        };
        assert!(!host_matches(&host, &conflicting));

        let by_bmc = MatchInfo {
            board_management: Some(MatchBmInfo {
                address: "10.10.10.1".to_string(),
            }),
            ..Default::default()
        };
        assert!(host_matches(&host, &by_bmc));
        assert!(!host_matches(&host, &MatchInfo::default()));
    }

    #[test]
    fn test_find_host_order() {
        let hosts = vec![
            record("h1", Some("worker-0"), "aa:bb:cc:dd:ee:01"),
            record("h2", None, "aa:bb:cc:dd:ee:02"),
        ];
        let info = MatchInfo {
            boot_mac: Some("aa:bb:cc:dd:ee:02".to_string()),
            ..Default::default()
        };

        assert_eq!(find_host(&hosts, "worker-0", Some(&info), None).map(|h| h.id.as_str()), Some("h1"));
        assert_eq!(find_host(&hosts, "worker-1", Some(&info), None).map(|h| h.id.as_str()), Some("h2"));
        assert_eq!(
            find_host(&hosts, "worker-1", None, Some("AA:BB:CC:DD:EE:02")).map(|h| h.id.as_str()),
            Some("h2")
        );
        assert!(find_host(&hosts, "worker-1", None, None).is_none());
    }

    #[test]
    fn test_criteria_skip_hosts_named_differently() {
        let hosts = vec![record("h1", Some("worker-0"), "aa:bb:cc:dd:ee:01")];
        let info = MatchInfo {
            boot_mac: Some("aa:bb:cc:dd:ee:01".to_string()),
            ..Default::default()
        };
        assert!(find_host(&hosts, "worker-1", Some(&info), None).is_none());
    }

    #[test]
    fn test_primary_controller_prefers_active() {
        let mut c0 = record("h0", Some("controller-0"), "aa:bb:cc:dd:ee:00");
        c0.administrative_state = ADMIN_LOCKED.to_string();
        c0.operational_status = OPER_DISABLED.to_string();
        let mut c1 = record("h1", Some("controller-1"), "aa:bb:cc:dd:ee:01");
        c1.capabilities.personality = Some(ACTIVE_CONTROLLER.to_string());
        c1.administrative_state = ADMIN_UNLOCKED.to_string();
        c1.operational_status = OPER_ENABLED.to_string();

        let hosts = vec![c0.clone(), c1];
        assert_eq!(primary_controller(&hosts).map(|h| h.id.as_str()), Some("h1"));
        assert!(provisioning_allowed(&hosts));

        let hosts = vec![c0];
        assert_eq!(primary_controller(&hosts).map(|h| h.id.as_str()), Some("h0"));
        assert!(!provisioning_allowed(&hosts));
    }
}
