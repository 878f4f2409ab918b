//! Differences between a composed profile and the live host
//!
//! Differences are split by the administrative state in which they can be
//! applied. Most attributes can only change while the host is locked and
//! disabled; filesystems and locking itself need the host in service, and
//! OSDs follow the provisioning table of [`osd_provisioning_state`].

use crate::config::{names, ReconcilerConfig};
use crds::merge::{equal, merged, Keyed, Merge, Normalize};
use crds::{HostProfileSpec, ADMIN_LOCKED};
use platform_client::{
    Host as HostRecord, PERSONALITY_CONTROLLER, PERSONALITY_STORAGE, SYSTEM_TYPE_ALL_IN_ONE, SYSTEM_TYPE_STANDARD,
};
use std::collections::{BTreeMap, BTreeSet};

/// Administrative state in which OSDs may be provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OsdState {
    Enabled,
    Disabled,
    Any,
    Never,
}

impl OsdState {
    /// Whether OSDs may be changed while the host is enabled (`true`) or
    /// locked and disabled (`false`).
    pub(crate) fn allows(self, enabled: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Enabled => enabled,
            Self::Disabled => !enabled,
            Self::Never => false,
        }
    }
}

pub(crate) fn osd_provisioning_state(system_type: &str, personality: &str) -> OsdState {
    if system_type.eq_ignore_ascii_case(SYSTEM_TYPE_ALL_IN_ONE) {
        return OsdState::Any;
    }
    if system_type.eq_ignore_ascii_case(SYSTEM_TYPE_STANDARD) {
        match personality {
            PERSONALITY_STORAGE => return OsdState::Disabled,
            PERSONALITY_CONTROLLER => return OsdState::Enabled,
            _ => {}
        }
    }
    OsdState::Never
}

/// True when overlaying `desired` on `current` changes nothing.
fn covers_item<T: Merge + Normalize + PartialEq + Clone>(current: &T, desired: &T) -> bool {
    equal(&merged(current, desired), current)
}

/// Every desired element exists and is covered by its live counterpart.
fn covers_subset<T>(desired: Option<&[T]>, current: Option<&[T]>) -> bool
where
    T: Keyed + Merge + Normalize + PartialEq + Clone,
{
    let Some(desired) = desired else {
        return true;
    };
    let current = current.unwrap_or_default();
    desired.iter().all(|d| {
        let key = d.key();
        current
            .iter()
            .find(|c| c.key() == key)
            .is_some_and(|c| covers_item(c, d))
    })
}

/// Like [`covers_subset`], and the live list holds nothing more.
fn covers_exact<T>(desired: Option<&[T]>, current: Option<&[T]>) -> bool
where
    T: Keyed + Merge + Normalize + PartialEq + Clone,
{
    let Some(list) = desired else {
        return true;
    };
    let keys = |items: &[T]| items.iter().map(Keyed::key).collect::<BTreeSet<_>>();
    keys(list) == keys(current.unwrap_or_default()) && covers_subset(desired, current)
}

/// Board management type that disables the controller
pub(crate) const BM_TYPE_NONE: &str = "none";

/// Whether the platform has a board management controller configured.
pub(crate) fn bm_configured(record: &HostRecord) -> bool {
    record.bm_type.as_deref().is_some_and(|t| !t.is_empty() && t != BM_TYPE_NONE)
}

fn same_value<T: PartialEq>(desired: Option<&T>, current: Option<&T>) -> bool {
    desired.is_none_or(|d| current == Some(d))
}

/// Pending changes of a host, grouped by the state that applies them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HostDiff {
    /// Applied while the host is unlocked and enabled
    pub enabled: Vec<&'static str>,
    /// Applied while the host is locked and disabled
    pub disabled: Vec<&'static str>,
}

impl HostDiff {
    pub(crate) fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}

/// Compare the composed profile with the live host.
///
/// `current` is the live host expressed as a profile. Disabled
/// sub-reconcilers are left out of the comparison.
pub(crate) fn host_diff(
    config: &ReconcilerConfig,
    system_type: &str,
    hostname: &str,
    desired: &HostProfileSpec,
    current: &HostProfileSpec,
    record: &HostRecord,
) -> HostDiff {
    let mut diff = HostDiff::default();

    if let Some(admin) = desired.administrative_state.as_deref() {
        if admin != record.administrative_state {
            if admin == ADMIN_LOCKED {
                diff.enabled.push("administrativeState");
            } else {
                diff.disabled.push("administrativeState");
            }
        }
    }

    let subfunctions = |p: &HostProfileSpec| p.subfunctions.clone().map(|s| s.into_iter().collect::<BTreeSet<_>>());
    let attributes_match = record.hostname() == hostname
        && same_value(desired.personality.as_ref(), current.personality.as_ref())
        && subfunctions(desired).is_none_or(|s| Some(s) == subfunctions(current))
        && same_value(desired.location.as_ref(), current.location.as_ref())
        && same_value(desired.install_output.as_ref(), current.install_output.as_ref())
        && same_value(desired.console.as_ref(), current.console.as_ref())
        && same_value(desired.boot_device.as_ref(), current.boot_device.as_ref())
        && same_value(desired.root_device.as_ref(), current.root_device.as_ref())
        && same_value(
            desired.clock_synchronization.as_ref(),
            current.clock_synchronization.as_ref(),
        );
    if !attributes_match {
        diff.disabled.push("attributes");
    }

    if let Some(labels) = desired.labels.as_ref() {
        if *labels != current.labels.clone().unwrap_or_else(BTreeMap::new) {
            diff.disabled.push("labels");
        }
    }

    if config.is_enabled(names::HOST_BMC) {
        let bm_matches = match desired.board_management.as_ref() {
            Some(bm) => {
                (bm.bm_type.is_none() || bm.bm_type == record.bm_type)
                    && (bm.address.is_none() || bm.address == record.bm_address)
            }
            None => !bm_configured(record),
        };
        if !bm_matches {
            diff.disabled.push("boardManagement");
        }
    }

    if let Some(power_on) = desired.power_on {
        if power_on == record.is_powered_off() {
            diff.disabled.push("power");
        }
    }

    if desired.has_worker_subfunction() {
        if config.is_enabled(names::HOST_PROCESSOR)
            && !covers_subset(desired.processors.as_deref(), current.processors.as_deref())
        {
            diff.disabled.push("processors");
        }
        if config.is_enabled(names::HOST_MEMORY)
            && !covers_subset(desired.memory.as_deref(), current.memory.as_deref())
        {
            diff.disabled.push("memory");
        }
    }

    if config.is_enabled(names::HOST_INTERFACE) {
        let wanted = desired.interfaces();
        let live = current.interfaces();
        let interfaces_match = covers_subset(wanted.ethernet.as_deref(), live.ethernet.as_deref())
            && covers_exact(wanted.vlan.as_deref(), live.vlan.as_deref())
            && covers_exact(wanted.bond.as_deref(), live.bond.as_deref());
        if !interfaces_match {
            diff.disabled.push("interfaces");
        }
    }
    if desired.has_worker_subfunction() {
        if config.is_enabled(names::HOST_ADDRESS)
            && !covers_exact(desired.addresses.as_deref(), current.addresses.as_deref())
        {
            diff.disabled.push("addresses");
        }
        if config.is_enabled(names::HOST_ROUTE)
            && !covers_exact(desired.routes.as_deref(), current.routes.as_deref())
        {
            diff.disabled.push("routes");
        }
    }

    let wanted = desired.storage.clone().unwrap_or_default();
    let live = current.storage.clone().unwrap_or_default();
    if config.is_enabled(names::HOST_MONITOR) {
        if let Some(monitor) = wanted.monitor.as_ref() {
            let covered = live
                .monitor
                .as_ref()
                .is_some_and(|m| merged(m, monitor) == *m);
            if !covered {
                diff.disabled.push("monitor");
            }
        }
    }
    if config.is_enabled(names::HOST_VOLUME_GROUP)
        && !covers_subset(wanted.volume_groups.as_deref(), live.volume_groups.as_deref())
    {
        diff.disabled.push("volumeGroups");
    }
    if config.is_enabled(names::HOST_OSD) && !covers_exact(wanted.osds.as_deref(), live.osds.as_deref()) {
        let state = osd_provisioning_state(system_type, desired.personality());
        if state.allows(true) {
            diff.enabled.push("osds");
        }
        if state.allows(false) {
            diff.disabled.push("osds");
        }
    }
    if config.is_enabled(names::HOST_FILESYSTEMS) {
        let current_fs = live.filesystems.unwrap_or_default();
        let grown = wanted.filesystems.iter().flatten().all(|fs| {
            current_fs
                .iter()
                .find(|c| c.name == fs.name)
                .is_some_and(|c| c.size >= fs.size)
        });
        if !grown {
            diff.enabled.push("filesystems");
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::platform_host;
    use crds::{
        FileSystemInfo, MemoryFunctionInfo, MemoryNodeInfo, OsdInfo, ProfileStorageInfo, ADMIN_UNLOCKED,
        PERSONALITY_WORKER,
    };
    use platform_client::{AVAIL_AVAILABLE, AVAIL_ONLINE, OPER_DISABLED, OPER_ENABLED};

    #[test]
    fn test_osd_provisioning_table() {
        let cases = [
            (SYSTEM_TYPE_ALL_IN_ONE, PERSONALITY_CONTROLLER, OsdState::Any),
            (SYSTEM_TYPE_ALL_IN_ONE, PERSONALITY_WORKER, OsdState::Any),
            (SYSTEM_TYPE_STANDARD, PERSONALITY_STORAGE, OsdState::Disabled),
            (SYSTEM_TYPE_STANDARD, PERSONALITY_CONTROLLER, OsdState::Enabled),
            (SYSTEM_TYPE_STANDARD, PERSONALITY_WORKER, OsdState::Never),
        ];
        for (system_type, personality, expected) in cases {
            assert_eq!(
                osd_provisioning_state(system_type, personality),
                expected,
                "{} {}",
                system_type,
                personality
            );
        }

        assert!(OsdState::Any.allows(true) && OsdState::Any.allows(false));
        assert!(OsdState::Enabled.allows(true) && !OsdState::Enabled.allows(false));
        assert!(!OsdState::Disabled.allows(true) && OsdState::Disabled.allows(false));
        assert!(!OsdState::Never.allows(true) && !OsdState::Never.allows(false));
    }

    fn storage_profile(osds: Vec<OsdInfo>) -> HostProfileSpec {
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
    fn test_storage_osd_diff_belongs_to_disabled_phase() {
        let record = platform_host("h1", "storage-0", PERSONALITY_STORAGE, ADMIN_UNLOCKED, OPER_ENABLED, AVAIL_AVAILABLE);
        let desired = storage_profile(vec![OsdInfo {
            function: "osd".to_string(),
            path: "/dev/disk/by-path/pci-0000:00:0d.0-ata-2.0".to_string(),
            ..Default::default()
        }]);
        let current = storage_profile(Vec::new());

        let diff = host_diff(
            &ReconcilerConfig::default(),
            SYSTEM_TYPE_STANDARD,
            "storage-0",
            &desired,
            &current,
            &record,
        );
        assert_eq!(diff.disabled, vec!["osds"]);
        assert!(diff.enabled.is_empty());
    }

    #[test]
    fn test_sparse_profile_is_covered_by_live_state() {
        let record = platform_host("h1", "worker-0", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        let current = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            console: Some("ttyS0,115200".to_string()),
            storage: Some(ProfileStorageInfo {
                filesystems: Some(vec![FileSystemInfo {
                    name: "docker".to_string(),
                    size: 40,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut desired = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            administrative_state: Some(ADMIN_LOCKED.to_string()),
            storage: Some(ProfileStorageInfo {
                filesystems: Some(vec![FileSystemInfo {
                    name: "docker".to_string(),
                    size: 30,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = ReconcilerConfig::default();
        let diff = host_diff(&config, SYSTEM_TYPE_STANDARD, "worker-0", &desired, &current, &record);
        assert!(diff.is_empty(), "{:?}", diff);

        desired.console = Some("tty0".to_string());
        desired.administrative_state = Some(ADMIN_UNLOCKED.to_string());
        let diff = host_diff(&config, SYSTEM_TYPE_STANDARD, "worker-0", &desired, &current, &record);
        assert_eq!(diff.disabled, vec!["administrativeState", "attributes"]);
    }

    #[test]
    fn test_disabled_sub_reconciler_is_not_compared() {
        let record = platform_host("h1", "worker-0", PERSONALITY_WORKER, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
        let desired = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            storage: Some(ProfileStorageInfo {
                filesystems: Some(vec![FileSystemInfo {
                    name: "docker".to_string(),
                    size: 60,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let current = HostProfileSpec {
            personality: Some(PERSONALITY_WORKER.to_string()),
            ..Default::default()
        };

        let config = ReconcilerConfig::default();
        let diff = host_diff(&config, SYSTEM_TYPE_STANDARD, "worker-0", &desired, &current, &record);
        assert_eq!(diff.enabled, vec!["filesystems"]);

        let config = ReconcilerConfig::from_yaml("reconcilers:\n  host.storage:\n    enabled: false\n")
            .unwrap_or_default();
        let diff = host_diff(&config, SYSTEM_TYPE_STANDARD, "worker-0", &desired, &current, &record);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_memory_is_only_compared_for_workers() {
        let memory = |pages: i32| {
            Some(vec![MemoryNodeInfo {
                node: 0,
                functions: vec![MemoryFunctionInfo {
                    function: "platform".to_string(),
                    page_size: "4KB".to_string(),
                    page_count: pages,
                }],
            }])
        };
        let config = ReconcilerConfig::default();

        for (personality, expected) in [(PERSONALITY_CONTROLLER, Vec::new()), (PERSONALITY_WORKER, vec!["memory"])] {
            let record = platform_host("h1", "host-0", personality, ADMIN_LOCKED, OPER_DISABLED, AVAIL_ONLINE);
            let desired = HostProfileSpec {
                personality: Some(personality.to_string()),
                memory: memory(10000 * 256),
                ..Default::default()
            };
            let current = HostProfileSpec {
                personality: Some(personality.to_string()),
                memory: memory(8000 * 256),
                ..Default::default()
            };
            let diff = host_diff(&config, SYSTEM_TYPE_STANDARD, "host-0", &desired, &current, &record);
            assert_eq!(diff.disabled, expected, "{}", personality);
        }
    }
}
