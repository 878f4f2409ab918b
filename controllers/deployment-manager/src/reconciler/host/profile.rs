//! Composite profile of a host
//!
//! A host's effective profile is its profile chain merged from the root
//! down, with the per-host overrides on top and the captured defaults
//! backing whatever is still unset.

use super::diff::BM_TYPE_NONE;
use crate::error::{ControllerError, Result};
use crds::merge::merged;
use crds::{
    BmInfo, Host, HostProfile, HostProfileSpec, MatchInfo, LOOPBACK_INTERFACE, PERSONALITY_WORKER,
    PROVISIONING_DYNAMIC, PROVISIONING_STATIC,
};
use kube::ResourceExt;
use platform_client::CONTROLLER_0;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;

/// Canonical text of an IP address (no leading zeros, lowercase IPv6).
fn canonical_ip(address: &str) -> String {
    address
        .parse::<IpAddr>()
        .map_or_else(|_| address.to_string(), |ip| ip.to_string())
}

/// Profile chain of `start`, leaf first.
fn chain<'a>(profiles: &'a BTreeMap<String, HostProfile>, start: &str) -> Result<Vec<&'a HostProfileSpec>> {
    let mut visited = HashSet::new();
    let mut specs = Vec::new();
    let mut next = Some(start.to_string());

    while let Some(name) = next {
        if !visited.insert(name.clone()) {
            return Err(ControllerError::Validation(format!("profile loop detected at: {}", name)));
        }
        let profile = profiles.get(&name).ok_or_else(|| {
            ControllerError::MissingKubernetesResource(format!("host profile {:?} not present", name))
        })?;
        specs.push(&profile.spec);
        next = profile.spec.base.clone();
    }
    Ok(specs)
}

/// Compose the effective profile of `host` from the profiles of its
/// namespace.
///
/// # Errors
///
/// `MissingKubernetesResource` when a profile of the chain does not exist,
/// `Validation` when the chain loops.
pub(crate) fn compose(host: &Host, profiles: &BTreeMap<String, HostProfile>) -> Result<HostProfileSpec> {
    let specs = chain(profiles, &host.spec.profile)?;

    let mut composite = specs
        .iter()
        .rev()
        .fold(HostProfileSpec::default(), |acc, spec| merged(&acc, spec));
    if let Some(overrides) = &host.spec.overrides {
        composite = merged(&composite, overrides);
    }
    composite.base = None;

    // An explicit empty list only clears what upstream profiles declared;
    // the captured defaults still supply the ethernet interfaces.
    if let Some(interfaces) = composite.interfaces.as_mut() {
        if interfaces.ethernet.as_ref().is_some_and(Vec::is_empty) {
            interfaces.ethernet = None;
        }
    }

    composite.boot_mac = composite.boot_mac.map(|m| m.to_lowercase());
    for address in composite.addresses.iter_mut().flatten() {
        address.address = canonical_ip(&address.address);
    }
    for route in composite.routes.iter_mut().flatten() {
        route.network = canonical_ip(&route.network);
        route.gateway = canonical_ip(&route.gateway);
    }
    if let Some(bonds) = composite.interfaces.as_mut().and_then(|i| i.bond.as_mut()) {
        for bond in bonds {
            bond.members.sort();
        }
    }

    tracing::debug!("Composed profile for host {}: {:?}", host.name_any(), composite);
    Ok(composite)
}

/// Back `composite` with the defaults captured from the live host. Intent
/// only fields are never taken from the defaults.
pub(crate) fn backed_by_defaults(defaults: Option<&HostProfileSpec>, composite: &HostProfileSpec) -> HostProfileSpec {
    let Some(defaults) = defaults else {
        return composite.clone();
    };
    let mut base = defaults.clone();
    base.board_management = None;
    base.provisioning_mode = None;
    base.power_on = None;
    follow_renames(&mut base, composite);
    merged(&base, composite)
}

/// Point the captured addresses, routes and stacked interfaces at the names
/// their ethernet ports carry in the composite.
fn follow_renames(base: &mut HostProfileSpec, composite: &HostProfileSpec) {
    let (Some(captured), Some(declared)) = (base.interfaces.as_ref(), composite.interfaces.as_ref()) else {
        return;
    };
    let renames = captured
        .ethernets()
        .iter()
        .filter_map(|old| {
            declared
                .ethernets()
                .iter()
                .find(|new| new.port.name == old.port.name && new.name != old.name)
                .map(|new| (old.name.clone(), new.name.clone()))
        })
        .collect::<HashMap<_, _>>();
    if renames.is_empty() {
        return;
    }

    let rename = |name: &mut String| {
        if let Some(new) = renames.get(name.as_str()) {
            name.clone_from(new);
        }
    };
    for address in base.addresses.iter_mut().flatten() {
        rename(&mut address.interface);
    }
    for route in base.routes.iter_mut().flatten() {
        rename(&mut route.interface);
    }
    if let Some(interfaces) = base.interfaces.as_mut() {
        for vlan in interfaces.vlan.iter_mut().flatten() {
            rename(&mut vlan.lower);
        }
        for bond in interfaces.bond.iter_mut().flatten() {
            for member in &mut bond.members {
                rename(member);
            }
        }
    }
}

fn validate_board_management(bm: &BmInfo) -> Result<()> {
    let Some(bm_type) = bm.bm_type.as_deref() else {
        return Err(ControllerError::Validation(
            "board management 'type' is a required attribute".to_string(),
        ));
    };
    if bm_type == BM_TYPE_NONE {
        return Ok(());
    }
    let Some(credentials) = bm.credentials.as_ref() else {
        return Err(ControllerError::Validation(
            "board management 'credentials' is a required attribute".to_string(),
        ));
    };
    if credentials.password.as_ref().is_none_or(|p| p.secret.is_empty()) {
        return Err(ControllerError::Validation(
            "board management 'password' is a required attribute".to_string(),
        ));
    }
    if bm.address.is_none() {
        return Err(ControllerError::Validation(
            "board management 'address' is a required attribute".to_string(),
        ));
    }
    Ok(())
}

fn validate_interfaces(profile: &HostProfileSpec) -> Result<()> {
    let interfaces = profile.interfaces();
    let mut names = HashSet::new();
    let all = interfaces
        .ethernets()
        .iter()
        .map(|e| ("ethernet", e.name.as_str()))
        .chain(interfaces.bonds().iter().map(|b| ("bond", b.name.as_str())))
        .chain(interfaces.vlans().iter().map(|v| ("vlan", v.name.as_str())));
    for (kind, name) in all {
        if !names.insert(name) {
            return Err(ControllerError::Validation(format!(
                "interface names must be unique; {} {} is a duplicate",
                kind, name
            )));
        }
    }

    for ethernet in interfaces.ethernets() {
        let loopback = ethernet.name == LOOPBACK_INTERFACE || ethernet.port.name == LOOPBACK_INTERFACE;
        if loopback && ethernet.name != ethernet.port.name {
            return Err(ControllerError::Validation(
                "the loopback interface must reference a port with the same name".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_addresses(profile: &HostProfileSpec) -> Result<()> {
    let invalid = |value: &str| value.parse::<IpAddr>().is_err();
    for address in profile.addresses() {
        if invalid(&address.address) {
            return Err(ControllerError::Validation(format!(
                "address {:?} is not a valid IPv4 or IPv6 address",
                address.address
            )));
        }
    }
    for route in profile.routes() {
        if invalid(&route.network) || invalid(&route.gateway) {
            return Err(ControllerError::Validation(format!(
                "route {}/{} via {:?} is not made of valid IPv4 or IPv6 addresses",
                route.network, route.prefix, route.gateway
            )));
        }
    }
    Ok(())
}

/// Check that a composed profile carries everything provisioning needs.
///
/// # Errors
///
/// Returns `Validation` naming the first violated rule.
pub(crate) fn validate(hostname: &str, match_info: Option<&MatchInfo>, profile: &HostProfileSpec) -> Result<()> {
    let Some(personality) = profile.personality.as_deref() else {
        return Err(ControllerError::Validation(
            "'personality' is a mandatory profile attribute".to_string(),
        ));
    };

    if profile.processors.is_some() && !profile.has_worker_subfunction() {
        return Err(ControllerError::Validation(
            "'processors' profile attributes are only supported on nodes which include the worker subfunction"
                .to_string(),
        ));
    }

    if personality != PERSONALITY_WORKER && profile.storage.as_ref().is_some_and(|s| s.monitor.is_some()) {
        return Err(ControllerError::Validation(
            "'monitor' profile attributes are only permitted on worker nodes".to_string(),
        ));
    }

    match profile.provisioning_mode.as_deref() {
        None => {
            return Err(ControllerError::Validation(
                "'provisioningMode' is a mandatory profile attribute".to_string(),
            ));
        }
        Some(PROVISIONING_STATIC) => {
            if hostname == CONTROLLER_0 {
                return Err(ControllerError::Validation(
                    "the primary controller must be provisioned dynamically".to_string(),
                ));
            }
            if profile.boot_mac.is_none() {
                return Err(ControllerError::Validation(
                    "'bootMAC' profile attribute is required for static provisioning".to_string(),
                ));
            }
        }
        Some(PROVISIONING_DYNAMIC) => {
            if match_info.is_none_or(MatchInfo::is_empty) {
                return Err(ControllerError::Validation(
                    "'match' host attribute is required for dynamic provisioning".to_string(),
                ));
            }
        }
        Some(other) => {
            return Err(ControllerError::Validation(format!("unknown provisioning mode {:?}", other)));
        }
    }

    validate_interfaces(profile)?;
    if let Some(bm) = profile.board_management.as_ref() {
        validate_board_management(bm)?;
    }
    validate_addresses(profile)
}
