//! Host operations for MockPlatformClient
//!
//! Handles hosts, host actions and labels. Actions move the host through
//! its administrative/operational/availability states immediately.

use std::collections::BTreeMap;

use super::helpers::{get, get_mut, new_id, remove, set_opt};
use super::MockPlatformClient;
use crate::error::PlatformError;
use crate::models::*;

pub async fn list_hosts(client: &MockPlatformClient) -> Result<Vec<Host>, PlatformError> {
    client.enter("list_hosts", "")?;
    Ok(client.state().hosts.clone())
}

pub async fn get_host(client: &MockPlatformClient, id: &str) -> Result<Host, PlatformError> {
    client.enter("get_host", id)?;
    get(&client.state().hosts, "host", id)
}

fn apply(host: &mut Host, opts: &HostOpts) {
    set_opt(&mut host.hostname, opts.hostname.as_ref());
    set_opt(&mut host.personality, opts.personality.as_ref());
    if let Some(subfunctions) = &opts.subfunctions {
        host.subfunctions.clone_from(subfunctions);
    }
    if let Some(location) = &opts.location {
        host.location = location.clone();
    }
    set_opt(&mut host.install_output, opts.install_output.as_ref());
    set_opt(&mut host.console, opts.console.as_ref());
    set_opt(&mut host.boot_mac, opts.boot_mac.as_ref());
    set_opt(&mut host.root_device, opts.root_device.as_ref());
    set_opt(&mut host.boot_device, opts.boot_device.as_ref());
    set_opt(&mut host.bm_address, opts.bm_address.as_ref());
    set_opt(&mut host.bm_type, opts.bm_type.as_ref());
    set_opt(&mut host.bm_username, opts.bm_username.as_ref());
    set_opt(&mut host.clock_synchronization, opts.clock_synchronization.as_ref());
}

pub async fn create_host(client: &MockPlatformClient, opts: &HostOpts) -> Result<Host, PlatformError> {
    client.enter("create_host", opts.boot_mac.as_deref().unwrap_or_default())?;
    let mut host = Host {
        id: new_id(),
        administrative_state: ADMIN_LOCKED.to_string(),
        operational_status: OPER_DISABLED.to_string(),
        availability_status: AVAIL_OFFLINE.to_string(),
        ..Default::default()
    };
    apply(&mut host, opts);
    client.state().hosts.push(host.clone());
    Ok(host)
}

pub async fn update_host(client: &MockPlatformClient, id: &str, opts: &HostOpts) -> Result<Host, PlatformError> {
    client.enter("update_host", id)?;
    let mut state = client.state();
    let host = get_mut(&mut state.hosts, "host", id)?;
    apply(host, opts);
    Ok(host.clone())
}

pub async fn host_action(client: &MockPlatformClient, id: &str, action: HostAction) -> Result<Host, PlatformError> {
    client.enter("host_action", &format!("{} {}", id, action))?;
    let mut state = client.state();
    let host = get_mut(&mut state.hosts, "host", id)?;
    match action {
        HostAction::Lock | HostAction::ForceLock => {
            host.administrative_state = ADMIN_LOCKED.to_string();
            host.operational_status = OPER_DISABLED.to_string();
            host.availability_status = AVAIL_ONLINE.to_string();
        }
        HostAction::Unlock => {
            host.administrative_state = ADMIN_UNLOCKED.to_string();
            host.operational_status = OPER_ENABLED.to_string();
            host.availability_status = AVAIL_AVAILABLE.to_string();
        }
        HostAction::PowerOn | HostAction::Reinstall => {
            host.availability_status = AVAIL_OFFLINE.to_string();
        }
        HostAction::PowerOff => {
            host.availability_status = AVAIL_POWER_OFF.to_string();
        }
    }
    Ok(host.clone())
}

pub async fn delete_host(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_host", id)?;
    client.check_delete(id)?;
    remove(&mut client.state().hosts, "host", id).map(|_| ())
}

pub async fn list_labels(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Label>, PlatformError> {
    client.enter("list_labels", host_id)?;
    Ok(client
        .state()
        .labels
        .iter()
        .filter(|l| l.host_uuid == host_id)
        .cloned()
        .collect())
}

pub async fn assign_labels(
    client: &MockPlatformClient,
    host_id: &str,
    labels: &BTreeMap<String, String>,
) -> Result<(), PlatformError> {
    client.enter("assign_labels", host_id)?;
    let mut state = client.state();
    for (key, value) in labels {
        match state.labels.iter_mut().find(|l| l.host_uuid == host_id && &l.key == key) {
            Some(label) => label.value.clone_from(value),
            None => state.labels.push(Label {
                id: new_id(),
                host_uuid: host_id.to_string(),
                key: key.clone(),
                value: value.clone(),
            }),
        }
    }
    Ok(())
}

pub async fn delete_label(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_label", id)?;
    remove(&mut client.state().labels, "label", id).map(|_| ())
}
