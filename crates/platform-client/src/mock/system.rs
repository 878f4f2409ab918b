//! System wide operations for MockPlatformClient
//!
//! Handles the system record, DNS/NTP/PTP/DRBD singletons, certificates,
//! licence, service parameters, storage backends and controller filesystems

use super::helpers::{get_mut, new_id, set_opt};
use super::MockPlatformClient;
use crate::error::PlatformError;
use crate::models::*;

pub async fn get_system(client: &MockPlatformClient) -> Result<SystemRecord, PlatformError> {
    client.enter("get_system", "")?;
    Ok(client.state().system.clone())
}

pub async fn update_system(client: &MockPlatformClient, id: &str, opts: &SystemOpts) -> Result<SystemRecord, PlatformError> {
    client.enter("update_system", id)?;
    let mut state = client.state();
    let system = &mut state.system;
    if let Some(name) = &opts.name {
        system.name.clone_from(name);
    }
    set_opt(&mut system.description, opts.description.as_ref());
    set_opt(&mut system.location, opts.location.as_ref());
    set_opt(&mut system.latitude, opts.latitude.as_ref());
    set_opt(&mut system.longitude, opts.longitude.as_ref());
    set_opt(&mut system.contact, opts.contact.as_ref());
    set_opt(&mut system.capabilities.vswitch_type, opts.vswitch_type.as_ref());
    if let Some(https) = &opts.https_enabled {
        system.capabilities.https_enabled = https == "true";
    }
    Ok(system.clone())
}

pub async fn get_dns(client: &MockPlatformClient) -> Result<Option<Dns>, PlatformError> {
    client.enter("get_dns", "")?;
    Ok(client.state().dns.clone())
}

pub async fn update_dns(client: &MockPlatformClient, id: &str, nameservers: &str) -> Result<Dns, PlatformError> {
    client.enter("update_dns", id)?;
    let dns = Dns {
        id: id.to_string(),
        nameservers: nameservers.to_string(),
    };
    client.state().dns = Some(dns.clone());
    Ok(dns)
}

pub async fn get_ntp(client: &MockPlatformClient) -> Result<Option<Ntp>, PlatformError> {
    client.enter("get_ntp", "")?;
    Ok(client.state().ntp.clone())
}

pub async fn update_ntp(client: &MockPlatformClient, id: &str, ntpservers: &str) -> Result<Ntp, PlatformError> {
    client.enter("update_ntp", id)?;
    // The platform stores the clear sentinel as an empty list
    let servers = if ntpservers == CLEAR_SERVERS_SENTINEL { "" } else { ntpservers };
    let ntp = Ntp {
        id: id.to_string(),
        ntpservers: servers.to_string(),
    };
    client.state().ntp = Some(ntp.clone());
    Ok(ntp)
}

pub async fn get_ptp(client: &MockPlatformClient) -> Result<Option<Ptp>, PlatformError> {
    client.enter("get_ptp", "")?;
    Ok(client.state().ptp.clone())
}

pub async fn update_ptp(client: &MockPlatformClient, id: &str, opts: &PtpOpts) -> Result<Ptp, PlatformError> {
    client.enter("update_ptp", id)?;
    let mut state = client.state();
    let ptp = state.ptp.get_or_insert_with(|| Ptp {
        id: id.to_string(),
        ..Default::default()
    });
    if let Some(mode) = &opts.mode {
        ptp.mode.clone_from(mode);
    }
    if let Some(transport) = &opts.transport {
        ptp.transport.clone_from(transport);
    }
    if let Some(mechanism) = &opts.mechanism {
        ptp.mechanism.clone_from(mechanism);
    }
    Ok(ptp.clone())
}

pub async fn get_drbd(client: &MockPlatformClient) -> Result<Option<Drbd>, PlatformError> {
    client.enter("get_drbd", "")?;
    Ok(client.state().drbd.clone())
}

pub async fn update_drbd(client: &MockPlatformClient, id: &str, link_utilization: i32) -> Result<Drbd, PlatformError> {
    client.enter("update_drbd", id)?;
    let drbd = Drbd {
        id: id.to_string(),
        link_utilization,
    };
    client.state().drbd = Some(drbd.clone());
    Ok(drbd)
}

pub async fn list_certificates(client: &MockPlatformClient) -> Result<Vec<Certificate>, PlatformError> {
    client.enter("list_certificates", "")?;
    Ok(client.state().certificates.clone())
}

pub async fn install_certificate(client: &MockPlatformClient, mode: &str, pem: Vec<u8>) -> Result<(), PlatformError> {
    client.enter("install_certificate", mode)?;
    client.state().certificate_installs.push((mode.to_string(), pem));
    Ok(())
}

pub async fn get_license(client: &MockPlatformClient) -> Result<License, PlatformError> {
    client.enter("get_license", "")?;
    Ok(client.state().license.clone())
}

pub async fn install_license(client: &MockPlatformClient, content: Vec<u8>) -> Result<(), PlatformError> {
    client.enter("install_license", "")?;
    client.state().license = License {
        content: String::from_utf8_lossy(&content).into_owned(),
    };
    Ok(())
}

pub async fn list_service_parameters(client: &MockPlatformClient) -> Result<Vec<ServiceParameter>, PlatformError> {
    client.enter("list_service_parameters", "")?;
    Ok(client.state().service_parameters.clone())
}

pub async fn create_service_parameter(
    client: &MockPlatformClient,
    opts: &ServiceParameterOpts,
) -> Result<ServiceParameter, PlatformError> {
    let (name, value) = opts
        .parameters
        .as_ref()
        .and_then(|p| p.iter().next())
        .map(|(k, v)| (k.clone(), v.clone()))
        .ok_or_else(|| PlatformError::InvalidRequest("service parameter without a value".to_string()))?;
    client.enter("create_service_parameter", &name)?;
    let parameter = ServiceParameter {
        id: new_id(),
        service: opts.service.clone().unwrap_or_default(),
        section: opts.section.clone().unwrap_or_default(),
        name,
        value,
        personality: opts.personality.clone(),
        resource: opts.resource.clone(),
    };
    client.state().service_parameters.push(parameter.clone());
    Ok(parameter)
}

pub async fn update_service_parameter(
    client: &MockPlatformClient,
    id: &str,
    opts: &ServiceParameterOpts,
) -> Result<ServiceParameter, PlatformError> {
    client.enter("update_service_parameter", id)?;
    let mut state = client.state();
    let parameter = get_mut(&mut state.service_parameters, "service parameter", id)?;
    if let Some(value) = &opts.value {
        parameter.value.clone_from(value);
    }
    set_opt(&mut parameter.personality, opts.personality.as_ref());
    set_opt(&mut parameter.resource, opts.resource.as_ref());
    Ok(parameter.clone())
}

pub async fn list_storage_backends(client: &MockPlatformClient) -> Result<Vec<StorageBackend>, PlatformError> {
    client.enter("list_storage_backends", "")?;
    Ok(client.state().storage_backends.clone())
}

pub async fn create_storage_backend(
    client: &MockPlatformClient,
    opts: &StorageBackendOpts,
) -> Result<StorageBackend, PlatformError> {
    client.enter("create_storage_backend", &opts.name)?;
    let replication = opts
        .capabilities
        .as_ref()
        .and_then(|c| c.get("replication"))
        .and_then(|r| r.parse().ok());
    let backend = StorageBackend {
        id: new_id(),
        name: opts.name.clone(),
        backend: opts.backend.clone(),
        state: "configured".to_string(),
        task: None,
        services: opts.services.clone(),
        replication,
        capabilities: serde_json::to_value(&opts.capabilities).unwrap_or_default(),
    };
    client.state().storage_backends.push(backend.clone());
    Ok(backend)
}

pub async fn list_controller_filesystems(client: &MockPlatformClient) -> Result<Vec<ControllerFilesystem>, PlatformError> {
    client.enter("list_controller_filesystems", "")?;
    Ok(client.state().controller_filesystems.clone())
}

pub async fn update_controller_filesystems(
    client: &MockPlatformClient,
    system_id: &str,
    opts: &[FileSystemOpts],
) -> Result<(), PlatformError> {
    client.enter("update_controller_filesystems", system_id)?;
    let mut state = client.state();
    for opt in opts {
        if let Some(fs) = state.controller_filesystems.iter_mut().find(|fs| fs.name == opt.name) {
            fs.size = opt.size;
        }
    }
    Ok(())
}
