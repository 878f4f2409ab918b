//! Platform network, data network and PTP operations for MockPlatformClient

use super::helpers::{get_mut, new_id, remove, set, set_opt};
use super::MockPlatformClient;
use crate::error::PlatformError;
use crate::models::*;

pub async fn list_address_pools(client: &MockPlatformClient) -> Result<Vec<AddressPool>, PlatformError> {
    client.enter("list_address_pools", "")?;
    Ok(client.state().address_pools.clone())
}

pub async fn create_address_pool(client: &MockPlatformClient, opts: &AddressPoolOpts) -> Result<AddressPool, PlatformError> {
    let name = opts.name.clone().unwrap_or_default();
    client.enter("create_address_pool", &name)?;
    let pool = AddressPool {
        id: new_id(),
        name,
        network: opts.network.clone().unwrap_or_default(),
        prefix: opts.prefix.unwrap_or_default(),
        gateway: opts.gateway.clone(),
        order: opts.order.clone().unwrap_or_else(|| "random".to_string()),
        ranges: opts.ranges.clone().unwrap_or_default(),
    };
    client.state().address_pools.push(pool.clone());
    Ok(pool)
}

pub async fn update_address_pool(
    client: &MockPlatformClient,
    id: &str,
    opts: &AddressPoolOpts,
) -> Result<AddressPool, PlatformError> {
    client.enter("update_address_pool", id)?;
    let mut state = client.state();
    let pool = get_mut(&mut state.address_pools, "address pool", id)?;
    set(&mut pool.name, opts.name.as_ref());
    set(&mut pool.network, opts.network.as_ref());
    set(&mut pool.prefix, opts.prefix.as_ref());
    set_opt(&mut pool.gateway, opts.gateway.as_ref());
    set(&mut pool.order, opts.order.as_ref());
    set(&mut pool.ranges, opts.ranges.as_ref());
    Ok(pool.clone())
}

pub async fn delete_address_pool(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_address_pool", id)?;
    client.check_delete(id)?;
    let mut state = client.state();
    if state.networks.iter().any(|n| n.pool_uuid == id) {
        return Err(PlatformError::Conflict(format!("address pool {} is in use by a network", id)));
    }
    remove(&mut state.address_pools, "address pool", id).map(|_| ())
}

pub async fn list_networks(client: &MockPlatformClient) -> Result<Vec<Network>, PlatformError> {
    client.enter("list_networks", "")?;
    Ok(client.state().networks.clone())
}

pub async fn create_network(client: &MockPlatformClient, opts: &NetworkOpts) -> Result<Network, PlatformError> {
    client.enter("create_network", &opts.name)?;
    let network = Network {
        id: new_id(),
        name: opts.name.clone(),
        network_type: opts.network_type.clone(),
        dynamic: opts.dynamic,
        pool_uuid: opts.pool_uuid.clone(),
    };
    client.state().networks.push(network.clone());
    Ok(network)
}

pub async fn delete_network(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_network", id)?;
    client.check_delete(id)?;
    remove(&mut client.state().networks, "network", id).map(|_| ())
}

pub async fn list_data_networks(client: &MockPlatformClient) -> Result<Vec<DataNetwork>, PlatformError> {
    client.enter("list_data_networks", "")?;
    Ok(client.state().data_networks.clone())
}

fn apply(network: &mut DataNetwork, opts: &DataNetworkOpts) {
    set(&mut network.name, opts.name.as_ref());
    set(&mut network.network_type, opts.network_type.as_ref());
    set_opt(&mut network.description, opts.description.as_ref());
    set(&mut network.mtu, opts.mtu.as_ref());
    set_opt(&mut network.ttl, opts.ttl.as_ref());
    set_opt(&mut network.mode, opts.mode.as_ref());
    set_opt(&mut network.multicast_group, opts.multicast_group.as_ref());
    set_opt(&mut network.udp_port, opts.udp_port.as_ref());
}

pub async fn create_data_network(client: &MockPlatformClient, opts: &DataNetworkOpts) -> Result<DataNetwork, PlatformError> {
    client.enter("create_data_network", opts.name.as_deref().unwrap_or_default())?;
    let mut network = DataNetwork {
        id: new_id(),
        mtu: 1500,
        ..Default::default()
    };
    apply(&mut network, opts);
    client.state().data_networks.push(network.clone());
    Ok(network)
}

pub async fn update_data_network(
    client: &MockPlatformClient,
    id: &str,
    opts: &DataNetworkOpts,
) -> Result<DataNetwork, PlatformError> {
    client.enter("update_data_network", id)?;
    let mut state = client.state();
    let network = get_mut(&mut state.data_networks, "data network", id)?;
    apply(network, opts);
    Ok(network.clone())
}

pub async fn delete_data_network(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_data_network", id)?;
    client.check_delete(id)?;
    remove(&mut client.state().data_networks, "data network", id).map(|_| ())
}

fn update_parameters(parameters: &mut Vec<String>, add: &[String], remove: &[String]) {
    parameters.retain(|p| !remove.contains(p));
    for p in add {
        if !parameters.contains(p) {
            parameters.push(p.clone());
        }
    }
}

pub async fn list_ptp_instances(client: &MockPlatformClient) -> Result<Vec<PtpInstance>, PlatformError> {
    client.enter("list_ptp_instances", "")?;
    Ok(client.state().ptp_instances.clone())
}

pub async fn create_ptp_instance(client: &MockPlatformClient, opts: &PtpOwnerOpts) -> Result<PtpInstance, PlatformError> {
    client.enter("create_ptp_instance", &opts.name)?;
    let instance = PtpInstance {
        id: new_id(),
        name: opts.name.clone(),
        service: opts.service.clone().unwrap_or_default(),
        parameters: Vec::new(),
    };
    client.state().ptp_instances.push(instance.clone());
    Ok(instance)
}

pub async fn update_ptp_instance_parameters(
    client: &MockPlatformClient,
    id: &str,
    add: &[String],
    remove: &[String],
) -> Result<PtpInstance, PlatformError> {
    client.enter("update_ptp_instance_parameters", id)?;
    let mut state = client.state();
    let instance = get_mut(&mut state.ptp_instances, "ptp instance", id)?;
    update_parameters(&mut instance.parameters, add, remove);
    Ok(instance.clone())
}

pub async fn delete_ptp_instance(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_ptp_instance", id)?;
    client.check_delete(id)?;
    let mut state = client.state();
    if state.ptp_interfaces.iter().any(|i| i.ptp_instance_id == id) {
        return Err(PlatformError::Conflict(format!("ptp instance {} has interfaces", id)));
    }
    remove(&mut state.ptp_instances, "ptp instance", id).map(|_| ())
}

pub async fn list_ptp_interfaces(client: &MockPlatformClient) -> Result<Vec<PtpInterface>, PlatformError> {
    client.enter("list_ptp_interfaces", "")?;
    Ok(client.state().ptp_interfaces.clone())
}

pub async fn create_ptp_interface(client: &MockPlatformClient, opts: &PtpOwnerOpts) -> Result<PtpInterface, PlatformError> {
    client.enter("create_ptp_interface", &opts.name)?;
    let mut state = client.state();
    let instance_id = opts.ptp_instance_id.clone().unwrap_or_default();
    let instance_name = state
        .ptp_instances
        .iter()
        .find(|i| i.id == instance_id)
        .map(|i| i.name.clone());
    let iface = PtpInterface {
        id: new_id(),
        name: opts.name.clone(),
        ptp_instance_id: instance_id,
        ptp_instance_name: instance_name,
        parameters: Vec::new(),
    };
    state.ptp_interfaces.push(iface.clone());
    Ok(iface)
}

pub async fn update_ptp_interface_parameters(
    client: &MockPlatformClient,
    id: &str,
    add: &[String],
    remove: &[String],
) -> Result<PtpInterface, PlatformError> {
    client.enter("update_ptp_interface_parameters", id)?;
    let mut state = client.state();
    let iface = get_mut(&mut state.ptp_interfaces, "ptp interface", id)?;
    update_parameters(&mut iface.parameters, add, remove);
    Ok(iface.clone())
}

pub async fn delete_ptp_interface(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_ptp_interface", id)?;
    client.check_delete(id)?;
    remove(&mut client.state().ptp_interfaces, "ptp interface", id).map(|_| ())
}
