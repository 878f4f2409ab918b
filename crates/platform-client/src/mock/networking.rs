//! Host networking, processor and memory operations for MockPlatformClient
//!
//! Addresses, routes and network bindings carry no host reference, so they
//! are attributed to a host through their interface.

use super::helpers::{get, get_mut, new_id, remove, set, set_opt};
use super::{MockPlatformClient, Tables};
use crate::error::PlatformError;
use crate::models::*;

fn host_interface_ids(state: &Tables, host_id: &str) -> Vec<String> {
    state
        .interfaces
        .iter()
        .filter(|i| i.host_id == host_id)
        .map(|i| i.id.clone())
        .collect()
}

pub async fn list_cpus(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Cpu>, PlatformError> {
    client.enter("list_cpus", host_id)?;
    Ok(client.state().cpus.iter().filter(|c| c.host_id == host_id).cloned().collect())
}

pub async fn update_cpus(client: &MockPlatformClient, host_id: &str, opts: &[CpuOpts]) -> Result<(), PlatformError> {
    client.enter("update_cpus", host_id)?;
    let mut state = client.state();
    state.cpu_updates.push((host_id.to_string(), opts.to_vec()));

    // Reassign whole cores, lowest core numbers first, per node
    for opt in opts {
        for socket in &opt.sockets {
            for (node, count) in socket {
                let Ok(node) = node.parse::<i32>() else { continue };
                let mut cores: Vec<i32> = state
                    .cpus
                    .iter()
                    .filter(|c| c.host_id == host_id && c.processor == node && c.thread == 0)
                    .map(|c| c.physical_core)
                    .collect();
                cores.sort_unstable();
                let taken: Vec<i32> = cores
                    .into_iter()
                    .filter(|core| {
                        !state.cpus.iter().any(|c| {
                            c.host_id == host_id
                                && c.processor == node
                                && c.physical_core == *core
                                && c.function != CPU_FUNCTION_APPLICATIONS
                                && c.function != opt.function
                        })
                    })
                    .take(usize::try_from(*count).unwrap_or_default())
                    .collect();
                for cpu in state
                    .cpus
                    .iter_mut()
                    .filter(|c| c.host_id == host_id && c.processor == node)
                {
                    if taken.contains(&cpu.physical_core) {
                        cpu.function.clone_from(&opt.function);
                    } else if cpu.function == opt.function {
                        cpu.function = CPU_FUNCTION_APPLICATIONS.to_string();
                    }
                }
            }
        }
    }
    Ok(())
}

pub async fn list_memory(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Memory>, PlatformError> {
    client.enter("list_memory", host_id)?;
    Ok(client.state().memory.iter().filter(|m| m.host_id == host_id).cloned().collect())
}

pub async fn update_memory(client: &MockPlatformClient, id: &str, opts: &MemoryOpts) -> Result<Memory, PlatformError> {
    client.enter("update_memory", id)?;
    let mut state = client.state();
    let memory = get_mut(&mut state.memory, "memory", id)?;
    set(&mut memory.platform, opts.platform.as_ref());
    set_opt(&mut memory.vm_2m_pending, opts.vm_2m.as_ref());
    set_opt(&mut memory.vm_1g_pending, opts.vm_1g.as_ref());
    set_opt(&mut memory.vswitch_required, opts.vswitch_pages.as_ref());
    set(&mut memory.vswitch_page_size_mib, opts.vswitch_page_size_mib.as_ref());
    Ok(memory.clone())
}

pub async fn list_ports(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Port>, PlatformError> {
    client.enter("list_ports", host_id)?;
    Ok(client.state().ports.iter().filter(|p| p.host_id == host_id).cloned().collect())
}

pub async fn list_interfaces(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Interface>, PlatformError> {
    client.enter("list_interfaces", host_id)?;
    Ok(client
        .state()
        .interfaces
        .iter()
        .filter(|i| i.host_id == host_id)
        .cloned()
        .collect())
}

fn apply(iface: &mut Interface, opts: &InterfaceOpts) {
    set(&mut iface.name, opts.name.as_ref());
    set_opt(&mut iface.class, opts.class.as_ref());
    set(&mut iface.mtu, opts.mtu.as_ref());
    set_opt(&mut iface.vid, opts.vid.as_ref());
    set_opt(&mut iface.ipv4_mode, opts.ipv4_mode.as_ref());
    set_opt(&mut iface.ipv4_pool, opts.ipv4_pool.as_ref());
    set_opt(&mut iface.ipv6_mode, opts.ipv6_mode.as_ref());
    set_opt(&mut iface.ipv6_pool, opts.ipv6_pool.as_ref());
    set_opt(&mut iface.ae_mode, opts.ae_mode.as_ref());
    set_opt(&mut iface.ae_transmit_hash, opts.ae_transmit_hash.as_ref());
    set_opt(&mut iface.vf_count, opts.vf_count.as_ref());
    set_opt(&mut iface.vf_driver, opts.vf_driver.as_ref());
    set(&mut iface.uses, opts.uses.as_ref());
    if let Some(uses) = &opts.uses_modify {
        iface.uses = uses.split(',').filter(|u| !u.is_empty()).map(str::to_string).collect();
    }
}

pub async fn create_interface(client: &MockPlatformClient, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
    client.enter("create_interface", opts.name.as_deref().unwrap_or_default())?;
    let mut iface = Interface {
        id: new_id(),
        host_id: opts.host_id.clone().unwrap_or_default(),
        if_type: opts.if_type.clone().unwrap_or_default(),
        mtu: 1500,
        ..Default::default()
    };
    apply(&mut iface, opts);
    client.state().interfaces.push(iface.clone());
    Ok(iface)
}

pub async fn update_interface(client: &MockPlatformClient, id: &str, opts: &InterfaceOpts) -> Result<Interface, PlatformError> {
    client.enter("update_interface", id)?;
    let mut state = client.state();
    let iface = get_mut(&mut state.interfaces, "interface", id)?;
    let previous = iface.name.clone();
    apply(iface, opts);
    let iface = iface.clone();
    if iface.name != previous {
        for upper in state.interfaces.iter_mut() {
            for lower in upper.uses.iter_mut().filter(|u| **u == previous) {
                lower.clone_from(&iface.name);
            }
        }
    }
    for address in state.addresses.iter_mut().filter(|a| a.interface_id == id) {
        address.interface_name.clone_from(&iface.name);
    }
    for route in state.routes.iter_mut().filter(|r| r.interface_id == id) {
        route.interface_name.clone_from(&iface.name);
    }
    Ok(iface)
}

pub async fn delete_interface(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_interface", id)?;
    client.check_delete(id)?;
    let mut state = client.state();
    remove(&mut state.interfaces, "interface", id)?;
    state.interface_networks.retain(|n| n.interface_id != id);
    state.interface_datanetworks.retain(|n| n.interface_id != id);
    state.addresses.retain(|a| a.interface_id != id);
    state.routes.retain(|r| r.interface_id != id);
    Ok(())
}

pub async fn list_interface_networks(client: &MockPlatformClient, host_id: &str) -> Result<Vec<InterfaceNetwork>, PlatformError> {
    client.enter("list_interface_networks", host_id)?;
    let state = client.state();
    let ids = host_interface_ids(&state, host_id);
    Ok(state
        .interface_networks
        .iter()
        .filter(|n| ids.contains(&n.interface_id))
        .cloned()
        .collect())
}

pub async fn create_interface_network(
    client: &MockPlatformClient,
    opts: &InterfaceNetworkOpts,
) -> Result<InterfaceNetwork, PlatformError> {
    client.enter("create_interface_network", &opts.interface_uuid)?;
    let mut state = client.state();
    let iface = get(&state.interfaces, "interface", &opts.interface_uuid)?;
    let network = get(&state.networks, "network", &opts.network_uuid)?;
    let binding = InterfaceNetwork {
        id: new_id(),
        network_uuid: network.id,
        network_type: network.network_type,
        network_name: network.name,
        interface_name: iface.name,
        interface_id: iface.id,
    };
    state.interface_networks.push(binding.clone());
    Ok(binding)
}

pub async fn delete_interface_network(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_interface_network", id)?;
    remove(&mut client.state().interface_networks, "interface network", id).map(|_| ())
}

pub async fn list_interface_datanetworks(
    client: &MockPlatformClient,
    host_id: &str,
) -> Result<Vec<InterfaceDataNetwork>, PlatformError> {
    client.enter("list_interface_datanetworks", host_id)?;
    let state = client.state();
    let ids = host_interface_ids(&state, host_id);
    Ok(state
        .interface_datanetworks
        .iter()
        .filter(|n| ids.contains(&n.interface_id))
        .cloned()
        .collect())
}

pub async fn create_interface_datanetwork(
    client: &MockPlatformClient,
    opts: &InterfaceDataNetworkOpts,
) -> Result<InterfaceDataNetwork, PlatformError> {
    client.enter("create_interface_datanetwork", &opts.interface_uuid)?;
    let mut state = client.state();
    let iface = get(&state.interfaces, "interface", &opts.interface_uuid)?;
    let network = get(&state.data_networks, "data network", &opts.datanetwork_uuid)?;
    let binding = InterfaceDataNetwork {
        id: new_id(),
        datanetwork_id: network.id,
        datanetwork_name: network.name,
        interface_name: iface.name,
        interface_id: iface.id,
    };
    state.interface_datanetworks.push(binding.clone());
    Ok(binding)
}

pub async fn delete_interface_datanetwork(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_interface_datanetwork", id)?;
    remove(&mut client.state().interface_datanetworks, "interface data network", id).map(|_| ())
}

pub async fn list_addresses(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Address>, PlatformError> {
    client.enter("list_addresses", host_id)?;
    let state = client.state();
    let ids = host_interface_ids(&state, host_id);
    Ok(state
        .addresses
        .iter()
        .filter(|a| ids.contains(&a.interface_id))
        .cloned()
        .collect())
}

pub async fn create_address(client: &MockPlatformClient, opts: &AddressOpts) -> Result<Address, PlatformError> {
    client.enter("create_address", &opts.address)?;
    let mut state = client.state();
    let iface = get(&state.interfaces, "interface", &opts.interface_uuid)?;
    let address = Address {
        id: new_id(),
        address: opts.address.clone(),
        prefix: opts.prefix,
        interface_name: iface.name,
        interface_id: iface.id,
        pool_uuid: None,
    };
    state.addresses.push(address.clone());
    Ok(address)
}

pub async fn delete_address(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_address", id)?;
    remove(&mut client.state().addresses, "address", id).map(|_| ())
}

pub async fn list_routes(client: &MockPlatformClient, host_id: &str) -> Result<Vec<Route>, PlatformError> {
    client.enter("list_routes", host_id)?;
    let state = client.state();
    let ids = host_interface_ids(&state, host_id);
    Ok(state
        .routes
        .iter()
        .filter(|r| ids.contains(&r.interface_id))
        .cloned()
        .collect())
}

pub async fn create_route(client: &MockPlatformClient, opts: &RouteOpts) -> Result<Route, PlatformError> {
    client.enter("create_route", &opts.network)?;
    let mut state = client.state();
    let iface = get(&state.interfaces, "interface", &opts.interface_uuid)?;
    let route = Route {
        id: new_id(),
        network: opts.network.clone(),
        prefix: opts.prefix,
        gateway: opts.gateway.clone(),
        metric: opts.metric,
        interface_name: iface.name,
        interface_id: iface.id,
    };
    state.routes.push(route.clone());
    Ok(route)
}

pub async fn delete_route(client: &MockPlatformClient, id: &str) -> Result<(), PlatformError> {
    client.enter("delete_route", id)?;
    remove(&mut client.state().routes, "route", id).map(|_| ())
}
