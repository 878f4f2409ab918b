//! Interfaces, network bindings, addresses and routes
//!
//! Live interfaces are paired with declared ones before anything is
//! written. An interface keeps its identity across renames as long as its
//! anchor survives: the port for ethernets, the member set for bonds and
//! `(lower, vid)` for VLANs. Whatever cannot be paired is stale and is
//! removed, top of the stack first, before the declared interfaces are
//! updated or created.

use super::defaults::LiveHost;
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use crate::reconciler::Reconciler;
use crds::{
    AddressInfo, BondInfo, CommonInterface, EthernetInfo, Host, HostProfileSpec, InterfaceInfo, RouteInfo, VlanInfo,
    DEFAULT_ROUTE_METRIC, LOOPBACK_INTERFACE,
};
use platform_client::{
    Address, AddressOpts, AddressPool, Interface, InterfaceDataNetworkOpts, InterfaceNetworkOpts, InterfaceOpts,
    PlatformClientTrait, Route, RouteOpts, ADDRESS_MODE_DISABLED, ADDRESS_MODE_POOL, ADDRESS_MODE_STATIC,
    IF_CLASS_DATA, IF_CLASS_NONE, IF_CLASS_PCI_SRIOV, IF_TYPE_AE, IF_TYPE_ETHERNET, IF_TYPE_VIRTUAL, IF_TYPE_VLAN,
};
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::{debug, info};

/// Declared interface a live interface corresponds to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Declared<'a> {
    Ethernet(&'a EthernetInfo),
    Vlan(&'a VlanInfo),
    Bond(&'a BondInfo),
}

impl<'a> Declared<'a> {
    pub(crate) fn common(self) -> &'a dyn CommonInterface {
        match self {
            Self::Ethernet(e) => e,
            Self::Vlan(v) => v,
            Self::Bond(b) => b,
        }
    }

    pub(crate) fn name(self) -> &'a str {
        self.common().name()
    }
}

/// Pairs live interfaces with declared ones.
pub(crate) struct Planner<'a> {
    declared: &'a InterfaceInfo,
    live: &'a LiveHost,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(declared: &'a InterfaceInfo, live: &'a LiveHost) -> Self {
        Self { declared, live }
    }

    /// Declared counterpart of a live interface, if it survives.
    pub(crate) fn declared(&self, iface: &Interface) -> Option<Declared<'a>> {
        self.resolve(iface, 0)
    }

    fn resolve(&self, iface: &Interface, depth: usize) -> Option<Declared<'a>> {
        // Interfaces stack at most a few levels deep; anything more is a loop
        if depth > 4 {
            return None;
        }
        match iface.if_type.as_str() {
            IF_TYPE_ETHERNET => {
                let port = self.live.port_of(&iface.id)?;
                self.declared
                    .ethernets()
                    .iter()
                    .find(|e| e.port.name == port.name)
                    .map(Declared::Ethernet)
            }
            IF_TYPE_VIRTUAL => self
                .declared
                .ethernets()
                .iter()
                .find(|e| e.name == iface.name)
                .map(Declared::Ethernet),
            IF_TYPE_VLAN => {
                let vid = iface.vid?;
                let lower = self.live.interface_named(iface.uses.first()?)?;
                let lower = self.resolve(lower, depth + 1)?;
                self.declared
                    .vlans()
                    .iter()
                    .find(|v| v.vid == vid && v.lower == lower.name())
                    .map(Declared::Vlan)
            }
            IF_TYPE_AE => {
                let members = iface
                    .uses
                    .iter()
                    .filter_map(|u| self.live.interface_named(u))
                    .filter_map(|m| self.resolve(m, depth + 1))
                    .map(Declared::name)
                    .collect::<Vec<_>>();
                self.declared
                    .bonds()
                    .iter()
                    .find(|b| b.members.iter().any(|m| members.contains(&m.as_str())))
                    .map(Declared::Bond)
            }
            other => {
                debug!("Unexpected interface type {} on {}", other, iface.name);
                None
            }
        }
    }

    /// Declared name of the live interface called `name`.
    fn planned_name(&self, name: &str) -> Option<&'a str> {
        let iface = self.live.interface_named(name)?;
        self.declared(iface).map(Declared::name)
    }
}

fn same_ip(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

fn is_ipv4(value: &str) -> bool {
    matches!(value.parse::<IpAddr>(), Ok(IpAddr::V4(_)))
}

fn is_ipv6(value: &str) -> bool {
    matches!(value.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
}

/// Routes to delete: unknown interface, no longer declared, or declared
/// over a different interface than the one they sit on after renames.
pub(crate) fn stale_routes<'r>(planner: &Planner<'_>, declared: &[RouteInfo], routes: &'r [Route]) -> Vec<&'r Route> {
    routes
        .iter()
        .filter(|route| {
            let Some(planned) = planner.planned_name(&route.interface_name) else {
                return true;
            };
            !declared.iter().any(|r| {
                r.interface == planned
                    && same_ip(&r.network, &route.network)
                    && r.prefix == route.prefix
                    && same_ip(&r.gateway, &route.gateway)
                    && r.metric.is_none_or(|m| m == route.metric)
            })
        })
        .collect()
}

/// Static addresses to delete. Pool allocated addresses are left to the
/// platform.
pub(crate) fn stale_addresses<'r>(
    planner: &Planner<'_>,
    declared: &[AddressInfo],
    addresses: &'r [Address],
) -> Vec<&'r Address> {
    addresses
        .iter()
        .filter(|a| a.pool_uuid.is_none())
        .filter(|address| {
            let Some(planned) = planner.planned_name(&address.interface_name) else {
                return true;
            };
            !declared.iter().any(|a| {
                a.interface == planned && same_ip(&a.address, &address.address) && a.prefix == address.prefix
            })
        })
        .collect()
}

/// VLAN, bond and VF interfaces that do not survive, VLANs first.
pub(crate) fn stale_interfaces<'r>(planner: &Planner<'_>, interfaces: &'r [Interface]) -> Vec<&'r Interface> {
    let mut stale = interfaces
        .iter()
        .filter(|i| i.if_type != IF_TYPE_ETHERNET && i.if_type != IF_TYPE_VIRTUAL)
        .filter(|i| planner.declared(i).is_none())
        .collect::<Vec<_>>();
    stale.sort_by_key(|i| i.if_type != IF_TYPE_VLAN);
    stale
}

/// Names to unbind and names to bind. An undeclared list keeps whatever is
/// bound.
pub(crate) fn binding_changes(current: &[String], declared: Option<&Vec<String>>) -> (Vec<String>, Vec<String>) {
    let Some(declared) = declared else {
        return (Vec::new(), Vec::new());
    };
    let removed = current.iter().filter(|c| !declared.contains(c)).cloned().collect();
    let added = declared.iter().filter(|d| !current.contains(d)).cloned().collect();
    (removed, added)
}

/// What decides the addressing modes of an interface.
pub(crate) struct Addressing<'a> {
    pub addresses: &'a [AddressInfo],
    pub pools: &'a [AddressPool],
}

impl Addressing<'_> {
    /// Mode and pool of one address family.
    fn mode(&self, info: &dyn CommonInterface, family: fn(&str) -> bool) -> (&'static str, Option<String>) {
        if self
            .addresses
            .iter()
            .any(|a| a.interface == info.name() && family(&a.address))
        {
            return (ADDRESS_MODE_STATIC, None);
        }
        let pool = info.platform_networks().into_iter().flatten().find_map(|network| {
            self.pools
                .iter()
                .find(|p| &p.name == network && family(&p.network))
        });
        match pool {
            Some(pool) => (ADDRESS_MODE_POOL, Some(pool.id.clone())),
            None => (ADDRESS_MODE_DISABLED, None),
        }
    }

    fn has_static(&self, info: &dyn CommonInterface) -> bool {
        self.addresses.iter().any(|a| a.interface == info.name())
    }

    fn managed(&self, info: &dyn CommonInterface) -> bool {
        info.class() == IF_CLASS_DATA || self.has_static(info)
    }

    fn apply(&self, info: &dyn CommonInterface, opts: &mut InterfaceOpts) {
        let (mode, pool) = self.mode(info, is_ipv4);
        opts.ipv4_mode = Some(mode.to_string());
        opts.ipv4_pool = pool;
        let (mode, pool) = self.mode(info, is_ipv6);
        opts.ipv6_mode = Some(mode.to_string());
        opts.ipv6_pool = pool;
    }
}

/// Changes to the attributes every interface type shares.
pub(crate) fn interface_update(info: &dyn CommonInterface, iface: &Interface, addressing: &Addressing<'_>) -> InterfaceOpts {
    let mut opts = InterfaceOpts::default();

    // The loopback interface is never renamed
    if iface.if_type != IF_TYPE_VIRTUAL && info.name() != iface.name {
        opts.name = Some(info.name().to_string());
    }

    let current_class = match iface.class() {
        "" => IF_CLASS_NONE,
        class => class,
    };
    if !info.class().eq_ignore_ascii_case(current_class) {
        opts.class = Some(info.class().to_string());
    }

    if let Some(mtu) = info.mtu() {
        if mtu != iface.mtu {
            opts.mtu = Some(mtu);
        }
    }

    if addressing.managed(info) {
        let current_mode = |mode: &Option<String>| mode.clone().unwrap_or_else(|| ADDRESS_MODE_DISABLED.to_string());

        let (mode, pool) = addressing.mode(info, is_ipv4);
        if current_mode(&iface.ipv4_mode) != mode {
            opts.ipv4_mode = Some(mode.to_string());
        }
        if pool.is_some() && pool != iface.ipv4_pool {
            opts.ipv4_pool = pool;
        }

        let (mode, pool) = addressing.mode(info, is_ipv6);
        if current_mode(&iface.ipv6_mode) != mode {
            opts.ipv6_mode = Some(mode.to_string());
        }
        if pool.is_some() && pool != iface.ipv6_pool {
            opts.ipv6_pool = pool;
        }
    }
    opts
}

/// Ethernet changes, SR-IOV virtual functions included.
pub(crate) fn ethernet_update(info: &EthernetInfo, iface: &Interface, addressing: &Addressing<'_>) -> InterfaceOpts {
    let mut opts = interface_update(info, iface, addressing);
    if info.class != IF_CLASS_PCI_SRIOV {
        return opts;
    }

    match info.vf_count {
        Some(count) if iface.vf_count != Some(count) => opts.vf_count = Some(count),
        None if iface.vf_count.is_some_and(|c| c != 0) => opts.vf_count = Some(0),
        _ => {}
    }
    // The driver cannot be reset to the platform default
    if info.vf_driver.is_some() && info.vf_driver != iface.vf_driver {
        opts.vf_driver = info.vf_driver.clone();
    }
    opts
}

pub(crate) fn bond_update(info: &BondInfo, iface: &Interface, addressing: &Addressing<'_>) -> InterfaceOpts {
    let mut opts = interface_update(info, iface, addressing);

    if iface
        .ae_mode
        .as_deref()
        .is_some_and(|mode| !mode.eq_ignore_ascii_case(&info.mode))
    {
        opts.ae_mode = Some(info.mode.clone());
    }
    if let (Some(wanted), Some(current)) = (&info.transmit_hash_policy, &iface.ae_transmit_hash) {
        if !wanted.eq_ignore_ascii_case(current) {
            opts.ae_transmit_hash = Some(wanted.clone());
        }
    }

    let members = info.members.iter().collect::<BTreeSet<_>>();
    if members != iface.uses.iter().collect::<BTreeSet<_>>() {
        opts.uses_modify = Some(info.members.join(","));
    }
    opts
}

fn create_opts(host_id: &str, info: &dyn CommonInterface, if_type: &str, addressing: &Addressing<'_>) -> InterfaceOpts {
    let mut opts = InterfaceOpts {
        host_id: Some(host_id.to_string()),
        if_type: Some(if_type.to_string()),
        name: Some(info.name().to_string()),
        class: Some(info.class().to_string()),
        mtu: info.mtu(),
        ..Default::default()
    };
    if info.class() == IF_CLASS_DATA {
        addressing.apply(info, &mut opts);
    }
    opts
}

fn attachment_count(info: &EthernetInfo) -> usize {
    info.platform_networks.as_ref().map_or(0, Vec::len) + info.data_networks.as_ref().map_or(0, Vec::len)
}

impl Reconciler {
    /// Bring the host's networking in line with `desired`. Runs with the
    /// host locked.
    pub(crate) async fn reconcile_networking(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_NETWORKING) {
            return Ok(());
        }

        let declared = desired.interfaces();
        let worker = desired.has_worker_subfunction();
        let addresses = if worker { desired.addresses() } else { &[] };
        let routes = if worker { desired.routes() } else { &[] };

        if worker && self.config.is_enabled(names::HOST_ROUTE) {
            self.delete_stale_routes(client, host, &declared, routes, live).await?;
        }
        if worker && self.config.is_enabled(names::HOST_ADDRESS) {
            self.delete_stale_addresses(client, host, &declared, addresses, live).await?;
        }

        if self.config.is_enabled(names::HOST_INTERFACE) {
            self.delete_stale_interfaces(client, host, &declared, live).await?;
            self.delete_stale_bindings(client, host, &declared, live).await?;

            let pools = client.list_address_pools().await?;
            let addressing = Addressing {
                addresses,
                pools: &pools,
            };
            self.reconcile_ethernets(client, host, &declared, &addressing, live).await?;
            self.reconcile_bonds(client, host, &declared, &addressing, live).await?;
            self.reconcile_vlans(client, host, &declared, &addressing, live).await?;
        }

        if worker && self.config.is_enabled(names::HOST_ADDRESS) {
            self.create_addresses(client, host, addresses, live).await?;
        }
        if worker && self.config.is_enabled(names::HOST_ROUTE) {
            self.create_routes(client, host, routes, live).await?;
        }
        Ok(())
    }

    async fn delete_stale_routes(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        routes: &[RouteInfo],
        live: &mut LiveHost,
    ) -> Result<()> {
        let stale = {
            let planner = Planner::new(declared, live);
            stale_routes(&planner, routes, &live.routes)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        if stale.is_empty() {
            return Ok(());
        }

        for route in stale {
            info!("Deleting route {} of host {}", route.id, live.id());
            client.delete_route(&route.id).await?;
            events::normal(
                self.store(),
                host,
                REASON_DELETED,
                format!("stale route '{}/{}' has been deleted", route.network, route.prefix),
            )
            .await;
        }
        live.routes = client.list_routes(live.id()).await?;
        Ok(())
    }

    async fn delete_stale_addresses(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        addresses: &[AddressInfo],
        live: &mut LiveHost,
    ) -> Result<()> {
        let stale = {
            let planner = Planner::new(declared, live);
            stale_addresses(&planner, addresses, &live.addresses)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        if stale.is_empty() {
            return Ok(());
        }

        for address in stale {
            info!("Deleting address {} of host {}", address.id, live.id());
            client.delete_address(&address.id).await?;
            events::normal(
                self.store(),
                host,
                REASON_DELETED,
                format!("stale address '{}/{}' has been deleted", address.address, address.prefix),
            )
            .await;
        }
        live.addresses = client.list_addresses(live.id()).await?;
        Ok(())
    }

    async fn delete_stale_interfaces(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        let stale = {
            let planner = Planner::new(declared, live);
            stale_interfaces(&planner, &live.interfaces)
                .into_iter()
                .map(|i| (i.id.clone(), i.name.clone()))
                .collect::<Vec<_>>()
        };
        if stale.is_empty() {
            return Ok(());
        }

        for (id, name) in stale {
            info!("Deleting interface {} ({}) of host {}", name, id, live.id());
            match client.delete_interface(&id).await {
                Ok(()) => {}
                // Removed along with an interface it was stacked on
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
            events::normal(
                self.store(),
                host,
                REASON_DELETED,
                format!("stale interface {:?} has been deleted", name),
            )
            .await;
        }
        live.refresh_networking(client).await
    }

    /// Unbind networks from surviving interfaces first, so that a network
    /// moving between interfaces is free when it is bound again.
    async fn delete_stale_bindings(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut unbind = Vec::new();
        {
            let planner = Planner::new(declared, live);
            for iface in &live.interfaces {
                let Some(info) = planner.declared(iface) else {
                    continue;
                };
                let info = info.common();

                let (removed, _) = binding_changes(&live.networks_of(&iface.id), info.platform_networks());
                for name in removed {
                    let binding = live
                        .interface_networks
                        .iter()
                        .find(|n| n.interface_id == iface.id && n.network_name == name)
                        .ok_or_else(|| {
                            ControllerError::MissingSystemResource(format!(
                                "unable to find interface-network id for network {:?} on interface {:?}",
                                name, iface.name
                            ))
                        })?;
                    unbind.push((false, binding.id.clone(), name, iface.name.clone()));
                }

                let (removed, _) = binding_changes(&live.datanetworks_of(&iface.id), info.data_networks());
                for name in removed {
                    let binding = live
                        .interface_datanetworks
                        .iter()
                        .find(|n| n.interface_id == iface.id && n.datanetwork_name == name)
                        .ok_or_else(|| {
                            ControllerError::MissingSystemResource(format!(
                                "unable to find interface-datanetwork id for network {:?} on interface {:?}",
                                name, iface.name
                            ))
                        })?;
                    unbind.push((true, binding.id.clone(), name, iface.name.clone()));
                }
            }
        }
        if unbind.is_empty() {
            return Ok(());
        }

        for (data, id, network, iface) in unbind {
            if data {
                client.delete_interface_datanetwork(&id).await?;
            } else {
                client.delete_interface_network(&id).await?;
            }
            events::normal(
                self.store(),
                host,
                REASON_DELETED,
                format!("stale network {:?} has been removed from {:?}", network, iface),
            )
            .await;
        }
        live.interface_networks = client.list_interface_networks(live.id()).await?;
        live.interface_datanetworks = client.list_interface_datanetworks(live.id()).await?;
        Ok(())
    }

    /// Bind the declared networks missing from an interface.
    async fn bind_networks(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        info: &dyn CommonInterface,
        iface: &Interface,
        live: &LiveHost,
    ) -> Result<bool> {
        let (_, networks) = binding_changes(&live.networks_of(&iface.id), info.platform_networks());
        let (_, datanetworks) = binding_changes(&live.datanetworks_of(&iface.id), info.data_networks());
        if networks.is_empty() && datanetworks.is_empty() {
            return Ok(false);
        }

        if !networks.is_empty() {
            let known = client.list_networks().await?;
            for name in networks {
                let network = known.iter().find(|n| n.name == name).ok_or_else(|| {
                    ControllerError::MissingSystemResource(format!("unable to find network {:?}", name))
                })?;
                client
                    .create_interface_network(&InterfaceNetworkOpts {
                        interface_uuid: iface.id.clone(),
                        network_uuid: network.id.clone(),
                    })
                    .await?;
                events::normal(
                    self.store(),
                    host,
                    REASON_CREATED,
                    format!("network {:?} has been added to {:?}", name, info.name()),
                )
                .await;
            }
        }

        if !datanetworks.is_empty() {
            let known = client.list_data_networks().await?;
            for name in datanetworks {
                let network = known.iter().find(|n| n.name == name).ok_or_else(|| {
                    ControllerError::MissingSystemResource(format!("unable to find data network {:?}", name))
                })?;
                client
                    .create_interface_datanetwork(&InterfaceDataNetworkOpts {
                        interface_uuid: iface.id.clone(),
                        datanetwork_uuid: network.id.clone(),
                    })
                    .await?;
                events::normal(
                    self.store(),
                    host,
                    REASON_CREATED,
                    format!("data network {:?} has been added to {:?}", name, info.name()),
                )
                .await;
            }
        }
        Ok(true)
    }

    async fn reconcile_ethernets(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        addressing: &Addressing<'_>,
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut ethernets = declared.ethernets().iter().collect::<Vec<_>>();
        ethernets.sort_by_key(|e| std::cmp::Reverse(attachment_count(e)));

        let mut updated = false;
        for info in ethernets {
            let iface = if info.name == LOOPBACK_INTERFACE {
                live.interface_named(LOOPBACK_INTERFACE)
            } else {
                live.interface_on_port(&info.port.name)
            }
            .cloned()
            .ok_or_else(|| {
                ControllerError::MissingSystemResource(format!(
                    "unable to find interface for port {:?}",
                    info.port.name
                ))
            })?;

            let opts = ethernet_update(info, &iface, addressing);
            if !opts.is_empty() {
                info!("Updating ethernet interface {} of host {}: {:?}", iface.id, live.id(), opts);
                client.update_interface(&iface.id, &opts).await?;
                events::normal(
                    self.store(),
                    host,
                    REASON_UPDATED,
                    format!("ethernet interface {:?} has been updated", info.name),
                )
                .await;
                updated = true;
            }
            updated |= self.bind_networks(client, host, info, &iface, live).await?;
        }

        if updated {
            live.refresh_networking(client).await?;
        }
        Ok(())
    }

    async fn reconcile_bonds(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        addressing: &Addressing<'_>,
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut updated = false;
        for info in declared.bonds() {
            let existing = {
                let planner = Planner::new(declared, live);
                live.interfaces
                    .iter()
                    .filter(|i| i.if_type == IF_TYPE_AE)
                    .find(|i| matches!(planner.declared(i), Some(Declared::Bond(b)) if b.members == info.members))
                    .cloned()
            };

            let iface = match existing {
                Some(iface) => {
                    let opts = bond_update(info, &iface, addressing);
                    if !opts.is_empty() {
                        info!("Updating bond interface {} of host {}: {:?}", iface.id, live.id(), opts);
                        client.update_interface(&iface.id, &opts).await?;
                        events::normal(
                            self.store(),
                            host,
                            REASON_UPDATED,
                            format!("bond interface {:?} has been updated", info.name),
                        )
                        .await;
                        updated = true;
                    }
                    iface
                }
                None => {
                    let mut opts = create_opts(live.id(), info, IF_TYPE_AE, addressing);
                    opts.ae_mode = Some(info.mode.clone());
                    opts.ae_transmit_hash = info.transmit_hash_policy.clone();
                    opts.uses = Some(info.members.clone());

                    info!("Creating bond interface {} on host {}", info.name, live.id());
                    let created = client.create_interface(&opts).await?;
                    events::normal(
                        self.store(),
                        host,
                        REASON_CREATED,
                        format!("bond interface {:?} has been created", info.name),
                    )
                    .await;
                    updated = true;
                    created
                }
            };
            updated |= self.bind_networks(client, host, info, &iface, live).await?;
        }

        if updated {
            live.refresh_networking(client).await?;
        }
        Ok(())
    }

    async fn reconcile_vlans(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        declared: &InterfaceInfo,
        addressing: &Addressing<'_>,
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut updated = false;
        for info in declared.vlans() {
            let existing = live
                .interfaces
                .iter()
                .find(|i| {
                    i.if_type == IF_TYPE_VLAN
                        && i.vid == Some(info.vid)
                        && i.uses.first().is_some_and(|lower| *lower == info.lower)
                })
                .cloned();

            let iface = match existing {
                Some(iface) => {
                    let opts = interface_update(info, &iface, addressing);
                    if !opts.is_empty() {
                        info!("Updating vlan interface {} of host {}: {:?}", iface.id, live.id(), opts);
                        client.update_interface(&iface.id, &opts).await?;
                        events::normal(
                            self.store(),
                            host,
                            REASON_UPDATED,
                            format!("vlan interface {:?} has been updated", info.name),
                        )
                        .await;
                        updated = true;
                    }
                    iface
                }
                None => {
                    if live.interface_named(&info.lower).is_none() {
                        return Err(ControllerError::MissingSystemResource(format!(
                            "unable to find lower interface {:?} of vlan {:?}",
                            info.lower, info.name
                        )));
                    }
                    let mut opts = create_opts(live.id(), info, IF_TYPE_VLAN, addressing);
                    opts.vid = Some(info.vid);
                    opts.uses = Some(vec![info.lower.clone()]);

                    info!("Creating vlan interface {} on host {}", info.name, live.id());
                    let created = client.create_interface(&opts).await?;
                    events::normal(
                        self.store(),
                        host,
                        REASON_CREATED,
                        format!("vlan interface {:?} has been created", info.name),
                    )
                    .await;
                    updated = true;
                    created
                }
            };
            updated |= self.bind_networks(client, host, info, &iface, live).await?;
        }

        if updated {
            live.refresh_networking(client).await?;
        }
        Ok(())
    }

    async fn create_addresses(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        addresses: &[AddressInfo],
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut created = false;
        for address in addresses {
            let present = live.addresses.iter().any(|a| {
                a.interface_name == address.interface
                    && same_ip(&a.address, &address.address)
                    && a.prefix == address.prefix
            });
            if present {
                continue;
            }

            let iface = live.interface_named(&address.interface).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("unable to find interface: {}", address.interface))
            })?;
            let opts = AddressOpts {
                interface_uuid: iface.id.clone(),
                address: address.address.clone(),
                prefix: address.prefix,
            };
            info!("Creating address {}/{} on host {}", opts.address, opts.prefix, live.id());
            client.create_address(&opts).await?;
            events::normal(
                self.store(),
                host,
                REASON_CREATED,
                format!("address '{}/{}' has been created", address.address, address.prefix),
            )
            .await;
            created = true;
        }

        if created {
            live.addresses = client.list_addresses(live.id()).await?;
        }
        Ok(())
    }

    async fn create_routes(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        routes: &[RouteInfo],
        live: &mut LiveHost,
    ) -> Result<()> {
        let mut created = false;
        for route in routes {
            let present = live.routes.iter().any(|r| {
                r.interface_name == route.interface && same_ip(&r.network, &route.network) && r.prefix == route.prefix
            });
            if present {
                continue;
            }

            let iface = live.interface_named(&route.interface).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("unable to find interface: {}", route.interface))
            })?;
            let opts = RouteOpts {
                interface_uuid: iface.id.clone(),
                network: route.network.clone(),
                prefix: route.prefix,
                gateway: route.gateway.clone(),
                metric: route.metric.unwrap_or(DEFAULT_ROUTE_METRIC),
            };
            info!("Creating route {}/{} via {} on host {}", opts.network, opts.prefix, opts.gateway, live.id());
            client.create_route(&opts).await?;
            events::normal(
                self.store(),
                host,
                REASON_CREATED,
                format!(
                    "route '{}/{}' via {:?} has been created",
                    route.network, route.prefix, route.gateway
                ),
            )
            .await;
            created = true;
        }

        if created {
            live.routes = client.list_routes(live.id()).await?;
        }
        Ok(())
    }
}
