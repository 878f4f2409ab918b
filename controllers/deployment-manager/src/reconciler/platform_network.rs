//! PlatformNetwork reconciler
//!
//! A platform network is provisioned as an address pool and, for every type
//! except "other", a network bound to that pool. Deletion runs in reverse
//! order.

use super::{Reconcile, Reconciler, SyncState};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use async_trait::async_trait;
use crds::PlatformNetwork;
use kube::ResourceExt;
use platform_client::{AddressPool, AddressPoolOpts, Network, NetworkOpts, PlatformClientTrait};
use serde_json::{json, Map};
use tracing::{debug, info};

#[async_trait]
impl Reconcile for PlatformNetwork {
    const TOGGLE: &'static str = names::PLATFORM_NETWORK;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_platform_network(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.delete_platform_network(self).await
    }
}

fn ranges(network: &PlatformNetwork) -> Option<Vec<Vec<String>>> {
    let ranges = &network.spec.allocation.ranges;
    if ranges.is_empty() {
        return None;
    }
    Some(
        ranges
            .iter()
            .map(|r| vec![r.start.clone(), r.end.clone()])
            .collect(),
    )
}

/// Gateway sent to the platform; pools of type "other" never carry one.
fn gateway(network: &PlatformNetwork) -> Option<String> {
    if network.spec.has_network() {
        network.spec.gateway.clone()
    } else {
        None
    }
}

fn pool_create_opts(network: &PlatformNetwork) -> AddressPoolOpts {
    AddressPoolOpts {
        name: Some(network.name_any()),
        network: Some(network.spec.subnet.clone()),
        prefix: Some(network.spec.prefix),
        gateway: gateway(network),
        order: network.spec.allocation.order.clone(),
        ranges: ranges(network),
    }
}

/// Attributes of the pool that differ from the declared state, `None` when in sync.
pub(crate) fn pool_update_opts(network: &PlatformNetwork, pool: &AddressPool) -> Option<AddressPoolOpts> {
    let mut opts = AddressPoolOpts::default();

    if pool.name != network.name_any() {
        opts.name = Some(network.name_any());
    }
    if pool.network != network.spec.subnet {
        opts.network = Some(network.spec.subnet.clone());
    }
    if pool.prefix != network.spec.prefix {
        opts.prefix = Some(network.spec.prefix);
    }
    let gateway = gateway(network);
    if gateway.is_some() && pool.gateway != gateway {
        opts.gateway = gateway;
    }
    if let Some(order) = &network.spec.allocation.order {
        if !pool.order.eq_ignore_ascii_case(order) {
            opts.order = Some(order.clone());
        }
    }
    if let Some(ranges) = ranges(network) {
        if pool.ranges != ranges {
            opts.ranges = Some(ranges);
        }
    }

    (!opts.is_empty()).then_some(opts)
}

impl Reconciler {
    pub async fn reconcile_platform_network(&self, network: &PlatformNetwork) -> Result<()> {
        let client = self.client_of(network)?;
        let status = network.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_platform_network(client.as_ref(), network, previous.reconciled, &mut fields)
            .await;

        let status_result = self
            .sync_status(network, previous, result.is_ok(), fields)
            .await;
        result.and(status_result)
    }

    async fn sync_platform_network(
        &self,
        client: &dyn PlatformClientTrait,
        network: &PlatformNetwork,
        reconciled: bool,
        fields: &mut Map<String, serde_json::Value>,
    ) -> Result<()> {
        let pool = match find_pool(client, network).await? {
            Some(pool) => {
                if let Some(opts) = pool_update_opts(network, &pool) {
                    self.allow_change(network, names::PLATFORM_NETWORK, reconciled, false)?;
                    info!("Updating address pool {} of {}: {:?}", pool.id, network.name_any(), opts);
                    let pool = client.update_address_pool(&pool.id, &opts).await?;
                    events::normal(self.store(), network, REASON_UPDATED, "address pool has been updated").await;
                    pool
                } else {
                    pool
                }
            }
            None => {
                self.allow_change(network, names::PLATFORM_NETWORK, reconciled, true)?;
                let opts = pool_create_opts(network);
                info!("Creating address pool for {}: {:?}", network.name_any(), opts);
                let pool = client.create_address_pool(&opts).await?;
                events::normal(self.store(), network, REASON_CREATED, "address pool has been created").await;
                pool
            }
        };
        fields.insert("poolUUID".to_string(), json!(pool.id));

        if !network.spec.has_network() {
            return Ok(());
        }

        let platform_network = match find_network(client, network).await? {
            Some(existing) => {
                // Networks cannot be updated in place
                if existing.network_type != network.spec.network_type
                    || existing.dynamic != network.spec.is_dynamic()
                    || existing.pool_uuid != pool.id
                {
                    return Err(ControllerError::ResourceConfigurationDependency(format!(
                        "platform network {} exists with type {} (dynamic: {}); delete and recreate it to change its attributes",
                        existing.name, existing.network_type, existing.dynamic
                    )));
                }
                existing
            }
            None => {
                self.allow_change(network, names::PLATFORM_NETWORK, reconciled, true)?;
                let opts = NetworkOpts {
                    name: network.name_any(),
                    network_type: network.spec.network_type.clone(),
                    dynamic: network.spec.is_dynamic(),
                    pool_uuid: pool.id.clone(),
                };
                info!("Creating platform network {}: {:?}", network.name_any(), opts);
                let created = client.create_network(&opts).await?;
                events::normal(self.store(), network, REASON_CREATED, "platform network has been created").await;
                created
            }
        };
        fields.insert("id".to_string(), json!(platform_network.id));
        Ok(())
    }

    /// Delete the network then its pool. Resources still in use are left
    /// behind with a log entry.
    pub async fn delete_platform_network(&self, network: &PlatformNetwork) -> Result<()> {
        let client = self.client_of(network)?;

        if network.spec.has_network() {
            if let Some(existing) = find_network(client.as_ref(), network).await? {
                match client.delete_network(&existing.id).await {
                    Ok(()) => {
                        events::normal(self.store(), network, REASON_DELETED, "network has been deleted").await;
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) if e.is_conflict() => {
                        info!("Network {} is still in use; deleting local resource anyway", existing.id);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if let Some(pool) = find_pool(client.as_ref(), network).await? {
            match client.delete_address_pool(&pool.id).await {
                Ok(()) => {
                    events::normal(self.store(), network, REASON_DELETED, "address pool has been deleted").await;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) if e.is_conflict() => {
                    info!("Address pool {} is still in use; deleting local resource anyway", pool.id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Pool recorded in the status, falling back to a lookup by name.
async fn find_pool(client: &dyn PlatformClientTrait, network: &PlatformNetwork) -> Result<Option<AddressPool>> {
    let pools = client.list_address_pools().await?;
    let recorded = network.status.as_ref().and_then(|s| s.pool_uuid.as_deref());

    if let Some(id) = recorded {
        if let Some(pool) = pools.iter().find(|p| p.id == id) {
            return Ok(Some(pool.clone()));
        }
        debug!("Address pool {} no longer exists", id);
    }
    Ok(pools.into_iter().find(|p| p.name == network.name_any()))
}

async fn find_network(client: &dyn PlatformClientTrait, network: &PlatformNetwork) -> Result<Option<Network>> {
    let networks = client.list_networks().await?;
    let recorded = network.status.as_ref().and_then(|s| s.id.as_deref());

    if let Some(id) = recorded {
        if let Some(existing) = networks.iter().find(|n| n.id == id) {
            return Ok(Some(existing.clone()));
        }
        debug!("Platform network {} no longer exists", id);
    }
    Ok(networks.into_iter().find(|n| n.name == network.name_any()))
}
