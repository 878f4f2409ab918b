//! DataNetwork reconciler

use super::{Reconcile, Reconciler, SyncState};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use async_trait::async_trait;
use crds::{DataNetwork, DATANETWORK_VXLAN};
use kube::ResourceExt;
use platform_client::{DataNetwork as PlatformDataNetwork, DataNetworkOpts, PlatformClientTrait};
use serde_json::{json, Map};
use tracing::{debug, info};

#[async_trait]
impl Reconcile for DataNetwork {
    const TOGGLE: &'static str = names::DATA_NETWORK;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_data_network(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.delete_data_network(self).await
    }
}

fn create_opts(network: &DataNetwork) -> DataNetworkOpts {
    let spec = &network.spec;
    let mut opts = DataNetworkOpts {
        name: Some(network.name_any()),
        network_type: Some(spec.network_type.clone()),
        description: spec.description.clone(),
        mtu: spec.mtu,
        ..Default::default()
    };

    if spec.network_type == DATANETWORK_VXLAN {
        if let Some(vxlan) = &spec.vxlan {
            opts.multicast_group = vxlan.multicast_group.clone();
            opts.udp_port = vxlan.udp_port;
            opts.ttl = vxlan.ttl;
            opts.mode = vxlan.endpoint_mode.clone();
        }
    }
    opts
}

/// Attributes of the platform data network that differ from the declared state.
pub(crate) fn update_opts(network: &DataNetwork, current: &PlatformDataNetwork) -> Option<DataNetworkOpts> {
    let spec = &network.spec;
    let mut opts = DataNetworkOpts::default();

    if spec.description.is_some() && spec.description != current.description {
        opts.description = spec.description.clone();
    }
    if let Some(mtu) = spec.mtu {
        if mtu != current.mtu {
            opts.mtu = Some(mtu);
        }
    }

    if spec.network_type == DATANETWORK_VXLAN {
        if let Some(vxlan) = &spec.vxlan {
            if vxlan.ttl.is_some() && vxlan.ttl != current.ttl {
                opts.ttl = vxlan.ttl;
            }
            if vxlan.endpoint_mode.is_some() && vxlan.endpoint_mode != current.mode {
                opts.mode = vxlan.endpoint_mode.clone();
            }
            if vxlan.multicast_group.is_some() && vxlan.multicast_group != current.multicast_group {
                opts.multicast_group = vxlan.multicast_group.clone();
            }
            if vxlan.udp_port.is_some() && vxlan.udp_port != current.udp_port {
                opts.udp_port = vxlan.udp_port;
            }
        }
    }

    (!opts.is_empty()).then_some(opts)
}

impl Reconciler {
    pub async fn reconcile_data_network(&self, network: &DataNetwork) -> Result<()> {
        let client = self.client_of(network)?;
        let status = network.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_data_network(client.as_ref(), network, previous.reconciled, &mut fields)
            .await;

        let status_result = self
            .sync_status(network, previous, result.is_ok(), fields)
            .await;
        result.and(status_result)
    }

    async fn sync_data_network(
        &self,
        client: &dyn PlatformClientTrait,
        network: &DataNetwork,
        reconciled: bool,
        fields: &mut Map<String, serde_json::Value>,
    ) -> Result<()> {
        let current = match find_data_network(client, network).await? {
            Some(current) => {
                if current.network_type != network.spec.network_type {
                    return Err(ControllerError::ResourceConfigurationDependency(format!(
                        "data network {} exists with type {}; delete and recreate it to change its type",
                        current.name, current.network_type
                    )));
                }

                match update_opts(network, &current) {
                    Some(opts) => {
                        self.allow_change(network, names::DATA_NETWORK, reconciled, false)?;
                        info!("Updating data network {}: {:?}", current.id, opts);
                        let updated = client.update_data_network(&current.id, &opts).await?;
                        events::normal(self.store(), network, REASON_UPDATED, "data network has been updated").await;
                        updated
                    }
                    None => current,
                }
            }
            None => {
                self.allow_change(network, names::DATA_NETWORK, reconciled, true)?;
                let opts = create_opts(network);
                info!("Creating data network {}: {:?}", network.name_any(), opts);
                let created = client.create_data_network(&opts).await?;
                events::normal(self.store(), network, REASON_CREATED, "data network has been created").await;
                created
            }
        };

        fields.insert("id".to_string(), json!(current.id));
        Ok(())
    }

    pub async fn delete_data_network(&self, network: &DataNetwork) -> Result<()> {
        let client = self.client_of(network)?;

        let Some(current) = find_data_network(client.as_ref(), network).await? else {
            debug!("Data network {} not present on the platform", network.name_any());
            return Ok(());
        };

        match client.delete_data_network(&current.id).await {
            Ok(()) => {
                events::normal(self.store(), network, REASON_DELETED, "data network has been deleted").await;
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) if e.is_conflict() => {
                info!("Data network {} is still in use; deleting local resource anyway", current.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn find_data_network(client: &dyn PlatformClientTrait, network: &DataNetwork) -> Result<Option<PlatformDataNetwork>> {
    let networks = client.list_data_networks().await?;
    if let Some(id) = network.status.as_ref().and_then(|s| s.id.as_deref()) {
        if let Some(found) = networks.iter().find(|n| n.id == id) {
            return Ok(Some(found.clone()));
        }
    }
    Ok(networks.into_iter().find(|n| n.name == network.name_any()))
}
