//! PtpInstance and PtpInterface reconcilers

use super::{Reconcile, Reconciler, SyncState};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use crate::store;
use async_trait::async_trait;
use crds::{PtpInstance, PtpInterface};
use kube::ResourceExt;
use platform_client::{PlatformClientTrait, PtpOwnerOpts};
use serde_json::{json, Map};
use tracing::{debug, info};

#[async_trait]
impl Reconcile for PtpInstance {
    const TOGGLE: &'static str = names::PTP_INSTANCE;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_ptp_instance(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.delete_ptp_instance(self).await
    }
}

#[async_trait]
impl Reconcile for PtpInterface {
    const TOGGLE: &'static str = names::PTP_INTERFACE;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_ptp_interface(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.delete_ptp_interface(self).await
    }
}

/// Parameters to add and remove to turn `current` into `desired`.
pub(crate) fn parameter_delta(desired: &[String], current: &[String]) -> (Vec<String>, Vec<String>) {
    let add = desired
        .iter()
        .filter(|p| !current.contains(p))
        .cloned()
        .collect();
    let remove = current
        .iter()
        .filter(|p| !desired.contains(p))
        .cloned()
        .collect();
    (add, remove)
}

impl Reconciler {
    pub async fn reconcile_ptp_instance(&self, instance: &PtpInstance) -> Result<()> {
        let client = self.client_of(instance)?;
        let status = instance.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_ptp_instance(client.as_ref(), instance, previous.reconciled, &mut fields)
            .await;
        let status_result = self.sync_status(instance, previous, result.is_ok(), fields).await;
        result.and(status_result)
    }

    async fn sync_ptp_instance(
        &self,
        client: &dyn PlatformClientTrait,
        instance: &PtpInstance,
        reconciled: bool,
        fields: &mut Map<String, serde_json::Value>,
    ) -> Result<()> {
        let recorded = instance.status.as_ref().and_then(|s| s.id.clone());
        let existing = find_ptp_instance(client, recorded.as_deref(), &instance.name_any()).await?;

        let current = match existing {
            Some(current) => {
                if current.service != instance.spec.service {
                    return Err(ControllerError::ResourceConfigurationDependency(format!(
                        "ptp instance {} runs service {}; delete and recreate it to change its service",
                        current.name, current.service
                    )));
                }
                current
            }
            None => {
                self.allow_change(instance, names::PTP_INSTANCE, reconciled, true)?;
                let opts = PtpOwnerOpts {
                    name: instance.name_any(),
                    service: Some(instance.spec.service.clone()),
                    ptp_instance_id: None,
                };
                info!("Creating PTP instance {}", opts.name);
                let created = client.create_ptp_instance(&opts).await?;
                events::normal(self.store(), instance, REASON_CREATED, "ptp instance has been created").await;
                created
            }
        };
        fields.insert("id".to_string(), json!(current.id));

        let (add, remove) = parameter_delta(&instance.spec.parameters, &current.parameters);
        if !add.is_empty() || !remove.is_empty() {
            self.allow_change(instance, names::PTP_INSTANCE, reconciled, false)?;
            info!("Updating PTP instance {} parameters: +{:?} -{:?}", current.id, add, remove);
            client
                .update_ptp_instance_parameters(&current.id, &add, &remove)
                .await?;
            events::normal(self.store(), instance, REASON_UPDATED, "ptp instance parameters have been updated").await;
        }
        Ok(())
    }

    pub async fn delete_ptp_instance(&self, instance: &PtpInstance) -> Result<()> {
        let client = self.client_of(instance)?;
        let recorded = instance.status.as_ref().and_then(|s| s.id.clone());
        let Some(current) = find_ptp_instance(client.as_ref(), recorded.as_deref(), &instance.name_any()).await? else {
            return Ok(());
        };

        match client.delete_ptp_instance(&current.id).await {
            Ok(()) => {
                events::normal(self.store(), instance, REASON_DELETED, "ptp instance has been deleted").await;
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) if e.is_conflict() => {
                info!("PTP instance {} is still in use; deleting local resource anyway", current.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn reconcile_ptp_interface(&self, interface: &PtpInterface) -> Result<()> {
        let client = self.client_of(interface)?;
        let status = interface.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_ptp_interface(client.as_ref(), interface, previous.reconciled, &mut fields)
            .await;
        let status_result = self.sync_status(interface, previous, result.is_ok(), fields).await;
        result.and(status_result)
    }

    /// Platform id of the instance an interface belongs to.
    async fn parent_instance_id(&self, client: &dyn PlatformClientTrait, interface: &PtpInterface) -> Result<String> {
        let namespace = interface.namespace().unwrap_or_default();
        let parent_name = &interface.spec.ptp_instance;

        let Some(parent) = store::get::<PtpInstance>(self.store(), &namespace, parent_name).await? else {
            return Err(ControllerError::MissingKubernetesResource(format!(
                "ptp instance {}/{}",
                namespace, parent_name
            )));
        };

        let recorded = parent.status.as_ref().and_then(|s| s.id.clone());
        match find_ptp_instance(client, recorded.as_deref(), parent_name).await? {
            Some(found) => Ok(found.id),
            None => Err(ControllerError::ResourceStatusDependency(format!(
                "ptp instance {} has not been provisioned yet",
                parent_name
            ))),
        }
    }

    async fn sync_ptp_interface(
        &self,
        client: &dyn PlatformClientTrait,
        interface: &PtpInterface,
        reconciled: bool,
        fields: &mut Map<String, serde_json::Value>,
    ) -> Result<()> {
        let recorded = interface.status.as_ref().and_then(|s| s.id.clone());
        let existing = find_ptp_interface(client, recorded.as_deref(), &interface.name_any()).await?;

        let current = match existing {
            Some(current) => {
                if current.ptp_instance_name.as_deref().is_some_and(|n| n != interface.spec.ptp_instance) {
                    return Err(ControllerError::ResourceConfigurationDependency(format!(
                        "ptp interface {} belongs to instance {}; delete and recreate it to move it",
                        current.name,
                        current.ptp_instance_name.as_deref().unwrap_or_default()
                    )));
                }
                current
            }
            None => {
                let instance_id = self.parent_instance_id(client, interface).await?;
                self.allow_change(interface, names::PTP_INTERFACE, reconciled, true)?;
                let opts = PtpOwnerOpts {
                    name: interface.name_any(),
                    service: None,
                    ptp_instance_id: Some(instance_id),
                };
                info!("Creating PTP interface {}", opts.name);
                let created = client.create_ptp_interface(&opts).await?;
                events::normal(self.store(), interface, REASON_CREATED, "ptp interface has been created").await;
                created
            }
        };
        fields.insert("id".to_string(), json!(current.id));

        let (add, remove) = parameter_delta(&interface.spec.parameters, &current.parameters);
        if !add.is_empty() || !remove.is_empty() {
            self.allow_change(interface, names::PTP_INTERFACE, reconciled, false)?;
            info!("Updating PTP interface {} parameters: +{:?} -{:?}", current.id, add, remove);
            client
                .update_ptp_interface_parameters(&current.id, &add, &remove)
                .await?;
            events::normal(self.store(), interface, REASON_UPDATED, "ptp interface parameters have been updated").await;
        }
        Ok(())
    }

    pub async fn delete_ptp_interface(&self, interface: &PtpInterface) -> Result<()> {
        let client = self.client_of(interface)?;
        let recorded = interface.status.as_ref().and_then(|s| s.id.clone());
        let Some(current) = find_ptp_interface(client.as_ref(), recorded.as_deref(), &interface.name_any()).await? else {
            debug!("PTP interface {} not present on the platform", interface.name_any());
            return Ok(());
        };

        match client.delete_ptp_interface(&current.id).await {
            Ok(()) => {
                events::normal(self.store(), interface, REASON_DELETED, "ptp interface has been deleted").await;
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) if e.is_conflict() => {
                info!("PTP interface {} is still in use; deleting local resource anyway", current.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn find_ptp_instance(
    client: &dyn PlatformClientTrait,
    id: Option<&str>,
    name: &str,
) -> Result<Option<platform_client::PtpInstance>> {
    let instances = client.list_ptp_instances().await?;
    if let Some(id) = id {
        if let Some(found) = instances.iter().find(|i| i.id == id) {
            return Ok(Some(found.clone()));
        }
    }
    Ok(instances.into_iter().find(|i| i.name == name))
}

async fn find_ptp_interface(
    client: &dyn PlatformClientTrait,
    id: Option<&str>,
    name: &str,
) -> Result<Option<platform_client::PtpInterface>> {
    let interfaces = client.list_ptp_interfaces().await?;
    if let Some(id) = id {
        if let Some(found) = interfaces.iter().find(|i| i.id == id) {
            return Ok(Some(found.clone()));
        }
    }
    Ok(interfaces.into_iter().find(|i| i.name == name))
}
