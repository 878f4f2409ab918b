//! Host reconciler
//!
//! A pass locates (or creates) the platform record of the Host, captures the
//! host's defaults on first sight, composes the effective profile and then
//! applies whatever differs. Changes are grouped by the administrative state
//! in which the platform accepts them: most of them need the host locked and
//! disabled, a few need it unlocked and enabled. A pass only ever applies the
//! group matching the current state and arms a monitor for the other one.

pub(crate) mod attributes;
pub(crate) mod defaults;
pub(crate) mod diff;
pub(crate) mod discovery;
pub(crate) mod memory;
pub(crate) mod networking;
pub(crate) mod processors;
pub(crate) mod profile;
pub(crate) mod storage;

#[cfg(test)]
mod host_test;
#[cfg(test)]
mod networking_test;
#[cfg(test)]
mod profile_test;
#[cfg(test)]
mod storage_test;

use super::{Reconcile, Reconciler, SyncState};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use crate::monitor::{
    DynamicHostAppears, HostState, HostStateChange, HostStateSelector, HostStateSnapshot, InventoryCollected,
    MonitorOwner, ProvisioningAllowed,
};
use crate::store;
use async_trait::async_trait;
use crds::{Host, HostProfile, HostProfileSpec};
use defaults::LiveHost;
use diff::{host_diff, osd_provisioning_state, HostDiff};
use kube::ResourceExt;
use platform_client::{Host as HostRecord, HostAction, PlatformClientTrait, ADMIN_LOCKED};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[async_trait]
impl Reconcile for Host {
    const TOGGLE: &'static str = names::HOST;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.reconcile_host(self).await
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.delete_host(self).await
    }
}

fn state_selector(selector: HostStateSelector, record: &HostRecord) -> HostState {
    HostState {
        host_id: record.id.clone(),
        selector,
    }
}

fn record_state(fields: &mut Map<String, Value>, record: &HostRecord) {
    fields.insert("id".to_string(), Value::String(record.id.clone()));
    fields.insert(
        "administrativeState".to_string(),
        Value::String(record.administrative_state.clone()),
    );
    fields.insert(
        "operationalStatus".to_string(),
        Value::String(record.operational_status.clone()),
    );
    fields.insert(
        "availabilityStatus".to_string(),
        Value::String(record.availability_status.clone()),
    );
}

impl Reconciler {
    pub async fn reconcile_host(&self, host: &Host) -> Result<()> {
        let client = self.client_of(host)?;
        let status = host.status.clone().unwrap_or_default();
        let previous = SyncState {
            in_sync: status.in_sync,
            reconciled: status.reconciled,
        };

        let mut fields = Map::new();
        let result = self
            .sync_host(client.as_ref(), host, previous.reconciled, &mut fields)
            .await;

        let status_result = self.sync_status(host, previous, result.is_ok(), fields).await;
        result.and(status_result)
    }

    async fn profiles(&self, host: &Host) -> Result<BTreeMap<String, HostProfile>> {
        let namespace = host.namespace().unwrap_or_default();
        Ok(store::list::<HostProfile>(self.store(), &namespace)
            .await?
            .into_iter()
            .map(|p| (p.name_any(), p))
            .collect())
    }

    /// Platform record previously bound to the Host, if it still exists.
    async fn bound_record(&self, client: &dyn PlatformClientTrait, host: &Host) -> Result<Option<HostRecord>> {
        let Some(id) = host.status.as_ref().and_then(|s| s.id.as_deref()).filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        match client.get_host(id).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                info!("Host {} record {} no longer exists", host.name_any(), id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sync_host(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        reconciled: bool,
        fields: &mut Map<String, Value>,
    ) -> Result<()> {
        let profiles = self.profiles(host).await?;
        let composite = profile::compose(host, &profiles)?;
        profile::validate(&host.name_any(), host.spec.match_info.as_ref(), &composite)?;

        let record = match self.bound_record(client, host).await? {
            Some(record) => record,
            None => self.discover_host(client, host, &composite, reconciled).await?,
        };

        let bound_id = host.status.as_ref().and_then(|s| s.id.as_deref());
        let rebound = bound_id != Some(record.id.as_str());
        record_state(fields, &record);
        if rebound {
            // A different record needs fresh defaults
            fields.insert("defaults".to_string(), Value::Null);
        }

        if !record.is_idle() {
            return Err(self.wait_for(
                host,
                state_selector(HostStateSelector::Idle, &record),
                "waiting for a stable state",
            ));
        }

        let mut live = LiveHost::load(client, record).await?;

        let stored = if rebound {
            None
        } else {
            host.defaults()
                .map_err(|e| ControllerError::UserData(format!("invalid defaults snapshot: {}", e)))?
        };
        let (defaults, current) = match stored {
            Some(defaults) => {
                let current = defaults::profile_of(&live)?;
                (defaults, current)
            }
            None => {
                let defaults = self.capture_defaults(host, &live, fields).await?;
                (defaults.clone(), defaults)
            }
        };

        let desired = profile::backed_by_defaults(Some(&defaults), &composite);
        let namespace = host.namespace().unwrap_or_default();
        let system_type = self.manager.system_type(&namespace).unwrap_or_default();
        let diff = host_diff(&self.config, &system_type, &host.name_any(), &desired, &current, &live.host);
        if diff.is_empty() {
            debug!("Host {} matches its profile", host.name_any());
            self.watch_state(host, &live.host);
            return Ok(());
        }
        info!(
            "Host {} differs from its profile; enabled: {:?}, disabled: {:?}",
            host.name_any(),
            diff.enabled,
            diff.disabled
        );

        if let Err(e) = self.allow_change(host, names::HOST, reconciled, false) {
            if !live.host.is_unlocked_available() {
                return Err(self.wait_for(
                    host,
                    state_selector(HostStateSelector::UnlockedAvailable, &live.host),
                    "waiting for the host to reach available state",
                ));
            }
            return Err(e);
        }

        self.reconcile_by_state(client, host, &desired, &diff, &mut live).await?;
        record_state(fields, &live.host);
        self.watch_state(host, &live.host);
        Ok(())
    }

    /// Arm the out-of-band state change watch of an in-sync host.
    fn watch_state(&self, host: &Host, record: &HostRecord) {
        self.manager.start_monitor(
            MonitorOwner::of(host),
            Box::new(HostStateChange {
                host_id: record.id.clone(),
                snapshot: HostStateSnapshot::of(record),
            }),
        );
    }

    /// Find the record of a Host not yet bound, creating it for static
    /// provisioning.
    async fn discover_host(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        composite: &HostProfileSpec,
        reconciled: bool,
    ) -> Result<HostRecord> {
        let hostname = host.name_any();
        let hosts = client.list_hosts().await?;
        let found = discovery::find_host(
            &hosts,
            &hostname,
            host.spec.match_info.as_ref(),
            composite.boot_mac.as_deref(),
        )
        .cloned();
        let allowed = discovery::provisioning_allowed(&hosts);

        match found {
            Some(record) if record.hostname().is_empty() => {
                if !allowed {
                    return Err(self.wait_for(
                        host,
                        ProvisioningAllowed,
                        "waiting for system to allow host provisioning",
                    ));
                }
                info!("Host {} found as {}; setting initial attributes", hostname, record.id);
                let opts = self.host_update(client, host, composite, &record, false).await?;
                if opts.is_empty() {
                    return Ok(record);
                }
                let record = client.update_host(&record.id, &opts).await?;
                events::normal(self.store(), host, REASON_UPDATED, "attributes have been updated").await;
                Ok(record)
            }
            Some(record) => {
                debug!("Host {} found as {}", hostname, record.id);
                Ok(record)
            }
            None if !composite.is_static() => Err(self.wait_for(
                host,
                DynamicHostAppears {
                    hostname,
                    match_info: host.spec.match_info.clone(),
                    boot_mac: composite.boot_mac.clone(),
                },
                "waiting for dynamic host to appear in inventory",
            )),
            None if allowed => {
                self.allow_change(host, names::HOST, reconciled, true)?;

                let opts = self
                    .host_update(client, host, composite, &HostRecord::default(), true)
                    .await?;
                info!("Creating static host {}", hostname);
                let mut record = client.create_host(&opts).await?;

                if composite.board_management.is_some() && composite.power_on == Some(true) {
                    record = client.host_action(&record.id, HostAction::Reinstall).await?;
                }
                events::normal(self.store(), host, REASON_CREATED, "static host has been created").await;
                Ok(record)
            }
            None => Err(self.wait_for(
                host,
                ProvisioningAllowed,
                "waiting for system to allow creating static hosts",
            )),
        }
    }

    /// Snapshot the live configuration as the host's defaults once its
    /// inventory is complete.
    async fn capture_defaults(
        &self,
        host: &Host,
        live: &LiveHost,
        fields: &mut Map<String, Value>,
    ) -> Result<HostProfileSpec> {
        if !live.host.is_online() || !live.host.is_inventory_collected() || live.disks.is_empty() {
            return Err(self.wait_for(
                host,
                InventoryCollected {
                    host_id: live.id().to_string(),
                },
                "waiting for inventory collection to complete before collecting defaults",
            ));
        }

        info!("Collecting defaults of host {}", host.name_any());
        let defaults = defaults::profile_of(live)?;
        fields.insert("defaults".to_string(), Value::String(serde_json::to_string(&defaults)?));
        events::normal(self.store(), host, REASON_CREATED, "defaults collected and stored").await;
        Ok(defaults)
    }

    async fn reconcile_by_state(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        diff: &HostDiff,
        live: &mut LiveHost,
    ) -> Result<()> {
        if live.host.is_unlocked_enabled() {
            if !diff.enabled.is_empty() {
                self.reconcile_enabled_host(client, host, desired, live).await?;
            }
            if !diff.disabled.is_empty() {
                return Err(self.wait_for(
                    host,
                    state_selector(HostStateSelector::LockedDisabled, &live.host),
                    "waiting for locked state before applying out-of-service attributes",
                ));
            }
            return Ok(());
        }

        if live.host.is_locked_disabled() {
            if !diff.disabled.is_empty() {
                self.reconcile_disabled_host(client, host, desired, live).await?;
            }
            if !diff.enabled.is_empty() {
                return Err(self.wait_for(
                    host,
                    state_selector(HostStateSelector::UnlockedEnabled, &live.host),
                    "waiting for the unlocked state before applying in-service attributes",
                ));
            }
            return Ok(());
        }

        Err(self.wait_for(
            host,
            state_selector(HostStateSelector::Idle, &live.host),
            "waiting for a stable state",
        ))
    }

    /// Changes applied while the host is in service.
    async fn reconcile_enabled_host(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        self.reconcile_initial_state(client, host, desired, live).await?;

        if !live.host.is_unlocked_enabled() {
            return Err(self.wait_for(
                host,
                state_selector(HostStateSelector::Idle, &live.host),
                "enabled host changed state during reconciliation",
            ));
        }

        let namespace = host.namespace().unwrap_or_default();
        let system_type = self.manager.system_type(&namespace).unwrap_or_default();
        if self.config.is_enabled(names::HOST_STORAGE)
            && osd_provisioning_state(&system_type, live.host.personality()).allows(true)
        {
            if let Some(storage) = desired.storage.as_ref() {
                self.reconcile_osds(client, host, storage, live).await?;
            }
        }

        self.reconcile_filesystems(client, host, desired, live).await
    }

    /// Changes applied while the host is locked, in dependency order.
    async fn reconcile_disabled_host(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        self.reconcile_attributes(client, host, desired, live).await?;
        self.reconcile_labels(client, host, desired, live).await?;
        self.reconcile_processors(client, host, desired, live).await?;
        self.reconcile_memory(client, host, desired, live).await?;
        self.reconcile_networking(client, host, desired, live).await?;
        self.reconcile_storage(client, host, desired, live).await?;
        self.reconcile_power(client, host, desired, live).await?;
        self.reconcile_final_state(client, host, desired, live).await
    }

    /// Remove the platform record of a deleted Host. The active controller
    /// is never removed.
    pub async fn delete_host(&self, host: &Host) -> Result<()> {
        let client = self.client_of(host)?;
        let record = match self.bound_record(client.as_ref(), host).await? {
            Some(record) => Some(record),
            None => {
                let hosts = client.list_hosts().await?;
                discovery::find_host(&hosts, &host.name_any(), host.spec.match_info.as_ref(), None).cloned()
            }
        };
        let Some(mut record) = record else {
            info!("Host {} being deleted is no longer present on the platform", host.name_any());
            return Ok(());
        };

        if record.is_active_controller() {
            info!("Skipping delete of active controller {}", host.name_any());
            return Ok(());
        }

        if !record.is_idle() {
            return Err(self.wait_for(
                host,
                state_selector(HostStateSelector::Idle, &record),
                "waiting for a stable state before deleting host",
            ));
        }

        if !record.is_locked_disabled() {
            if record.administrative_state != ADMIN_LOCKED {
                info!("Locking host {} before deleting it", record.id);
                record = client.host_action(&record.id, HostAction::Lock).await?;
                events::normal(self.store(), host, REASON_UPDATED, "host has been locked").await;
            }
            if !record.is_locked_disabled() {
                return Err(self.wait_for(
                    host,
                    state_selector(HostStateSelector::LockedDisabled, &record),
                    "waiting for host to lock before deleting it",
                ));
            }
        }

        info!("Deleting host {} ({})", host.name_any(), record.id);
        match client.delete_host(&record.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        events::normal(self.store(), host, REASON_DELETED, "host has been deleted").await;
        Ok(())
    }
}
