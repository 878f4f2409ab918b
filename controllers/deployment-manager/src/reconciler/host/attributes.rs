//! Host attributes, board management, labels, power and lock state

use super::defaults::LiveHost;
use super::diff::{bm_configured, BM_TYPE_NONE};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_DEPENDENCY, REASON_UPDATED};
use crate::monitor::EnabledControllers;
use crate::reconciler::system::filesystems::required_controllers;
use crate::reconciler::Reconciler;
use crds::{Host, HostProfileSpec, ADMIN_LOCKED, ADMIN_UNLOCKED};
use kube::ResourceExt;
use platform_client::{
    Host as HostRecord, HostAction, HostLocation, HostOpts, Label, PlatformClientTrait, PERSONALITY_CONTROLLER,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

const SECRET_USERNAME_KEY: &str = "username";
const SECRET_PASSWORD_KEY: &str = "password";

fn differs(desired: Option<&String>, current: Option<&String>) -> Option<String> {
    desired.filter(|d| current != Some(*d)).cloned()
}

/// Plain attribute changes needed on the host record. The boot MAC is only
/// sent when the host is being created.
pub(crate) fn attribute_update(hostname: &str, desired: &HostProfileSpec, record: &HostRecord, creating: bool) -> HostOpts {
    let mut opts = HostOpts {
        hostname: (record.hostname() != hostname).then(|| hostname.to_string()),
        personality: differs(desired.personality.as_ref(), record.personality.as_ref()),
        install_output: differs(desired.install_output.as_ref(), record.install_output.as_ref()),
        console: differs(desired.console.as_ref(), record.console.as_ref()),
        root_device: differs(desired.root_device.as_ref(), record.root_device.as_ref()),
        boot_device: differs(desired.boot_device.as_ref(), record.boot_device.as_ref()),
        clock_synchronization: differs(
            desired.clock_synchronization.as_ref(),
            record.clock_synchronization.as_ref(),
        ),
        ..Default::default()
    };

    if let Some(subfunctions) = desired.subfunctions.as_ref() {
        let wanted: BTreeSet<&str> = subfunctions.iter().map(String::as_str).collect();
        let live = record.subfunction_list();
        let current: BTreeSet<&str> = live.iter().map(String::as_str).collect();
        if wanted != current {
            opts.subfunctions = Some(subfunctions.join(","));
        }
    }

    if let Some(location) = desired.location.as_ref() {
        if record.location.name.as_ref() != Some(location) {
            opts.location = Some(HostLocation {
                name: Some(location.clone()),
            });
        }
    }

    if creating {
        opts.boot_mac = desired.boot_mac.clone();
    }
    opts
}

/// Labels to delete and labels to assign so that the host carries exactly
/// `desired`. A label whose value changed is deleted and assigned again.
pub(crate) fn label_changes<'a>(
    desired: &BTreeMap<String, String>,
    current: &'a [Label],
) -> (Vec<&'a Label>, BTreeMap<String, String>) {
    let stale = current
        .iter()
        .filter(|l| desired.get(&l.key) != Some(&l.value))
        .collect::<Vec<_>>();
    let missing = desired
        .iter()
        .filter(|(key, value)| !current.iter().any(|l| &l.key == *key && &l.value == *value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (stale, missing)
}

fn secret_value(data: &BTreeMap<String, Vec<u8>>, secret: &str, key: &str) -> Result<String> {
    data.get(key)
        .map(|v| String::from_utf8_lossy(v).trim().to_string())
        .ok_or_else(|| ControllerError::UserData(format!("secret {} is missing the {:?} key", secret, key)))
}

impl Reconciler {
    /// Every attribute change needed on the host record, board management
    /// included.
    pub(crate) async fn host_update(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        record: &HostRecord,
        creating: bool,
    ) -> Result<HostOpts> {
        let mut opts = attribute_update(&host.name_any(), desired, record, creating);
        if self.config.is_enabled(names::HOST_BMC) {
            self.board_management_update(client, host, desired, record, &mut opts).await?;
        }
        Ok(opts)
    }

    async fn board_management_update(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        record: &HostRecord,
        opts: &mut HostOpts,
    ) -> Result<()> {
        let Some(bm) = desired.board_management.as_ref() else {
            if bm_configured(record) {
                opts.bm_type = Some(BM_TYPE_NONE.to_string());
            }
            return Ok(());
        };

        opts.bm_address = differs(bm.address.as_ref(), record.bm_address.as_ref());
        opts.bm_type = differs(bm.bm_type.as_ref(), record.bm_type.as_ref());
        if bm.bm_type.as_deref() == Some(BM_TYPE_NONE) {
            return Ok(());
        }

        let Some(secret) = bm
            .credentials
            .as_ref()
            .and_then(|c| c.password.as_ref())
            .map(|p| p.secret.as_str())
        else {
            return Ok(());
        };
        let data = self.secret(host, secret).await?;
        let username = secret_value(&data, secret, SECRET_USERNAME_KEY)?;
        let password = secret_value(&data, secret, SECRET_PASSWORD_KEY)?;

        if record.bm_username.as_ref() != Some(&username) {
            if self.config.https_required(names::HOST_BMC) && !client.is_https() {
                return Err(ControllerError::HttpsClientRequired(
                    "it is unsafe to configure BM credentials thru a non HTTPS URL".to_string(),
                ));
            }
            opts.bm_username = Some(username);
            opts.bm_password = Some(password);
        }
        Ok(())
    }

    pub(crate) async fn reconcile_attributes(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        let opts = self.host_update(client, host, desired, &live.host, false).await?;
        if opts.is_empty() {
            return Ok(());
        }

        info!("Updating attributes of host {}", live.id());
        live.host = client.update_host(live.id(), &opts).await?;
        events::normal(self.store(), host, REASON_UPDATED, "attributes have been updated").await;
        Ok(())
    }

    pub(crate) async fn reconcile_labels(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        let Some(labels) = desired.labels.as_ref() else {
            return Ok(());
        };

        let (stale, missing) = label_changes(labels, &live.labels);
        if stale.is_empty() && missing.is_empty() {
            return Ok(());
        }

        for label in stale {
            client.delete_label(&label.id).await?;
            events::normal(self.store(), host, REASON_UPDATED, format!("label {:?} removed", label.key)).await;
        }
        if !missing.is_empty() {
            client.assign_labels(live.id(), &missing).await?;
            let keys = missing.keys().cloned().collect::<Vec<_>>().join(", ");
            events::normal(self.store(), host, REASON_UPDATED, format!("labels {} added", keys)).await;
        }
        live.labels = client.list_labels(live.id()).await?;
        Ok(())
    }

    /// Power the host on or off through its board management controller.
    pub(crate) async fn reconcile_power(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        let Some(power_on) = desired.power_on else {
            return Ok(());
        };
        let action = match (power_on, live.host.is_powered_off()) {
            (true, true) => HostAction::PowerOn,
            (false, false) => HostAction::PowerOff,
            _ => return Ok(()),
        };

        if !bm_configured(&live.host) {
            let message = "board management controller required for power on/off actions";
            events::warning(self.store(), host, REASON_DEPENDENCY, message).await;
            return Err(ControllerError::ResourceConfigurationDependency(message.to_string()));
        }

        info!("Host {}: {}", live.id(), action);
        live.host = client.host_action(live.id(), action).await?;
        events::normal(
            self.store(),
            host,
            REASON_UPDATED,
            format!("power-on state has been changed to: {}", power_on),
        )
        .await;
        Err(ControllerError::ResourceStatusDependency(
            "waiting for power-on state change".to_string(),
        ))
    }

    /// Lock the host when it is meant to end up locked. Runs while the host
    /// is still in service.
    pub(crate) async fn reconcile_initial_state(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if desired.administrative_state.as_deref() != Some(ADMIN_LOCKED)
            || live.host.administrative_state == ADMIN_LOCKED
        {
            return Ok(());
        }

        info!("Locking host {}", live.id());
        live.host = client.host_action(live.id(), HostAction::Lock).await?;
        events::normal(self.store(), host, REASON_UPDATED, "host has been locked").await;
        Err(ControllerError::ResourceStatusDependency(
            "waiting for host state change".to_string(),
        ))
    }

    /// Unlock the host once its configuration has been applied. Hosts other
    /// than controllers wait for every controller to be enabled first.
    pub(crate) async fn reconcile_final_state(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if desired.administrative_state.as_deref() != Some(ADMIN_UNLOCKED)
            || live.host.administrative_state == ADMIN_UNLOCKED
        {
            return Ok(());
        }

        if desired.personality() != PERSONALITY_CONTROLLER {
            let namespace = host.namespace().unwrap_or_default();
            let required = required_controllers(&self.manager.system_mode(&namespace).unwrap_or_default());
            let enabled = client
                .list_hosts()
                .await?
                .iter()
                .filter(|h| h.personality() == PERSONALITY_CONTROLLER && h.is_unlocked_enabled())
                .count();
            if enabled < required {
                return Err(self.wait_for(
                    host,
                    EnabledControllers { required },
                    "waiting for all controller nodes to be ready",
                ));
            }
        }

        info!("Unlocking host {}", live.id());
        live.host = client.host_action(live.id(), HostAction::Unlock).await?;
        events::normal(self.store(), host, REASON_UPDATED, "host has been unlocked").await;
        Err(ControllerError::ResourceStatusDependency(
            "waiting for host state change".to_string(),
        ))
    }
}
