//! Controller filesystem resizing

use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_UPDATED};
use crate::monitor::{AvailableControllers, FilesystemResize};
use crate::reconciler::Reconciler;
use crds::{System, SystemSpec};
use platform_client::{
    FileSystemOpts, PlatformClientTrait, SystemRecord, FILESYSTEM_STATE_RESIZING, PERSONALITY_CONTROLLER,
    SYSTEM_MODE_SIMPLEX,
};
use tracing::info;

/// Controllers that must be available before a filesystem can grow.
pub(crate) fn required_controllers(system_mode: &str) -> usize {
    if system_mode.eq_ignore_ascii_case(SYSTEM_MODE_SIMPLEX) { 1 } else { 2 }
}

impl Reconciler {
    /// Grow controller filesystems to their requested size. Filesystems are
    /// never shrunk.
    pub(crate) async fn reconcile_controller_filesystems(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
        record: &SystemRecord,
    ) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_FILESYSTEMS) {
            return Ok(());
        }
        let Some(desired) = spec.storage.as_ref().and_then(|s| s.filesystems.as_ref()) else {
            return Ok(());
        };

        let current = client.list_controller_filesystems().await?;
        let mut updates = Vec::new();
        for fs in desired {
            let Some(existing) = current.iter().find(|c| c.name == fs.name) else {
                return Err(ControllerError::MissingSystemResource(format!(
                    "unknown controller filesystem {:?}",
                    fs.name
                )));
            };
            if fs.size <= existing.size {
                continue;
            }

            let required = required_controllers(&record.system_mode);
            let available = client
                .list_hosts()
                .await?
                .iter()
                .filter(|h| h.personality() == PERSONALITY_CONTROLLER && h.is_unlocked_available())
                .count();
            if available < required {
                return Err(self.wait_for(
                    system,
                    AvailableControllers { required },
                    format!(
                        "waiting for {} controller(s) in available state before resizing filesystems",
                        required
                    ),
                ));
            }
            if existing.state == FILESYSTEM_STATE_RESIZING {
                return Err(self.wait_for(
                    system,
                    FilesystemResize,
                    format!("filesystem resize operation already in progress on {:?}", existing.name),
                ));
            }

            updates.push(FileSystemOpts {
                name: fs.name.clone(),
                size: fs.size,
            });
        }

        if updates.is_empty() {
            return Ok(());
        }

        info!("Updating controller filesystem sizes: {:?}", updates);
        client.update_controller_filesystems(&record.id, &updates).await?;
        events::normal(self.store(), system, REASON_UPDATED, "filesystem sizes have been updated").await;
        Ok(())
    }
}
