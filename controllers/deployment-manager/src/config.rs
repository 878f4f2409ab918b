//! Reconciler feature toggles.
//!
//! Loaded from a YAML document keyed by reconciler name:
//!
//! ```yaml
//! reconcilers:
//!   host:
//!     enabled: true
//!     stopAfterInSync: true
//!   system.certificate:
//!     httpsRequired: true
//! ```
//!
//! Every reconciler defaults to enabled. A missing file means defaults
//! everywhere.

use crate::error::ControllerError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Names of the reconcilers and sub-reconcilers that can be toggled.
pub mod names {
    pub const DATA_NETWORK: &str = "dataNetwork";
    pub const HOST: &str = "host";
    pub const HOST_BMC: &str = "host.bmc";
    pub const HOST_MEMORY: &str = "host.memory";
    pub const HOST_PROCESSOR: &str = "host.processor";
    pub const HOST_STORAGE: &str = "host.storage";
    pub const HOST_MONITOR: &str = "host.storage.monitor";
    pub const HOST_OSD: &str = "host.storage.osd";
    pub const HOST_PARTITION: &str = "host.storage.partition";
    pub const HOST_PHYSICAL_VOLUME: &str = "host.storage.physicalVolume";
    pub const HOST_VOLUME_GROUP: &str = "host.storage.volumeGroup";
    pub const HOST_FILESYSTEMS: &str = "host.storage.filesystems";
    pub const HOST_NETWORKING: &str = "host.networking";
    pub const HOST_ADDRESS: &str = "host.networking.address";
    pub const HOST_INTERFACE: &str = "host.networking.interface";
    pub const HOST_ROUTE: &str = "host.networking.route";
    pub const HOST_PROFILE: &str = "hostProfile";
    pub const PLATFORM_NETWORK: &str = "platformNetwork";
    pub const PTP_INSTANCE: &str = "ptpInstance";
    pub const PTP_INTERFACE: &str = "ptpInterface";
    pub const SYSTEM: &str = "system";
    pub const SYSTEM_CERTIFICATE: &str = "system.certificate";
    pub const SYSTEM_DNS: &str = "system.dns";
    pub const SYSTEM_DRBD: &str = "system.drbd";
    pub const SYSTEM_FILESYSTEMS: &str = "system.filesystems";
    pub const SYSTEM_LICENSE: &str = "system.license";
    pub const SYSTEM_NTP: &str = "system.ntp";
    pub const SYSTEM_PTP: &str = "system.ptp";
    pub const SYSTEM_SERVICE_PARAMETERS: &str = "system.serviceParameters";
    pub const SYSTEM_STORAGE_BACKEND: &str = "system.storage.backend";
}

/// Options for a single reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerOptions {
    /// Whether the reconciler runs at all
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Refuse to send secrets over a cleartext endpoint
    #[serde(default)]
    pub https_required: Option<bool>,

    /// Ignore spec diffs once the object has been in sync
    #[serde(default)]
    pub stop_after_in_sync: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    reconcilers: BTreeMap<String, ReconcilerOptions>,
}

/// Feature toggles for every reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerConfig {
    reconcilers: BTreeMap<String, ReconcilerOptions>,
}

impl ReconcilerConfig {
    /// Parse the YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] when the document is
    /// malformed.
    pub fn from_yaml(raw: &str) -> Result<Self, ControllerError> {
        let file: ConfigFile = serde_yaml::from_str(raw)
            .map_err(|e| ControllerError::InvalidConfig(format!("reconciler config: {}", e)))?;
        Ok(Self {
            reconcilers: file.reconcilers,
        })
    }

    /// Load the configuration file, falling back to defaults when it does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] when the file exists but
    /// cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ControllerError> {
        if !path.exists() {
            warn!("Reconciler config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&raw)?;
        info!("Loaded reconciler config from {}", path.display());
        Ok(config)
    }

    fn options(&self, name: &str) -> Option<&ReconcilerOptions> {
        self.reconcilers.get(name)
    }

    /// True unless the reconciler, or any of its parents, is disabled.
    ///
    /// `host.storage.osd` is disabled by disabling `host.storage` or `host`.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        let mut current = name;
        loop {
            if self.options(current).and_then(|o| o.enabled) == Some(false) {
                return false;
            }
            match current.rfind('.') {
                Some(idx) => current = &current[..idx],
                None => return true,
            }
        }
    }

    /// HTTPS requirement for reconcilers that transmit secrets.
    #[must_use]
    pub fn https_required(&self, name: &str) -> bool {
        self.options(name).and_then(|o| o.https_required).unwrap_or(true)
    }

    /// Whether spec diffs are ignored once the object has been in sync.
    #[must_use]
    pub fn stop_after_in_sync(&self, name: &str) -> bool {
        self.options(name).and_then(|o| o.stop_after_in_sync).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let config = ReconcilerConfig::default();
        assert!(config.is_enabled(names::HOST));
        assert!(config.is_enabled(names::HOST_OSD));
        assert!(config.https_required(names::SYSTEM_CERTIFICATE));
        assert!(config.https_required(names::HOST_BMC));
        assert!(config.stop_after_in_sync(names::HOST));
    }

    #[test]
    fn test_overrides() {
        let config = ReconcilerConfig::from_yaml(
            r#"
reconcilers:
  host:
    stopAfterInSync: false
  host.memory:
    enabled: false
  system.certificate:
    httpsRequired: false
"#,
        )
        .expect("valid config");

        assert!(config.is_enabled(names::HOST));
        assert!(!config.is_enabled(names::HOST_MEMORY));
        assert!(config.is_enabled(names::HOST_PROCESSOR));
        assert!(!config.https_required(names::SYSTEM_CERTIFICATE));
        assert!(config.https_required(names::HOST_BMC));
        assert!(!config.stop_after_in_sync(names::HOST));
    }

    #[test]
    fn test_disabled_parent_disables_children() {
        let config = ReconcilerConfig::from_yaml("reconcilers:\n  host.storage:\n    enabled: false\n")
            .expect("valid config");
        assert!(!config.is_enabled(names::HOST_OSD));
        assert!(!config.is_enabled(names::HOST_PHYSICAL_VOLUME));
        assert!(config.is_enabled(names::HOST_NETWORKING));
    }

    #[test]
    fn test_malformed_config_rejected() {
        assert!(matches!(
            ReconcilerConfig::from_yaml("reconcilers: [1, 2"),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ReconcilerConfig::load(Path::new("/nonexistent/manager/config.yaml"))
            .expect("defaults");
        assert_eq!(config, ReconcilerConfig::default());
    }
}
