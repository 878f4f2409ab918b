//! Host CRD
//!
//! Binds a platform host record to a profile plus optional per-host overrides.

use crate::host_profile::HostProfileSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
/// Board management attributes used for matching.
pub struct MatchBmInfo {
    /// Board management controller address
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
/// DMI attributes used for matching.
pub struct MatchDmiInfo {
    /// System serial number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// System asset tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
}

/// Criteria used to bind a Host to a platform host record at discovery.
///
/// Every specified attribute must compare equal (case-insensitive) and at
/// least one attribute must be specified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Boot interface MAC address
    #[serde(rename = "bootMAC", skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,

    /// Board management controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_management: Option<MatchBmInfo>,

    /// DMI identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dmi: Option<MatchDmiInfo>,
}

impl MatchInfo {
    /// True when no matching attribute is specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let dmi_empty = self
            .dmi
            .as_ref()
            .is_none_or(|dmi| dmi.serial_number.is_none() && dmi.asset_tag.is_none());
        self.boot_mac.is_none() && self.board_management.is_none() && dmi_empty
    }
}

/// Desired state of a single host.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "Host",
    namespaced,
    status = "HostStatus",
    printcolumn = r#"{"name":"Admin","type":"string","jsonPath":".status.administrativeState"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Name of the HostProfile this host consumes
    pub profile: String,

    /// Discovery match criteria
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchInfo>,

    /// Per-host profile overrides layered on top of the profile chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<HostProfileSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed state of a host.
pub struct HostStatus {
    /// Platform-assigned host UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Last observed administrative state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_state: Option<String>,

    /// Last observed operational status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operational_status: Option<String>,

    /// Last observed availability status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_status: Option<String>,

    /// Whether the platform matched the composed profile on the last pass
    #[serde(default)]
    pub in_sync: bool,

    /// Whether the host has ever been in sync
    #[serde(default)]
    pub reconciled: bool,

    /// JSON snapshot of the configuration captured on first sight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<String>,
}

impl Host {
    /// Parsed defaults snapshot, when one has been captured.
    ///
    /// # Errors
    ///
    /// Returns an error when the stored snapshot is not a valid profile.
    pub fn defaults(&self) -> Result<Option<HostProfileSpec>, crate::CrdError> {
        match self.status.as_ref().and_then(|s| s.defaults.as_deref()) {
            Some(raw) if !raw.is_empty() => Ok(Some(serde_json::from_str(raw)?)),
            _ => Ok(None),
        }
    }
}
