//! PtpInstance and PtpInterface CRDs

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired PTP service instance.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PtpInstance",
    namespaced,
    status = "PtpInstanceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct PtpInstanceSpec {
    /// Service type (ptp4l, phc2sys, ts2phc, clock)
    pub service: String,

    /// Instance parameters as `key=value` strings
    #[serde(rename = "parameters", default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed PTP instance state.
pub struct PtpInstanceStatus {
    /// Platform PTP instance UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether the platform has ever matched the declared state
    #[serde(default)]
    pub reconciled: bool,

    /// Whether the platform matched the declared state on the last pass
    #[serde(default)]
    pub in_sync: bool,
}

/// Desired PTP interface bound to an instance.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PtpInterface",
    namespaced,
    status = "PtpInterfaceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct PtpInterfaceSpec {
    /// Name of the parent PTP instance
    #[serde(rename = "ptpinstance")]
    pub ptp_instance: String,

    /// Interface parameters as `key=value` strings
    #[serde(rename = "parameters", default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed PTP interface state.
pub struct PtpInterfaceStatus {
    /// Platform PTP interface UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether the platform has ever matched the declared state
    #[serde(default)]
    pub reconciled: bool,

    /// Whether the platform matched the declared state on the last pass
    #[serde(default)]
    pub in_sync: bool,
}
