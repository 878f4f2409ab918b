//! PlatformNetwork CRD
//!
//! Declares a platform network and its backing address pool.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Network type provisioned as an address pool only
pub const NETWORK_TYPE_OTHER: &str = "other";
/// Static address allocation
pub const ALLOCATION_STATIC: &str = "static";
/// Dynamic address allocation
pub const ALLOCATION_DYNAMIC: &str = "dynamic";

/// Inclusive address range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AllocationRange {
    /// First address
    pub start: String,
    /// Last address
    pub end: String,
}

/// Address allocation policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationInfo {
    /// Allocation type (static, dynamic)
    #[serde(rename = "type")]
    pub allocation_type: String,

    /// Allocation order (random, sequential)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// Explicit ranges; the whole subnet when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AllocationRange>,
}

/// Desired platform network.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PlatformNetwork",
    namespaced,
    status = "PlatformNetworkStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNetworkSpec {
    /// Network type (mgmt, cluster-host, oam, pxeboot, other, ...)
    #[serde(rename = "type")]
    pub network_type: String,

    /// Network address
    pub subnet: String,

    /// Prefix length
    pub prefix: i32,

    /// Default gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Address allocation policy
    pub allocation: AllocationInfo,
}

impl PlatformNetworkSpec {
    /// True when the network type provisions a network on top of its pool.
    #[must_use]
    pub fn has_network(&self) -> bool {
        self.network_type != NETWORK_TYPE_OTHER
    }

    /// True for dynamic allocation.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.allocation.allocation_type == ALLOCATION_DYNAMIC
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed platform network state.
pub struct PlatformNetworkStatus {
    /// Platform network UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Address pool UUID
    #[serde(rename = "poolUUID", skip_serializing_if = "Option::is_none")]
    pub pool_uuid: Option<String>,

    /// Whether the platform has ever matched the declared state
    #[serde(default)]
    pub reconciled: bool,

    /// Whether the platform matched the declared state on the last pass
    #[serde(default)]
    pub in_sync: bool,
}
