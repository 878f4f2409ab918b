//! DataNetwork CRD

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Flat data network
pub const DATANETWORK_FLAT: &str = "flat";
/// VLAN data network
pub const DATANETWORK_VLAN: &str = "vlan";
/// VXLAN data network
pub const DATANETWORK_VXLAN: &str = "vxlan";

/// VXLAN specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VxlanInfo {
    /// Multicast group (dynamic endpoint mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<String>,

    /// UDP destination port
    #[serde(rename = "udpPortNumber", skip_serializing_if = "Option::is_none")]
    pub udp_port: Option<i32>,

    /// Time-to-live of encapsulated packets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i32>,

    /// Endpoint mode (static, dynamic)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_mode: Option<String>,
}

/// Desired data network.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "DataNetwork",
    namespaced,
    status = "DataNetworkStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DataNetworkSpec {
    /// Network type (flat, vlan, vxlan)
    #[serde(rename = "type")]
    pub network_type: String,

    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MTU
    #[serde(rename = "mtu", skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,

    /// VXLAN attributes (vxlan only)
    #[serde(rename = "vxlan", skip_serializing_if = "Option::is_none")]
    pub vxlan: Option<VxlanInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Observed data network state.
pub struct DataNetworkStatus {
    /// Platform data network UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether the platform has ever matched the declared state
    #[serde(default)]
    pub reconciled: bool,

    /// Whether the platform matched the declared state on the last pass
    #[serde(default)]
    pub in_sync: bool,
}
