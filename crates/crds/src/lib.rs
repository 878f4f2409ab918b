//! Deployment Manager CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the deployment manager, the
//! sparse host profile model and the typed merge engine used to layer
//! profiles.

pub mod constants;
pub mod data_network;
pub mod error;
pub mod host;
pub mod host_profile;
pub mod merge;
pub mod platform_network;
pub mod ptp;
pub mod system;

pub use constants::*;
pub use data_network::*;
pub use error::CrdError;
pub use host::*;
pub use host_profile::*;
pub use platform_network::*;
pub use ptp::*;
pub use system::*;
