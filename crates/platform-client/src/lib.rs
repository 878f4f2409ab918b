//! Platform inventory REST API client
//!
//! A Rust client library for the platform's inventory API. Provides typed
//! models for hosts, storage, networking and system resources, and an async
//! client authenticated with a keystone token.
//!
//! # Example
//!
//! ```no_run
//! use platform_client::{Credentials, HostAction, PlatformClient, PlatformClientTrait};
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut secret = BTreeMap::new();
//! secret.insert("OS_AUTH_URL".to_string(), "http://192.168.204.1:5000/v3".to_string());
//! secret.insert("OS_USERNAME".to_string(), "admin".to_string());
//! secret.insert("OS_PASSWORD".to_string(), "password".to_string());
//!
//! let client = PlatformClient::connect(&Credentials::from_map(&secret)?, &[]).await?;
//!
//! for host in client.list_hosts().await? {
//!     if host.is_locked_online() {
//!         client.host_action(&host.id, HostAction::Unlock).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **System**: system record, DNS, NTP, PTP, DRBD, certificates, licence,
//!   service parameters, storage backends, controller filesystems
//! - **Hosts**: host records, administrative actions, labels
//! - **Storage**: disks, partitions, LVM, OSDs, monitors, host filesystems
//! - **Networking**: interfaces, addresses, routes, address pools,
//!   platform and data networks, PTP instances and interfaces
//! - **Testing**: in-memory `MockPlatformClient` behind `test-util`

pub mod auth;
pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod platform_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use auth::Credentials;
pub use client::PlatformClient;
pub use common::HttpClient;
pub use error::PlatformError;
pub use models::*;
pub use platform_trait::PlatformClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockPlatformClient;
