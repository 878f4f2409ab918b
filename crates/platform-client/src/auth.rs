//! Endpoint credentials and token exchange
//!
//! The endpoint secret carries keystone-style `OS_*` variables. They are
//! exchanged for a token and the inventory endpoint is looked up in the
//! returned service catalog.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::PlatformError;

/// Keystone URL
pub const AUTH_URL_KEY: &str = "OS_AUTH_URL";
/// User name
pub const USERNAME_KEY: &str = "OS_USERNAME";
/// User password
pub const PASSWORD_KEY: &str = "OS_PASSWORD";
/// Project name
pub const PROJECT_NAME_KEY: &str = "OS_PROJECT_NAME";
/// Project domain
pub const PROJECT_DOMAIN_NAME_KEY: &str = "OS_PROJECT_DOMAIN_NAME";
/// User domain
pub const USER_DOMAIN_NAME_KEY: &str = "OS_USER_DOMAIN_NAME";
/// Region of the inventory endpoint
pub const REGION_NAME_KEY: &str = "OS_REGION_NAME";
/// Region of the keystone endpoint
pub const KEYSTONE_REGION_NAME_KEY: &str = "OS_KEYSTONE_REGION_NAME";
/// Endpoint interface (public, internal, admin)
pub const INTERFACE_KEY: &str = "OS_INTERFACE";
/// Explicit inventory endpoint, bypassing the catalog
pub const ENDPOINT_KEY: &str = "OS_ENDPOINT";

const PLATFORM_SERVICE_TYPE: &str = "platform";
const API_VERSION_SUFFIX: &str = "/v1";

/// Credentials decoded from the endpoint secret.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Keystone URL
    pub auth_url: String,
    /// User name
    pub username: String,
    /// User password
    pub password: String,
    /// Project name
    pub project_name: String,
    /// Project domain name
    pub project_domain_name: String,
    /// User domain name
    pub user_domain_name: String,
    /// Region of the inventory endpoint
    pub region_name: String,
    /// Region of the keystone endpoint
    pub keystone_region_name: Option<String>,
    /// Endpoint interface
    pub interface: String,
    /// Explicit inventory endpoint
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("project_name", &self.project_name)
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Decode credentials from secret data.
    ///
    /// # Errors
    /// Returns `InvalidRequest` when a mandatory variable is missing.
    pub fn from_map(data: &BTreeMap<String, String>) -> Result<Self, PlatformError> {
        let required = |key: &str| -> Result<String, PlatformError> {
            data.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| PlatformError::InvalidRequest(format!("{} must be provided", key)))
        };
        let optional = |key: &str| data.get(key).filter(|v| !v.is_empty()).cloned();

        let project_domain_name = optional(PROJECT_DOMAIN_NAME_KEY).unwrap_or_else(|| "Default".to_string());
        Ok(Self {
            auth_url: required(AUTH_URL_KEY)?,
            username: required(USERNAME_KEY)?,
            password: required(PASSWORD_KEY)?,
            project_name: optional(PROJECT_NAME_KEY).unwrap_or_else(|| "admin".to_string()),
            user_domain_name: optional(USER_DOMAIN_NAME_KEY).unwrap_or_else(|| project_domain_name.clone()),
            project_domain_name,
            region_name: optional(REGION_NAME_KEY).unwrap_or_else(|| "RegionOne".to_string()),
            keystone_region_name: optional(KEYSTONE_REGION_NAME_KEY),
            interface: optional(INTERFACE_KEY).unwrap_or_else(|| "internal".to_string()),
            endpoint: optional(ENDPOINT_KEY),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/auth/tokens", self.auth_url.trim_end_matches('/'))
    }

    fn token_request(&self) -> serde_json::Value {
        serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": {"name": self.user_domain_name},
                            "password": self.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": {"name": self.project_domain_name},
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    #[serde(default)]
    region: String,
    url: String,
}

/// Authenticated session: token plus resolved inventory endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    /// Token sent as `X-Auth-Token`
    pub token: String,
    /// Inventory API base URL (including the version suffix)
    pub endpoint: String,
}

fn versioned(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.ends_with(API_VERSION_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url, API_VERSION_SUFFIX)
    }
}

fn find_endpoint(catalog: &[CatalogEntry], creds: &Credentials) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == PLATFORM_SERVICE_TYPE)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| ep.interface == creds.interface && (ep.region.is_empty() || ep.region == creds.region_name))
        .map(|ep| versioned(&ep.url))
}

/// Exchange credentials for a token and resolve the inventory endpoint.
///
/// # Errors
/// Returns `Authentication` when keystone rejects the credentials or the
/// catalog has no inventory endpoint, and `Http` on transport failures.
pub async fn authenticate(client: &Client, creds: &Credentials) -> Result<Session, PlatformError> {
    let url = creds.token_url();
    debug!("POST {} (user {})", url, creds.username);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&creds.token_request())
        .send()
        .await
        .map_err(PlatformError::Http)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Authentication(format!(
            "token request failed: {} - {}",
            status, body
        )));
    }

    let token = response
        .headers()
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| PlatformError::Authentication("token response without X-Subject-Token".to_string()))?;

    let body: TokenResponse = response.json().await.map_err(PlatformError::Http)?;

    let endpoint = match &creds.endpoint {
        Some(endpoint) => versioned(endpoint),
        None => find_endpoint(&body.token.catalog, creds).ok_or_else(|| {
            PlatformError::Authentication(format!(
                "no {} endpoint for interface {} in region {}",
                PLATFORM_SERVICE_TYPE, creds.interface, creds.region_name
            ))
        })?,
    };

    Ok(Session { token, endpoint })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> BTreeMap<String, String> {
        [
            (AUTH_URL_KEY, "http://192.168.204.1:5000/v3"),
            (USERNAME_KEY, "admin"),
            (PASSWORD_KEY, "secret"),
            (REGION_NAME_KEY, "RegionOne"),
            (INTERFACE_KEY, "public"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_credentials_defaults() {
        let creds = Credentials::from_map(&secret()).unwrap_or_default();
        assert_eq!(creds.project_name, "admin");
        assert_eq!(creds.project_domain_name, "Default");
        assert_eq!(creds.user_domain_name, "Default");
        assert_eq!(creds.interface, "public");
        assert_eq!(creds.token_url(), "http://192.168.204.1:5000/v3/auth/tokens");
    }

    #[test]
    fn test_credentials_missing_password() {
        let mut data = secret();
        data.remove(PASSWORD_KEY);
        let err = Credentials::from_map(&data).err();
        assert!(matches!(err, Some(PlatformError::InvalidRequest(msg)) if msg.contains("OS_PASSWORD")));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::from_map(&secret()).unwrap_or_default();
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_find_endpoint_matches_interface_and_region() {
        let catalog = vec![CatalogEntry {
            service_type: "platform".to_string(),
            endpoints: vec![
                CatalogEndpoint {
                    interface: "internal".to_string(),
                    region: "RegionOne".to_string(),
                    url: "http://192.168.204.1:6385/v1".to_string(),
                },
                CatalogEndpoint {
                    interface: "public".to_string(),
                    region: "RegionOne".to_string(),
                    url: "https://10.10.10.2:6386".to_string(),
                },
            ],
        }];
        let creds = Credentials::from_map(&secret()).unwrap_or_default();
        assert_eq!(
            find_endpoint(&catalog, &creds).as_deref(),
            Some("https://10.10.10.2:6386/v1")
        );
    }
}
