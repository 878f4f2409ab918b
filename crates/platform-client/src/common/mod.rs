//! Common utilities for the inventory API client
//!
//! Provides the authenticated HTTP wrapper shared by every resource
//! operation, plus the JSON-patch encoding the inventory API expects on
//! update requests.

use crate::error::PlatformError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// HTTP client wrapper with token authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path relative to the base URL
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn check(
        method: &str,
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => Err(PlatformError::NotFound(format!(
                "Resource not found: {} - {}",
                path, body
            ))),
            401 => Err(PlatformError::Authentication(format!(
                "{} {} rejected token: {}",
                method, path, body
            ))),
            400 if method == "DELETE" => Err(PlatformError::Conflict(format!(
                "DELETE {} refused: {}",
                path, body
            ))),
            code => Err(PlatformError::Api {
                status: code,
                message: format!("{} {} failed: {} - {}", method, path, status, body),
            }),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(PlatformError::Serialization)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PlatformError::Http)?;

        let response = Self::check("GET", path, response).await?;
        Self::decode(response).await
    }

    /// GET a collection and unwrap it from its `{key: [...]}` envelope
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
    ) -> Result<Vec<T>, PlatformError> {
        let mut envelope: serde_json::Value = self.get(path).await?;
        match envelope.get_mut(key).map(serde_json::Value::take) {
            Some(items) => serde_json::from_value(items).map_err(PlatformError::Serialization),
            None => Ok(Vec::new()),
        }
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, PlatformError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        let response = Self::check("POST", path, response).await?;
        Self::decode(response).await
    }

    /// POST a request whose response body is irrelevant
    pub async fn post_no_content(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), PlatformError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        Self::check("POST", path, response).await.map(|_| ())
    }

    /// POST a multipart file upload
    pub async fn post_file(
        &self,
        path: &str,
        filename: &str,
        contents: Vec<u8>,
        fields: &[(&str, &str)],
    ) -> Result<serde_json::Value, PlatformError> {
        let url = self.build_url(path);
        debug!("POST {} (upload {}, {} bytes)", url, filename, contents.len());

        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(contents).file_name(filename.to_string()),
        );
        for (name, value) in fields {
            form = form.text((*name).to_string(), (*value).to_string());
        }

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.token)
            .multipart(form)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        let response = Self::check("POST", path, response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        let value: serde_json::Value = serde_json::from_str(&text)?;
        if let Some(error) = value.get("error").and_then(serde_json::Value::as_str)
            && !error.is_empty()
        {
            return Err(PlatformError::Api {
                status: 400,
                message: format!("POST {} failed: {}", path, error),
            });
        }
        Ok(value)
    }

    /// Make a PATCH request carrying a JSON-patch document
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, PlatformError> {
        let url = self.build_url(path);
        debug!("PATCH {} with body: {}", url, body);

        let response = self
            .client
            .patch(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        let response = Self::check("PATCH", path, response).await?;
        Self::decode(response).await
    }

    /// Make a PUT request whose response body is irrelevant
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<(), PlatformError> {
        let url = self.build_url(path);
        debug!("PUT {} with body: {}", url, body);

        let response = self
            .client
            .put(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        Self::check("PUT", path, response).await.map(|_| ())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PlatformError::Http)?;

        Self::check("DELETE", path, response).await.map(|_| ())
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Encode the set fields of an options struct as a JSON-patch document.
///
/// Each top level field becomes a `replace` operation on `/<field>`. Lists
/// are sent comma separated, with "none" standing for the empty list.
pub fn to_patch<T: Serialize>(opts: &T) -> Result<serde_json::Value, PlatformError> {
    let value = serde_json::to_value(opts)?;
    let ops = match value {
        serde_json::Value::Object(fields) => fields
            .into_iter()
            .map(|(field, value)| {
                let value = match value {
                    serde_json::Value::Array(items) if items.is_empty() => {
                        serde_json::Value::String("none".to_string())
                    }
                    serde_json::Value::Array(items) => serde_json::Value::String(
                        items
                            .iter()
                            .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                            .collect::<Vec<_>>()
                            .join(","),
                    ),
                    other => other,
                };
                serde_json::json!({
                    "op": "replace",
                    "path": format!("/{}", field),
                    "value": value,
                })
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(serde_json::Value::Array(ops))
}

/// Stringify a JSON-patch value the way the inventory API expects scalars.
pub fn to_patch_strings<T: Serialize>(opts: &T) -> Result<serde_json::Value, PlatformError> {
    let mut patch = to_patch(opts)?;
    if let serde_json::Value::Array(ops) = &mut patch {
        for op in ops.iter_mut() {
            if let Some(value) = op.get_mut("value") {
                match value {
                    serde_json::Value::Number(n) => *value = serde_json::Value::String(n.to_string()),
                    serde_json::Value::Bool(b) => *value = serde_json::Value::String(b.to_string()),
                    _ => {}
                }
            }
        }
    }
    Ok(patch)
}
