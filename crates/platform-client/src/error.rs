//! Platform client errors

use thiserror::Error;

/// Errors that can occur when interacting with the inventory API
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP transport error (connection refused, timeout, TLS failure)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Inventory API returned an error status
    #[error("Platform API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or description
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (bad credentials, expired token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource is in use and cannot be deleted (HTTP 400 on DELETE)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PlatformError {
    /// HTTP status associated with the error, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(400),
            Self::Authentication(_) => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Serialization(_) | Self::InvalidRequest(_) => None,
        }
    }

    /// True for transport-level failures where the endpoint was unreachable.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }

    /// True when the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True when the resource is in use.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlatformError::NotFound("x".into()).status(), Some(404));
        assert_eq!(PlatformError::Conflict("x".into()).status(), Some(400));
        assert_eq!(
            PlatformError::Api { status: 503, message: "down".into() }.status(),
            Some(503)
        );
        assert_eq!(PlatformError::InvalidRequest("x".into()).status(), None);
        assert!(PlatformError::NotFound("x".into()).is_not_found());
        assert!(!PlatformError::NotFound("x".into()).is_network());
    }
}
