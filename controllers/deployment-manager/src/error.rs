//! Controller-specific error types.
//!
//! Every reconcile failure is one of a closed set of kinds. The retry policy
//! applied by the watchers is a pure function of the kind, see
//! [`ControllerError::retry_policy`].

use crds::CrdError;
use kube::Error as KubeError;
use platform_client::PlatformError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the deployment manager.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Platform client not yet built for the namespace
    #[error("platform client not available for namespace {0}")]
    MissingClient(String),

    /// The System reconciler has not completed its first pass
    #[error("system not ready in namespace {0}")]
    SystemNotReady(String),

    /// A referenced secret or object does not exist yet
    #[error("missing kubernetes resource: {0}")]
    MissingKubernetesResource(String),

    /// An expected platform object does not exist
    #[error("missing system resource: {0}")]
    MissingSystemResource(String),

    /// A precondition is still progressing
    #[error("waiting for resource status: {0}")]
    ResourceStatusDependency(String),

    /// The declared configuration precludes progress
    #[error("resource configuration dependency: {0}")]
    ResourceConfigurationDependency(String),

    /// Invalid user supplied data
    #[error("invalid user data: {0}")]
    UserData(String),

    /// The composed spec was rejected
    #[error("validation failed: {0}")]
    Validation(String),

    /// A sensitive operation was refused over a cleartext endpoint
    #[error("HTTPS client required: {0}")]
    HttpsClientRequired(String),

    /// Spec edited after the first in-sync without the override annotation
    #[error("changes are not allowed after the resource has been reconciled: {0}")]
    ChangeAfterReconciled(String),

    /// The operation is unsafe for the current system mode
    #[error("system dependency: {0}")]
    SystemDependency(String),

    /// A monitor was registered and will re-enqueue the object
    #[error("waiting for monitor: {0}")]
    WaitForMonitor(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Platform API error
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CrdError> for ControllerError {
    fn from(e: CrdError) -> Self {
        match e {
            CrdError::Serialization(e) => Self::Serialization(e),
        }
    }
}

/// How a failed reconcile is requeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Optimistic update conflict
    Immediate,
    /// Namespace client not built yet
    MissingClient,
    /// System reconciler has not finished
    SystemNotReady,
    /// Precondition still progressing
    Transient,
    /// Platform endpoint unreachable
    Network,
    /// User data, server errors and dependencies the operator must fix
    Long,
    /// Name resolution failure
    Dns,
    /// Wait for a spec change or a monitor
    AwaitChange,
    /// Unclassified; spaced with the per-object Fibonacci backoff
    Backoff,
}

impl RetryPolicy {
    /// Requeue interval, `None` when the object waits for an external change.
    #[must_use]
    pub fn interval(self) -> Option<Duration> {
        let secs = match self {
            Self::Immediate => 1,
            Self::MissingClient => 10,
            Self::SystemNotReady => 30,
            Self::Transient => 20,
            Self::Network => 15,
            Self::Long => 60,
            Self::Dns => 300,
            Self::AwaitChange | Self::Backoff => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

impl ControllerError {
    /// Retry policy for this error.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::MissingClient(_) | Self::HttpsClientRequired(_) => RetryPolicy::MissingClient,
            Self::SystemNotReady(_) => RetryPolicy::SystemNotReady,
            Self::MissingKubernetesResource(_) | Self::ResourceStatusDependency(_) => {
                RetryPolicy::Transient
            }
            Self::MissingSystemResource(_)
            | Self::ResourceConfigurationDependency(_)
            | Self::UserData(_)
            | Self::SystemDependency(_) => RetryPolicy::Long,
            Self::Validation(_) | Self::ChangeAfterReconciled(_) | Self::WaitForMonitor(_) => {
                RetryPolicy::AwaitChange
            }
            Self::Kube(KubeError::Api(status)) if status.code == 409 => RetryPolicy::Immediate,
            Self::Platform(e) => platform_retry_policy(e),
            Self::Kube(_)
            | Self::InvalidConfig(_)
            | Self::Watch(_)
            | Self::Serialization(_)
            | Self::Io(_) => {
                RetryPolicy::Backoff
            }
        }
    }

    /// True when the platform endpoint could not be reached and the
    /// namespace client should be rebuilt.
    #[must_use]
    pub fn requires_client_reset(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_network(),
            Self::HttpsClientRequired(_) => true,
            _ => false,
        }
    }

    /// True for platform "not found" responses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_not_found(),
            Self::Kube(KubeError::Api(status)) => status.code == 404,
            _ => false,
        }
    }

    /// Event reason used when surfacing this error on the owning object.
    #[must_use]
    pub fn event_reason(&self) -> &'static str {
        match self {
            Self::WaitForMonitor(_) | Self::ResourceStatusDependency(_) => crate::events::REASON_WAIT,
            Self::MissingClient(_)
            | Self::SystemNotReady(_)
            | Self::MissingKubernetesResource(_)
            | Self::MissingSystemResource(_)
            | Self::ResourceConfigurationDependency(_)
            | Self::SystemDependency(_) => crate::events::REASON_DEPENDENCY,
            _ => crate::events::REASON_FAILED,
        }
    }
}

fn platform_retry_policy(e: &PlatformError) -> RetryPolicy {
    if e.is_network() {
        if is_dns_failure(e) {
            return RetryPolicy::Dns;
        }
        return RetryPolicy::Network;
    }

    match e.status() {
        Some(400 | 403 | 404 | 405 | 500 | 503) => RetryPolicy::Long,
        _ => RetryPolicy::Backoff,
    }
}

fn is_dns_failure(e: &PlatformError) -> bool {
    let mut source: Option<&dyn std::error::Error> = Some(e);
    while let Some(err) = source {
        if err.to_string().contains("dns error") {
            return true;
        }
        source = err.source();
    }
    false
}

/// Convenience alias used across the reconcilers.
pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
