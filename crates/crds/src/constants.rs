//! API group, finalizer and annotation names shared by the controllers.

/// API group of every deployment manager resource
pub const GROUP: &str = "starlingx.windriver.com";
/// API version of every deployment manager resource
pub const VERSION: &str = "v1";
/// `apiVersion` string used in object references
pub const API_VERSION: &str = "starlingx.windriver.com/v1";

/// Finalizer placed on Host objects
pub const HOST_FINALIZER: &str = "host.finalizers.windriver.com";
/// Finalizer placed on PlatformNetwork objects
pub const PLATFORM_NETWORK_FINALIZER: &str = "platformnetwork.finalizers.windriver.com";
/// Finalizer placed on DataNetwork objects
pub const DATA_NETWORK_FINALIZER: &str = "datanetwork.finalizers.windriver.com";
/// Finalizer placed on PtpInstance objects
pub const PTP_INSTANCE_FINALIZER: &str = "ptpinstance.finalizers.windriver.com";
/// Finalizer placed on PtpInterface objects
pub const PTP_INTERFACE_FINALIZER: &str = "ptpinterface.finalizers.windriver.com";
/// Finalizer placed on System objects
pub const SYSTEM_FINALIZER: &str = "system.finalizers.windriver.com";

/// Monotonic counter bumped to force a reconcile
pub const NOTIFICATIONS_ANNOTATION: &str = "deployment-manager/notifications";
/// Presence re-permits spec changes after the first in-sync
pub const RECONCILE_AFTER_INSYNC_ANNOTATION: &str = "deployment-manager/reconcile-after-insync";
/// Prefix of the per-profile resource version annotation placed on Hosts
pub const PROFILE_ANNOTATION_PREFIX: &str = "profile/";

/// Secret holding the platform endpoint credentials
pub const SYSTEM_ENDPOINT_SECRET: &str = "system-endpoint";
