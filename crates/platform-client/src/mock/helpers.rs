//! Table helpers shared by the mock domain modules

use crate::error::PlatformError;
use crate::models::*;

/// Records addressed by their platform UUID
pub(crate) trait Identified {
    fn id(&self) -> &str;
}

macro_rules! identified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identified for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

identified!(
    Certificate,
    ServiceParameter,
    StorageBackend,
    ControllerFilesystem,
    Host,
    Label,
    Disk,
    Partition,
    PhysicalVolume,
    VolumeGroup,
    Osd,
    Cluster,
    StorageTier,
    CephMonitor,
    HostFilesystem,
    Cpu,
    Memory,
    Port,
    Interface,
    InterfaceNetwork,
    InterfaceDataNetwork,
    Address,
    Route,
    AddressPool,
    Network,
    DataNetwork,
    PtpInstance,
    PtpInterface,
);

/// Generate a platform UUID
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn not_found(kind: &str, id: &str) -> PlatformError {
    PlatformError::NotFound(format!("{} {} not found", kind, id))
}

/// Clone one record out of a table
pub(crate) fn get<T: Identified + Clone>(table: &[T], kind: &str, id: &str) -> Result<T, PlatformError> {
    table
        .iter()
        .find(|item| item.id() == id)
        .cloned()
        .ok_or_else(|| not_found(kind, id))
}

/// Borrow one record of a table mutably
pub(crate) fn get_mut<'a, T: Identified>(
    table: &'a mut [T],
    kind: &str,
    id: &str,
) -> Result<&'a mut T, PlatformError> {
    table
        .iter_mut()
        .find(|item| item.id() == id)
        .ok_or_else(|| not_found(kind, id))
}

/// Remove one record from a table
pub(crate) fn remove<T: Identified>(table: &mut Vec<T>, kind: &str, id: &str) -> Result<T, PlatformError> {
    let index = table
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| not_found(kind, id))?;
    Ok(table.remove(index))
}

/// Overwrite `target` when `value` is set
pub(crate) fn set<T: Clone>(target: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Overwrite an optional `target` when `value` is set
pub(crate) fn set_opt<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}
