//! Memory and hugepage allocation

use super::defaults::{page_size_mib, LiveHost, PAGES_4K_PER_MIB, PAGE_SIZE_1G, PAGE_SIZE_2M, PAGE_SIZE_4K};
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_UPDATED};
use crate::reconciler::Reconciler;
use crds::{Host, HostProfileSpec, MemoryFunctionInfo, MemoryNodeInfo};
use platform_client::{
    Memory, MemoryOpts, PlatformClientTrait, MEMORY_FUNCTION_PLATFORM, MEMORY_FUNCTION_VM, MEMORY_FUNCTION_VSWITCH,
};
use tracing::info;

fn unsupported(function: &MemoryFunctionInfo) -> ControllerError {
    ControllerError::UserData(format!(
        "unsupported {} memory page size {:?}",
        function.function, function.page_size
    ))
}

/// Changes needed on one NUMA node, or `None` when it already matches.
pub(crate) fn memory_update(desired: &MemoryNodeInfo, current: &Memory) -> Result<Option<MemoryOpts>> {
    let mut opts = MemoryOpts::default();

    for function in &desired.functions {
        match function.function.as_str() {
            MEMORY_FUNCTION_PLATFORM => {
                if function.page_size != PAGE_SIZE_4K {
                    return Err(unsupported(function));
                }
                let mib = function.page_count / PAGES_4K_PER_MIB;
                if current.platform != mib {
                    opts.platform = Some(mib);
                }
            }
            MEMORY_FUNCTION_VM => match function.page_size.as_str() {
                PAGE_SIZE_2M => {
                    if current.vm_2m_pending.unwrap_or(current.vm_2m_count) != function.page_count {
                        opts.vm_2m = Some(function.page_count);
                    }
                }
                PAGE_SIZE_1G => {
                    if current.vm_1g_pending.unwrap_or(current.vm_1g_count) != function.page_count {
                        opts.vm_1g = Some(function.page_count);
                    }
                }
                _ => return Err(unsupported(function)),
            },
            MEMORY_FUNCTION_VSWITCH => {
                let size = page_size_mib(&function.page_size).ok_or_else(|| unsupported(function))?;
                let count = current.vswitch_required.unwrap_or(current.vswitch_count);
                if count != function.page_count || current.vswitch_page_size_mib != size {
                    opts.vswitch_pages = Some(function.page_count);
                    opts.vswitch_page_size_mib = Some(size);
                }
            }
            other => {
                return Err(ControllerError::UserData(format!("unknown memory function {:?}", other)));
            }
        }
    }

    Ok((!opts.is_empty()).then_some(opts))
}

impl Reconciler {
    pub(crate) async fn reconcile_memory(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        // The platform only takes memory settings on hosts running workloads
        if !self.config.is_enabled(names::HOST_MEMORY) || !desired.has_worker_subfunction() {
            return Ok(());
        }
        let Some(nodes) = desired.memory.as_ref() else {
            return Ok(());
        };

        let mut updated = false;
        for node in nodes {
            let current = live.memory.iter().find(|m| m.processor == node.node).ok_or_else(|| {
                ControllerError::MissingSystemResource(format!("memory of processor node {} not present", node.node))
            })?;
            let Some(opts) = memory_update(node, current)? else {
                continue;
            };

            info!("Updating memory of host {} node {}: {:?}", live.id(), node.node, opts);
            client.update_memory(&current.id, &opts).await?;
            updated = true;
        }

        if updated {
            live.memory = client.list_memory(live.id()).await?;
            events::normal(self.store(), host, REASON_UPDATED, "memory allocations have been updated").await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(function: &str, page_size: &str, page_count: i32) -> MemoryFunctionInfo {
        MemoryFunctionInfo {
            function: function.to_string(),
            page_size: page_size.to_string(),
            page_count,
        }
    }

    fn current() -> Memory {
        Memory {
            id: "m0".to_string(),
            host_id: "h1".to_string(),
            processor: 0,
            total: 65536,
            platform: 8000,
            vm_2m_count: 100,
            vm_1g_count: 2,
            vm_1g_pending: Some(4),
            vswitch_page_size_mib: 1024,
            vswitch_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_counts_are_compared() {
        let desired = MemoryNodeInfo {
            node: 0,
            functions: vec![
                function("platform", "4KB", 8000 * 256),
                function("vm", "2MB", 100),
                function("vm", "1GB", 4),
                function("vswitch", "1GB", 1),
            ],
        };
        assert_eq!(memory_update(&desired, &current()).unwrap(), None);
    }

    #[test]
    fn test_changes_are_sent_in_platform_units() {
        let desired = MemoryNodeInfo {
            node: 0,
            functions: vec![
                function("platform", "4KB", 10000 * 256),
                function("vm", "1GB", 8),
                function("vswitch", "2MB", 512),
            ],
        };
        let opts = memory_update(&desired, &current()).unwrap().expect("update");
        assert_eq!(opts.platform, Some(10000));
        assert_eq!(opts.vm_1g, Some(8));
        assert_eq!(opts.vm_2m, None);
        assert_eq!(opts.vswitch_pages, Some(512));
        assert_eq!(opts.vswitch_page_size_mib, Some(2));
    }

    #[test]
    fn test_unsupported_page_sizes_are_user_errors() {
        for bad in [function("platform", "2MB", 1), function("vm", "4KB", 1), function("shared", "4KB", 1)] {
            let desired = MemoryNodeInfo {
                node: 0,
                functions: vec![bad],
            };
            assert!(matches!(memory_update(&desired, &current()), Err(ControllerError::UserData(_))));
        }
    }
}
