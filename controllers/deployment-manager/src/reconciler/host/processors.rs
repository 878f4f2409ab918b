//! CPU core allocation

use super::defaults::LiveHost;
use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_UPDATED};
use crate::reconciler::Reconciler;
use crds::{Host, HostProfileSpec, ProcessorInfo};
use platform_client::{Cpu, CpuOpts, PlatformClientTrait};
use std::collections::BTreeMap;
use tracing::info;

/// Physical cores per `(node, function)`. Hyperthread siblings are not
/// counted.
fn core_counts(cpus: &[Cpu]) -> BTreeMap<(i32, String), i32> {
    let mut counts = BTreeMap::new();
    for cpu in cpus.iter().filter(|c| c.thread == 0) {
        *counts.entry((cpu.processor, cpu.function.to_lowercase())).or_default() += 1;
    }
    counts
}

/// Allocation requests needed to reach `desired`, one per function.
///
/// The platform reallocates every listed function in one request, so when
/// any count differs the full desired allocation is sent.
pub(crate) fn cpu_updates(desired: &[ProcessorInfo], cpus: &[Cpu]) -> Result<Vec<CpuOpts>> {
    let counts = core_counts(cpus);
    let mut changed = false;

    for node in desired {
        if !cpus.iter().any(|c| c.processor == node.node) {
            return Err(ControllerError::MissingSystemResource(format!(
                "processor node {} not present on host",
                node.node
            )));
        }
        for function in &node.functions {
            let key = (node.node, function.function.to_lowercase());
            if counts.get(&key).copied().unwrap_or_default() != function.count {
                changed = true;
            }
        }
    }
    if !changed {
        return Ok(Vec::new());
    }

    let mut sockets: BTreeMap<String, Vec<BTreeMap<String, i32>>> = BTreeMap::new();
    for node in desired {
        for function in &node.functions {
            sockets
                .entry(function.function.to_lowercase())
                .or_default()
                .push(BTreeMap::from([(node.node.to_string(), function.count)]));
        }
    }
    Ok(sockets
        .into_iter()
        .map(|(function, sockets)| CpuOpts { function, sockets })
        .collect())
}

impl Reconciler {
    pub(crate) async fn reconcile_processors(
        &self,
        client: &dyn PlatformClientTrait,
        host: &Host,
        desired: &HostProfileSpec,
        live: &mut LiveHost,
    ) -> Result<()> {
        if !self.config.is_enabled(names::HOST_PROCESSOR) || !desired.has_worker_subfunction() {
            return Ok(());
        }
        let Some(processors) = desired.processors.as_ref() else {
            return Ok(());
        };

        let updates = cpu_updates(processors, &live.cpus)?;
        if updates.is_empty() {
            return Ok(());
        }

        info!("Updating CPU allocation of host {}: {:?}", live.id(), updates);
        client.update_cpus(live.id(), &updates).await?;
        live.cpus = client.list_cpus(live.id()).await?;
        events::normal(self.store(), host, REASON_UPDATED, "processor allocations have been updated").await;
        Ok(())
    }
}
