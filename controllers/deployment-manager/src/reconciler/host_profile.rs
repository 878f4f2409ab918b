//! HostProfile reconciler
//!
//! Profiles carry no platform state. A profile change is pushed to the Hosts
//! that consume it by stamping the `profile/<name>` annotation with the
//! profile's resource version.

use super::{Reconcile, Reconciler};
use crate::config::names;
use crate::error::Result;
use crate::store::{self, ResourceKind};
use async_trait::async_trait;
use crds::{Host, HostProfile, PROFILE_ANNOTATION_PREFIX};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

#[async_trait]
impl Reconcile for HostProfile {
    const TOGGLE: &'static str = names::HOST_PROFILE;
    const NEEDS_PLATFORM: bool = false;

    async fn apply(&self, reconciler: &Reconciler) -> Result<()> {
        reconciler.propagate_profile(self).await
    }

    async fn cleanup(&self, _reconciler: &Reconciler) -> Result<()> {
        Ok(())
    }
}

/// Whether the chain starting at `start` passes through `target`. Missing
/// links and cycles end the walk.
pub(crate) fn chain_contains(profiles: &BTreeMap<String, HostProfile>, start: &str, target: &str) -> bool {
    let mut visited = HashSet::new();
    let mut next = Some(start.to_string());

    while let Some(name) = next {
        if name == target {
            return true;
        }
        if !visited.insert(name.clone()) {
            return false;
        }
        next = profiles.get(&name).and_then(|p| p.spec.base.clone());
    }
    false
}

impl Reconciler {
    /// Stamp the profile's resource version on every Host consuming it.
    pub async fn propagate_profile(&self, profile: &HostProfile) -> Result<()> {
        let namespace = profile.namespace().unwrap_or_default();
        let name = profile.name_any();
        let version = profile.resource_version().unwrap_or_default();
        let key = format!("{}{}", PROFILE_ANNOTATION_PREFIX, name);

        let profiles: BTreeMap<String, HostProfile> = store::list::<HostProfile>(self.store(), &namespace)
            .await?
            .into_iter()
            .map(|p| (p.name_any(), p))
            .collect();

        for host in store::list::<Host>(self.store(), &namespace).await? {
            if !chain_contains(&profiles, &host.spec.profile, &name) {
                continue;
            }
            if host.annotations().get(&key) == Some(&version) {
                debug!("Host {} already at profile {} version {}", host.name_any(), name, version);
                continue;
            }

            info!("Profile {} changed, notifying host {}", name, host.name_any());
            store::annotate(self.store(), ResourceKind::Host, &namespace, &host.name_any(), &key, &version).await?;
        }
        Ok(())
    }
}
