//! Kubernetes resource watchers.
//!
//! Every kind is driven by its own `kube_runtime::Controller`, which handles
//! reconnection and guarantees that one object is never reconciled twice
//! at the same time. The retry interval after a failure comes from
//! [`Reconciler::error_action`].

use crate::error::ControllerError;
use crate::reconciler::{Reconcile, Reconciler};
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Delay after the last event before an object is reconciled
const DEBOUNCE: Duration = Duration::from_secs(1);

/// Concurrent reconciliations per kind
const CONCURRENCY: u16 = 4;

async fn reconcile<K: Reconcile>(obj: Arc<K>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    ctx.reconcile(obj).await
}

fn error_policy<K: Reconcile>(obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    ctx.error_action(&Reconciler::backoff_key(obj.as_ref()), error)
}

/// Watch one kind until the stream ends.
pub async fn watch<K: Reconcile>(api: Api<K>, reconciler: Arc<Reconciler>) -> Result<(), ControllerError> {
    let kind = K::KIND;
    info!("Starting {} watcher", kind);

    let config = ControllerConfig::default().debounce(DEBOUNCE).concurrency(CONCURRENCY);
    Controller::new(api, watcher::Config::default())
        .with_config(config)
        .run(reconcile::<K>, error_policy::<K>, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {} {}", kind, obj.name),
                Err(e) => error!("{} controller error: {}", kind, e),
            }
        })
        .await;

    Err(ControllerError::Watch(format!("{} watch stream ended", kind)))
}
