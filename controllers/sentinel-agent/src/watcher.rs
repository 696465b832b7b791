//! SentinelAgent watch loop.
//!
//! Runs `kube_runtime::Controller` over the intent CRD: automatic
//! reconnection, per-object serialization of passes, and backoff on errors.
//! Status-only updates are debounced so a settling workload does not storm
//! the reconciler.

use std::sync::Arc;
use std::time::Duration;

use crds::SentinelAgent;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as ControllerConfig},
};
use tracing::{debug, error, info};

use crate::cluster::ClusterOps;
use crate::error::ReconcileError;
use crate::events::EventSink;
use crate::reconciler::Reconciler;

/// Delay before a failed pass is retried.
const ERROR_REQUEUE: Duration = Duration::from_secs(60);

/// Watches SentinelAgent objects until the stream ends.
pub async fn watch_sentinel_agents<C, E>(
    api: Api<SentinelAgent>,
    reconciler: Arc<Reconciler<C, E>>,
) -> Result<(), ReconcileError>
where
    C: ClusterOps + 'static,
    E: EventSink + 'static,
{
    info!("Starting SentinelAgent watcher");

    let error_policy = |obj: Arc<SentinelAgent>, error: &ReconcileError, _ctx: Arc<Reconciler<C, E>>| {
        error!(
            "Reconciliation error for SentinelAgent {}: {}",
            obj.name_any(),
            error
        );
        Action::requeue(ERROR_REQUEUE)
    };

    let reconcile = |obj: Arc<SentinelAgent>, ctx: Arc<Reconciler<C, E>>| async move {
        ctx.run(&obj).await
    };

    // Debounce batches the status-update bursts a rolling workload causes;
    // concurrency bounds simultaneous passes across distinct intents.
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!("Reconciled SentinelAgent {}", obj.name),
                Err(e) => error!("Controller error: {e}"),
            }
        })
        .await;

    info!("SentinelAgent watcher stream ended");
    Ok(())
}
