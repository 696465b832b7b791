//! Sentinel Agent Controller
//!
//! Reconciles `SentinelAgent` intent objects into a running monitoring
//! installation: a node agent (DaemonSet or CanaryDaemonSet), an optional
//! cluster agent Deployment, an optional cluster checks runner Deployment,
//! and the RBAC, config and policy objects they depend on.
//!
//! Drift is detected through a spec fingerprint stamped onto every managed
//! object; mutations are minimal and never touch objects the intent does
//! not own.

mod builders;
mod cluster;
mod controller;
mod error;
mod events;
mod fingerprint;
mod merge;
mod owner;
mod reconciler;
mod status;
mod steps;
mod watcher;

#[cfg(test)]
mod reconciler_test;
#[cfg(test)]
mod status_test;
#[cfg(test)]
mod test_utils;

use std::env;
use std::time::Duration;

use tracing::info;

use crate::controller::Controller;
use crate::error::ReconcileError;

/// Steady-state requeue period when nothing drifted.
const DEFAULT_REQUEUE_PERIOD_SECONDS: u64 = 900;

#[tokio::main]
async fn main() -> Result<(), ReconcileError> {
    tracing_subscriber::fmt::init();

    info!("Starting Sentinel Agent Controller");

    let namespace = env::var("WATCH_NAMESPACE").ok();
    let requeue_period = env::var("REQUEUE_PERIOD_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_REQUEUE_PERIOD_SECONDS);

    info!("Configuration:");
    info!(
        "  Namespace: {}",
        namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Requeue period: {}s", requeue_period);

    let controller = Controller::new(namespace, Duration::from_secs(requeue_period)).await?;
    controller.run().await
}
