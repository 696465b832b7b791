//! Controller assembly: live cluster boundary, event sink, reconciler, and
//! the watch task.

use std::sync::Arc;
use std::time::Duration;

use crds::SentinelAgent;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cluster::KubeCluster;
use crate::error::ReconcileError;
use crate::events::KubeEventSink;
use crate::reconciler::Reconciler;
use crate::watcher;

/// The running controller.
pub struct Controller {
    watcher: JoinHandle<Result<(), ReconcileError>>,
}

impl Controller {
    /// Connects to the cluster and starts the watch task. `namespace`
    /// restricts watching to one namespace; `None` watches everywhere.
    pub async fn new(
        namespace: Option<String>,
        requeue_period: Duration,
    ) -> Result<Self, ReconcileError> {
        info!("Initializing Sentinel Agent Controller");

        let client = Client::try_default().await?;
        let api: Api<SentinelAgent> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::all(client.clone()),
        };

        let cluster = Arc::new(KubeCluster::new(client.clone()));
        let events = Arc::new(KubeEventSink::new(client));
        let reconciler = Arc::new(Reconciler::new(cluster, events, requeue_period));

        let watcher =
            tokio::spawn(async move { watcher::watch_sentinel_agents(api, reconciler).await });
        Ok(Self { watcher })
    }

    /// Runs until the watch task ends.
    pub async fn run(self) -> Result<(), ReconcileError> {
        match self.watcher.await {
            Ok(result) => result,
            Err(e) => Err(ReconcileError::Watch(format!("watcher task failed: {e}"))),
        }
    }
}
