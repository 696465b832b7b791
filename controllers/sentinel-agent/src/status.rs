//! Status state machine.
//!
//! Pure folds of a live workload's counters into the coarse lifecycle state
//! published on the intent. Precedence: Canary (advanced mechanism only),
//! then Failed, then Updating, then Progressing, then Running. These
//! functions never touch the cluster.

use chrono::{DateTime, Utc};
use crds::{CanaryDaemonSet, DaemonSetStatus, DeploymentStatus, WorkloadState};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::ResourceExt;

use crate::fingerprint::current_hash;

fn render(state: WorkloadState, desired: i32, ready: i32, up_to_date: i32) -> String {
    format!("{state} ({desired}/{ready}/{up_to_date})")
}

/// Derives the agent component status from a live DaemonSet.
pub fn daemon_set_status(
    ds: &DaemonSet,
    previous: Option<&DaemonSetStatus>,
    update_time: Option<DateTime<Utc>>,
) -> DaemonSetStatus {
    let mut status = previous.cloned().unwrap_or_default();
    if let Some(ts) = update_time {
        status.last_update = Some(ts);
    }
    status.current_hash = current_hash(ds.metadata.annotations.as_ref());

    let live = ds.status.clone().unwrap_or_default();
    status.desired = live.desired_number_scheduled;
    status.current = live.current_number_scheduled;
    status.ready = live.number_ready;
    status.available = live.number_available.unwrap_or_default();
    status.up_to_date = live.updated_number_scheduled.unwrap_or_default();

    status.state = match () {
        _ if status.up_to_date != status.desired => WorkloadState::Updating,
        _ if status.ready == 0 => WorkloadState::Progressing,
        _ => WorkloadState::Running,
    };
    status.status = render(status.state, status.desired, status.ready, status.up_to_date);
    status.daemonset_name = ds.name_any();
    status
}

/// Derives the agent component status from a live CanaryDaemonSet.
///
/// An active canary marker takes precedence over every counter-derived
/// state.
pub fn canary_daemon_set_status(
    cds: &CanaryDaemonSet,
    previous: Option<&DaemonSetStatus>,
    update_time: Option<DateTime<Utc>>,
) -> DaemonSetStatus {
    let mut status = previous.cloned().unwrap_or_default();
    if let Some(ts) = update_time {
        status.last_update = Some(ts);
    }
    status.current_hash = current_hash(cds.metadata.annotations.as_ref());

    let live = cds.status.clone().unwrap_or_default();
    status.desired = live.desired;
    status.current = live.current;
    status.ready = live.ready;
    status.available = live.available;
    status.up_to_date = live.up_to_date;

    status.state = match () {
        _ if live.canary.is_some() => WorkloadState::Canary,
        _ if status.up_to_date != status.desired => WorkloadState::Updating,
        _ if status.ready == 0 => WorkloadState::Progressing,
        _ => WorkloadState::Running,
    };
    status.status = render(status.state, status.desired, status.ready, status.up_to_date);
    status.daemonset_name = cds.name_any();
    status
}

/// Derives a Deployment-backed component status.
///
/// `None` means the workload is absent after a failed create: Failed.
/// A true ReplicaFailure condition on the live object is Failed regardless
/// of the counters.
pub fn deployment_status(
    dep: Option<&Deployment>,
    previous: Option<&DeploymentStatus>,
    update_time: Option<DateTime<Utc>>,
) -> DeploymentStatus {
    let mut status = previous.cloned().unwrap_or_default();
    let Some(dep) = dep else {
        status.state = WorkloadState::Failed;
        status.status = WorkloadState::Failed.to_string();
        return status;
    };
    if let Some(ts) = update_time {
        status.last_update = Some(ts);
    }
    status.current_hash = current_hash(dep.metadata.annotations.as_ref());

    let live = dep.status.clone().unwrap_or_default();
    status.replicas = live.replicas.unwrap_or_default();
    status.updated_replicas = live.updated_replicas.unwrap_or_default();
    status.ready_replicas = live.ready_replicas.unwrap_or_default();
    status.available_replicas = live.available_replicas.unwrap_or_default();
    status.unavailable_replicas = live.unavailable_replicas.unwrap_or_default();

    let replica_failure = live
        .conditions
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == "ReplicaFailure" && c.status == "True");

    status.state = match () {
        _ if replica_failure => WorkloadState::Failed,
        _ if status.updated_replicas != status.replicas => WorkloadState::Updating,
        _ if status.ready_replicas == 0 => WorkloadState::Progressing,
        _ => WorkloadState::Running,
    };
    status.status = render(
        status.state,
        status.replicas,
        status.ready_replicas,
        status.updated_replicas,
    );
    status.deployment_name = dep.name_any();
    status
}
