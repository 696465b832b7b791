//! Unit tests for the status state machine.

use crds::{ActiveCanary, CanaryDaemonSet, CanaryDaemonSetStatus, WorkloadState};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetStatus as K8sDaemonSetStatus, Deployment, DeploymentCondition,
    DeploymentStatus as K8sDeploymentStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::status::{canary_daemon_set_status, daemon_set_status, deployment_status};

fn daemon_set(desired: i32, ready: i32, up_to_date: i32) -> DaemonSet {
    DaemonSet {
        metadata: ObjectMeta {
            name: Some("demo-agent".to_string()),
            ..Default::default()
        },
        status: Some(K8sDaemonSetStatus {
            desired_number_scheduled: desired,
            current_number_scheduled: desired,
            number_ready: ready,
            number_available: Some(ready),
            updated_number_scheduled: Some(up_to_date),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn deployment(replicas: i32, ready: i32, updated: i32) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some("demo-cluster-agent".to_string()),
            ..Default::default()
        },
        status: Some(K8sDeploymentStatus {
            replicas: Some(replicas),
            ready_replicas: Some(ready),
            updated_replicas: Some(updated),
            available_replicas: Some(ready),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn zero_ready_is_progressing_not_running() {
    let status = daemon_set_status(&daemon_set(3, 0, 3), None, None);
    assert_eq!(status.state, WorkloadState::Progressing);
    assert_eq!(status.status, "Progressing (3/0/3)");
}

#[test]
fn stale_replicas_are_updating() {
    let status = daemon_set_status(&daemon_set(3, 3, 2), None, None);
    assert_eq!(status.state, WorkloadState::Updating);
    assert_eq!(status.status, "Updating (3/3/2)");
}

#[test]
fn steady_state_is_running() {
    let status = daemon_set_status(&daemon_set(3, 3, 3), None, None);
    assert_eq!(status.state, WorkloadState::Running);
    assert_eq!(status.daemonset_name, "demo-agent");
}

#[test]
fn active_canary_beats_every_counter() {
    let cds = CanaryDaemonSet {
        metadata: ObjectMeta {
            name: Some("demo-agent".to_string()),
            ..Default::default()
        },
        spec: crds::CanaryDaemonSetSpec {
            selector: None,
            template: Default::default(),
            strategy: Default::default(),
        },
        status: Some(CanaryDaemonSetStatus {
            desired: 3,
            current: 3,
            ready: 3,
            available: 3,
            up_to_date: 1,
            canary: Some(ActiveCanary {
                replicas: 1,
                paused: false,
            }),
        }),
    };
    let status = canary_daemon_set_status(&cds, None, None);
    assert_eq!(status.state, WorkloadState::Canary);
    assert_eq!(status.status, "Canary (3/3/1)");
}

#[test]
fn absent_deployment_is_failed() {
    let status = deployment_status(None, None, None);
    assert_eq!(status.state, WorkloadState::Failed);
    assert_eq!(status.status, "Failed");
}

#[test]
fn replica_failure_condition_is_failed() {
    let mut dep = deployment(3, 3, 3);
    if let Some(status) = dep.status.as_mut() {
        status.conditions = Some(vec![DeploymentCondition {
            type_: "ReplicaFailure".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]);
    }
    let status = deployment_status(Some(&dep), None, None);
    assert_eq!(status.state, WorkloadState::Failed);
}

#[test]
fn deployment_updating_precedes_progressing() {
    let status = deployment_status(Some(&deployment(3, 3, 2)), None, None);
    assert_eq!(status.state, WorkloadState::Updating);
    assert_eq!(status.status, "Updating (3/3/2)");
}

#[test]
fn previous_last_update_is_kept_when_no_mutation_happened() {
    let now = chrono::Utc::now();
    let first = deployment_status(Some(&deployment(1, 1, 1)), None, Some(now));
    let second = deployment_status(Some(&deployment(1, 1, 1)), Some(&first), None);
    assert_eq!(second.last_update, Some(now));
}
