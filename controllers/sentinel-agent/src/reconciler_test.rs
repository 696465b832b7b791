//! End-to-end reconciliation scenarios against the in-memory cluster.

use std::sync::Arc;
use std::time::Duration;

use crds::SentinelAgent;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::ResourceExt;

use crate::cluster::fake::FakeCluster;
use crate::error::ReconcileError;
use crate::events::{EventAction, MemoryEventSink};
use crate::reconciler::{MECHANISM_SWITCH_DELAY, Reconciler};
use crate::steps::StepOutcome;
use crate::test_utils::{agent_only_intent, intent_with_all_components};

fn harness() -> (
    Arc<FakeCluster>,
    Arc<MemoryEventSink>,
    Reconciler<FakeCluster, MemoryEventSink>,
) {
    let cluster = Arc::new(FakeCluster::new());
    let events = Arc::new(MemoryEventSink::default());
    let reconciler = Reconciler::new(cluster.clone(), events.clone(), Duration::from_secs(900));
    (cluster, events, reconciler)
}

/// Runs one pass and folds the patched status back onto the intent, the way
/// the next watch event would deliver it.
async fn settle(
    reconciler: &Reconciler<FakeCluster, MemoryEventSink>,
    cluster: &FakeCluster,
    intent: &mut SentinelAgent,
) {
    reconciler.run(intent).await.unwrap();
    intent.status = cluster.intent_status("default", &intent.name_any());
}

#[tokio::test]
async fn first_pass_creates_the_full_component_set() {
    let (cluster, events, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;

    assert!(
        cluster
            .stored::<Deployment>("default", "monitoring-cluster-agent")
            .is_some()
    );
    assert!(
        cluster
            .stored::<Deployment>("default", "monitoring-cluster-checks-runner")
            .is_some()
    );
    assert!(
        cluster
            .stored::<DaemonSet>("default", "monitoring-agent")
            .is_some()
    );

    let status = intent.status.as_ref().unwrap();
    assert_eq!(
        status.cluster_agent.as_ref().unwrap().deployment_name,
        "monitoring-cluster-agent"
    );
    assert_eq!(
        status.agent.as_ref().unwrap().daemonset_name,
        "monitoring-agent"
    );

    let creates = events
        .recorded()
        .into_iter()
        .filter(|e| e.action == EventAction::Create)
        .count();
    assert!(creates >= 3, "expected create events for every workload");
}

#[tokio::test]
async fn settled_intent_issues_no_writes() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;

    cluster.reset_writes();
    settle(&reconciler, &cluster, &mut intent).await;
    assert_eq!(cluster.writes(), Vec::<String>::new());
}

#[tokio::test]
async fn foreign_workload_at_managed_name_is_never_mutated() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");

    // A deployment someone else created under the name we would manage.
    let foreign = Deployment {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some("monitoring-cluster-agent".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    cluster.seed(&foreign);

    settle(&reconciler, &cluster, &mut intent).await;

    let untouched = cluster
        .stored::<Deployment>("default", "monitoring-cluster-agent")
        .unwrap();
    assert_eq!(untouched, foreign);
    assert!(
        !cluster
            .writes()
            .iter()
            .any(|w| w.contains("Deployment default/monitoring-cluster-agent")),
        "foreign deployment must not appear in the write log"
    );
}

#[tokio::test]
async fn renaming_a_workload_fails_without_mutations() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;

    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.name = Some("renamed-cluster-agent".to_string());
    }
    cluster.reset_writes();

    let result = reconciler.run(&intent).await;
    assert!(matches!(
        result,
        Err(ReconcileError::RenameForbidden { current, requested, .. })
            if current == "monitoring-cluster-agent" && requested == "renamed-cluster-agent"
    ));
    assert_eq!(cluster.writes(), Vec::<String>::new());

    // The failure lands in the ReconcileError condition.
    let status = cluster.intent_status("default", "monitoring").unwrap();
    let error_condition = status
        .conditions
        .iter()
        .find(|c| c.condition_type == crds::AgentConditionType::ReconcileError)
        .unwrap();
    assert_eq!(error_condition.status, "True");
}

#[tokio::test]
async fn transient_api_error_keeps_status_and_rename_rejection() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;

    // The API server briefly fails reads of the managed deployment.
    cluster.fail_reads_of::<Deployment>("default", "monitoring-cluster-agent");
    assert!(reconciler.run(&intent).await.is_err());
    intent.status = cluster.intent_status("default", "monitoring");
    assert_eq!(
        intent
            .status
            .as_ref()
            .unwrap()
            .cluster_agent
            .as_ref()
            .unwrap()
            .deployment_name,
        "monitoring-cluster-agent",
        "a failed pass must not lose the recorded workload name"
    );

    // With the recorded name intact, a rename is still rejected once the
    // outage lifts, and the old workload is not orphaned.
    cluster.clear_read_failures();
    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.name = Some("renamed-cluster-agent".to_string());
    }
    let result = reconciler.run(&intent).await;
    assert!(matches!(
        result,
        Err(ReconcileError::RenameForbidden { .. })
    ));
    assert!(
        cluster
            .stored::<Deployment>("default", "renamed-cluster-agent")
            .is_none()
    );
    assert!(
        cluster
            .stored::<Deployment>("default", "monitoring-cluster-agent")
            .is_some()
    );
}

#[tokio::test]
async fn agent_only_intent_creates_no_control_plane_workloads() {
    let (cluster, _, reconciler) = harness();
    let mut intent = agent_only_intent("edge");
    settle(&reconciler, &cluster, &mut intent).await;

    assert!(cluster.stored::<DaemonSet>("default", "edge-agent").is_some());
    assert!(
        cluster
            .stored::<Deployment>("default", "edge-cluster-agent")
            .is_none()
    );
    assert!(
        cluster
            .stored::<Deployment>("default", "edge-cluster-checks-runner")
            .is_none()
    );

    let status = intent.status.as_ref().unwrap();
    assert!(status.agent.is_some());
    assert!(status.cluster_agent.is_none());
    assert!(status.cluster_checks_runner.is_none());
}

#[tokio::test]
async fn mechanism_switch_deletes_first_and_creates_next_pass() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;
    assert!(
        cluster
            .stored::<DaemonSet>("default", "monitoring-agent")
            .is_some()
    );

    if let Some(agent) = intent.spec.agent.as_mut() {
        agent.use_canary_daemon_set = true;
    }
    intent.metadata.generation = Some(2);

    // The switching pass only retires the old mechanism.
    let mut status = intent.status.clone().unwrap_or_default();
    let outcome = reconciler.reconcile_agent(&intent, &mut status).await.unwrap();
    assert_eq!(outcome, StepOutcome::RequeueAfter(MECHANISM_SWITCH_DELAY));
    assert!(
        cluster
            .stored::<DaemonSet>("default", "monitoring-agent")
            .is_none()
    );
    assert!(
        cluster
            .stored::<crds::CanaryDaemonSet>("default", "monitoring-agent")
            .is_none(),
        "both mechanisms must never coexist"
    );

    // The follow-up pass creates the canary-capable mechanism.
    settle(&reconciler, &cluster, &mut intent).await;
    assert!(
        cluster
            .stored::<crds::CanaryDaemonSet>("default", "monitoring-agent")
            .is_some()
    );
    assert!(
        cluster
            .stored::<DaemonSet>("default", "monitoring-agent")
            .is_none()
    );
}

#[tokio::test]
async fn disabling_checks_removes_the_owned_runner_and_clears_status() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;
    assert!(
        intent
            .status
            .as_ref()
            .unwrap()
            .cluster_checks_runner
            .is_some()
    );

    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.cluster_checks_enabled = false;
    }
    intent.metadata.generation = Some(2);
    settle(&reconciler, &cluster, &mut intent).await;

    assert!(
        cluster
            .stored::<Deployment>("default", "monitoring-cluster-checks-runner")
            .is_none()
    );
    assert!(
        intent
            .status
            .as_ref()
            .unwrap()
            .cluster_checks_runner
            .is_none()
    );
}

#[tokio::test]
async fn image_drift_rewrites_the_workload_and_preserves_live_replicas() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.replicas = None;
    }
    settle(&reconciler, &cluster, &mut intent).await;

    // An autoscaler scaled the live deployment.
    let mut live = cluster
        .stored::<Deployment>("default", "monitoring-cluster-agent")
        .unwrap();
    if let Some(spec) = live.spec.as_mut() {
        spec.replicas = Some(5);
    }
    cluster.seed(&live);

    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.image = "sentinel/cluster-agent:7.51".to_string();
    }
    intent.metadata.generation = Some(2);
    cluster.reset_writes();
    settle(&reconciler, &cluster, &mut intent).await;

    let updated = cluster
        .stored::<Deployment>("default", "monitoring-cluster-agent")
        .unwrap();
    let spec = updated.spec.unwrap();
    assert_eq!(spec.replicas, Some(5), "platform-owned replicas preserved");
    assert_eq!(
        spec.template.spec.unwrap().containers[0].image.as_deref(),
        Some("sentinel/cluster-agent:7.51")
    );
    assert!(
        cluster
            .writes()
            .contains(&"update Deployment default/monitoring-cluster-agent".to_string())
    );
}

#[tokio::test]
async fn keep_filter_preserves_previous_labels_on_update() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    intent.spec.keep_labels = Some("team.example.com/*".to_string());
    settle(&reconciler, &cluster, &mut intent).await;

    let mut live = cluster
        .stored::<Deployment>("default", "monitoring-cluster-agent")
        .unwrap();
    live.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert("team.example.com/owner".to_string(), "sre".to_string());
    cluster.seed(&live);

    if let Some(ca) = intent.spec.cluster_agent.as_mut() {
        ca.image = "sentinel/cluster-agent:7.51".to_string();
    }
    intent.metadata.generation = Some(2);
    settle(&reconciler, &cluster, &mut intent).await;

    let updated = cluster
        .stored::<Deployment>("default", "monitoring-cluster-agent")
        .unwrap();
    assert_eq!(
        updated
            .metadata
            .labels
            .unwrap()
            .get("team.example.com/owner")
            .map(String::as_str),
        Some("sre")
    );
}

#[tokio::test]
async fn active_condition_reports_a_clean_pass() {
    let (cluster, _, reconciler) = harness();
    let mut intent = intent_with_all_components("monitoring");
    settle(&reconciler, &cluster, &mut intent).await;

    let status = intent.status.as_ref().unwrap();
    let active = status
        .conditions
        .iter()
        .find(|c| c.condition_type == crds::AgentConditionType::Active)
        .unwrap();
    assert_eq!(active.status, "True");
}
