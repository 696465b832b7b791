//! CanaryDaemonSet CRD
//!
//! The advanced workload-distribution mechanism for the node agent:
//! configurable rollout pacing plus an optional canary phase. Mutually
//! exclusive with a plain DaemonSet for the same intent.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sentinel_agent::CanarySpec;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "sentinelops.io",
    version = "v1alpha1",
    kind = "CanaryDaemonSet",
    namespaced,
    status = "CanaryDaemonSetStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CanaryDaemonSetSpec {
    /// Pod selector. Immutable once set by the server or the first creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Pod template
    pub template: PodTemplateSpec,

    /// Rollout pacing
    #[serde(default)]
    pub strategy: CanaryRolloutStrategy,
}

/// Rollout pacing fields of a CanaryDaemonSet.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanaryRolloutStrategy {
    /// Maximum number (or percentage) of nodes updated simultaneously
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<String>,

    /// Maximum number of pods created in parallel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_pod_creation: Option<i32>,

    /// Seconds between slow-start batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_start_interval_seconds: Option<i32>,

    /// Canary phase ahead of the full rollout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanarySpec>,
}

/// Observed state of a CanaryDaemonSet.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanaryDaemonSetStatus {
    /// Nodes that should run a pod
    pub desired: i32,

    /// Nodes currently running a pod
    pub current: i32,

    /// Pods ready
    pub ready: i32,

    /// Pods available
    pub available: i32,

    /// Pods running the current template
    pub up_to_date: i32,

    /// Canary phase in progress. Present iff a canary rollout is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<ActiveCanary>,
}

/// Marker for an in-progress canary rollout.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCanary {
    /// Replicas running the canary template
    pub replicas: i32,

    /// The canary is paused pending manual validation
    #[serde(default)]
    pub paused: bool,
}
