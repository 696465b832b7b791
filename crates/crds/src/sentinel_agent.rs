//! SentinelAgent CRD
//!
//! The single intent object a human or automation edits. Each optional
//! component sub-spec maps to one managed workload; removing a sub-spec
//! removes the workload. Status is controller-owned and rewritten on every
//! reconciliation pass.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::status::SentinelAgentStatus;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "sentinelops.io",
    version = "v1alpha1",
    kind = "SentinelAgent",
    namespaced,
    status = "SentinelAgentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct SentinelAgentSpec {
    /// Cluster name reported by every component
    pub cluster_name: String,

    /// Site/region the agents report to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    /// Image registry prefix applied to component images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Name of the user-provided Secret holding API credentials
    pub credentials_secret: String,

    /// Glob-style filter of previous label keys to preserve on updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_labels: Option<String>,

    /// Glob-style filter of previous annotation keys to preserve on updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_annotations: Option<String>,

    /// Node agent component. Absent means the component must not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSpec>,

    /// Cluster agent component. Absent means the component must not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_agent: Option<ClusterAgentSpec>,

    /// Cluster checks runner component. Absent means the component must not
    /// exist. Also requires the cluster agent with cluster checks enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_checks_runner: Option<ClusterChecksRunnerSpec>,
}

/// Node agent sub-spec (DaemonSet or CanaryDaemonSet).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Workload name override. Immutable once the workload is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Agent container image
    pub image: String,

    /// Agent log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Distribute the agent with a CanaryDaemonSet instead of a plain
    /// DaemonSet. Exactly one mechanism is active at a time.
    #[serde(default)]
    pub use_canary_daemon_set: bool,

    /// Rollout pacing, only honoured by the CanaryDaemonSet mechanism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<RolloutSpec>,

    /// Enable log collection
    #[serde(default)]
    pub log_collection: bool,

    /// Enable process collection
    #[serde(default)]
    pub process_collection: bool,

    /// Network policy for agent pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicySpec>,
}

/// Cluster agent sub-spec (Deployment).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAgentSpec {
    /// Workload name override. Immutable once the workload is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Cluster agent container image
    pub image: String,

    /// Replica count. Left unset, the live value is preserved so external
    /// autoscaling is never fought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Enable cluster check dispatching
    #[serde(default)]
    pub cluster_checks_enabled: bool,

    /// Inline custom configuration mounted through a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<String>,

    /// Network policy for cluster agent pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicySpec>,
}

/// Cluster checks runner sub-spec (Deployment).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterChecksRunnerSpec {
    /// Workload name override. Immutable once the workload is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Checks runner container image
    pub image: String,

    /// Replica count. Left unset, the live value is preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Inline custom configuration mounted through a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<String>,

    /// Network policy for checks runner pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicySpec>,
}

/// Rollout pacing for the canary-capable mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSpec {
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

/// Canary phase configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanarySpec {
    /// Number of canary replicas
    pub replicas: i32,

    /// Seconds the canary must stay healthy before the rollout proceeds
    pub duration_seconds: i32,
}

/// Per-component network policy knob.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    /// Create a NetworkPolicy for this component
    #[serde(default)]
    pub create: bool,
}
