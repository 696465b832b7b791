//! Controller-owned status types for the SentinelAgent CRD.
//!
//! One sub-status per logical component, overwritten wholesale on every
//! reconciliation pass. Never consumed by desired-state synthesis.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// SentinelAgent observed state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentinelAgentStatus {
    /// Node agent workload status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<DaemonSetStatus>,

    /// Cluster agent deployment status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_agent: Option<DeploymentStatus>,

    /// Cluster checks runner deployment status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_checks_runner: Option<DeploymentStatus>,

    /// Reconciliation conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AgentCondition>,
}

/// Coarse lifecycle state derived from a workload's live counters.
///
/// Serializes as PascalCase ("Running", "Failed", etc.) but deserializes
/// lowercase too for backward compatibility with existing CRs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum WorkloadState {
    /// Platform reported a replica failure, or the workload is absent after
    /// a failed create
    #[serde(alias = "failed")]
    Failed,

    /// Current-version replica count differs from the desired count
    #[serde(alias = "updating")]
    Updating,

    /// Replicas exist but none are ready yet
    #[default]
    #[serde(alias = "progressing")]
    Progressing,

    /// A canary rollout is in progress (CanaryDaemonSet only)
    #[serde(alias = "canary")]
    Canary,

    /// Steady state
    #[serde(alias = "running")]
    Running,
}

impl std::fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkloadState::Failed => "Failed",
            WorkloadState::Updating => "Updating",
            WorkloadState::Progressing => "Progressing",
            WorkloadState::Canary => "Canary",
            WorkloadState::Running => "Running",
        };
        f.write_str(s)
    }
}

/// Status of the node agent workload (DaemonSet or CanaryDaemonSet).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetStatus {
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

    /// Derived lifecycle state
    pub state: WorkloadState,

    /// Human readable `"<state> (<desired>/<ready>/<upToDate>)"`
    pub status: String,

    /// Fingerprint of the deployed spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,

    /// Last time this record was rewritten by a mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,

    /// Name of the live workload. Immutable once set.
    pub daemonset_name: String,
}

/// Status of a Deployment-backed component.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Total replicas
    pub replicas: i32,

    /// Replicas running the current template
    pub updated_replicas: i32,

    /// Replicas ready
    pub ready_replicas: i32,

    /// Replicas available
    pub available_replicas: i32,

    /// Replicas unavailable
    pub unavailable_replicas: i32,

    /// Derived lifecycle state
    pub state: WorkloadState,

    /// Human readable `"<state> (<replicas>/<ready>/<updated>)"`
    pub status: String,

    /// Fingerprint of the deployed spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,

    /// Last time this record was rewritten by a mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,

    /// Name of the live deployment. Immutable once set.
    pub deployment_name: String,
}

/// Condition type on the intent object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum AgentConditionType {
    /// The last reconciliation pass completed
    Active,

    /// The last reconciliation pass returned an error
    ReconcileError,
}

/// One reconciliation condition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: AgentConditionType,

    /// "True" or "False"
    pub status: String,

    /// Last time the condition was evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<chrono::DateTime<chrono::Utc>>,

    /// Last time the condition flipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,

    /// Human readable detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
