//! PodDisruptionBudget synthesis for the Deployment-shaped components.

use crds::SentinelAgent;
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::builders::{self, Component, object_meta, selector_labels};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

/// Name of a component's PodDisruptionBudget.
pub fn pdb_name(intent: &SentinelAgent, component: Component) -> String {
    format!("{}-pdb", component.workload_name(intent))
}

/// Synthesizes a component's PodDisruptionBudget: at most one pod down at a
/// time.
pub fn pod_disruption_budget(
    intent: &SentinelAgent,
    component: Component,
) -> Result<(PodDisruptionBudget, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = pdb_name(intent, component);

    let spec = PodDisruptionBudgetSpec {
        max_unavailable: Some(IntOrString::Int(1)),
        selector: Some(LabelSelector {
            match_labels: Some(selector_labels(intent, component)),
            ..Default::default()
        }),
        ..Default::default()
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut budget = PodDisruptionBudget {
        metadata: object_meta(intent, component, &name, Some(&namespace)),
        spec: Some(spec),
        ..Default::default()
    };
    fingerprint.stamp(&mut budget.metadata);
    Ok((budget, fingerprint))
}
