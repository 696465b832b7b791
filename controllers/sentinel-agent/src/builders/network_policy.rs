//! NetworkPolicy synthesis.
//!
//! Opt-in per component: pods are isolated, allowed egress to the intake
//! endpoints (443) and DNS, plus intra-installation traffic in both
//! directions.

use crds::SentinelAgent;
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec as NetPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::builders::{self, Component, object_meta, selector_labels};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

/// Whether the intent requests a NetworkPolicy for this component.
pub fn requested(intent: &SentinelAgent, component: Component) -> bool {
    let policy = match component {
        Component::Agent => intent
            .spec
            .agent
            .as_ref()
            .and_then(|s| s.network_policy.as_ref()),
        Component::ClusterAgent => intent
            .spec
            .cluster_agent
            .as_ref()
            .and_then(|s| s.network_policy.as_ref()),
        Component::ClusterChecksRunner => intent
            .spec
            .cluster_checks_runner
            .as_ref()
            .and_then(|s| s.network_policy.as_ref()),
    };
    policy.is_some_and(|p| p.create)
}

/// Synthesizes a component's NetworkPolicy.
pub fn network_policy(
    intent: &SentinelAgent,
    component: Component,
) -> Result<(NetworkPolicy, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = component.workload_name(intent);

    // Peers from any component of the same installation.
    let installation_peer = NetworkPolicyPeer {
        pod_selector: Some(LabelSelector {
            match_labels: Some(
                [(
                    "app.kubernetes.io/part-of".to_string(),
                    intent.name_any(),
                )]
                .into(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let spec = NetPolicySpec {
        pod_selector: Some(LabelSelector {
            match_labels: Some(selector_labels(intent, component)),
            ..Default::default()
        }),
        policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
        ingress: Some(vec![NetworkPolicyIngressRule {
            from: Some(vec![installation_peer.clone()]),
            ..Default::default()
        }]),
        egress: Some(vec![
            NetworkPolicyEgressRule {
                to: Some(vec![installation_peer]),
                ..Default::default()
            },
            // Intake over TLS.
            NetworkPolicyEgressRule {
                ports: Some(vec![port(443, "TCP")]),
                ..Default::default()
            },
            // DNS.
            NetworkPolicyEgressRule {
                ports: Some(vec![port(53, "UDP"), port(53, "TCP")]),
                ..Default::default()
            },
        ]),
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut policy = NetworkPolicy {
        metadata: object_meta(intent, component, &name, Some(&namespace)),
        spec: Some(spec),
    };
    fingerprint.stamp(&mut policy.metadata);
    Ok((policy, fingerprint))
}

fn port(number: i32, protocol: &str) -> NetworkPolicyPort {
    NetworkPolicyPort {
        port: Some(IntOrString::Int(number)),
        protocol: Some(protocol.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::intent_with_all_components;

    #[test]
    fn not_requested_by_default() {
        let intent = intent_with_all_components("monitoring");
        assert!(!requested(&intent, Component::Agent));
    }

    #[test]
    fn policy_selects_the_component_pods() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(agent) = intent.spec.agent.as_mut() {
            agent.network_policy = Some(crds::NetworkPolicySpec { create: true });
        }
        assert!(requested(&intent, Component::Agent));
        let (policy, _) = network_policy(&intent, Component::Agent).unwrap();
        let selector = policy.spec.unwrap().pod_selector.unwrap();
        assert_eq!(
            selector
                .match_labels
                .unwrap()
                .get("app.kubernetes.io/instance")
                .map(String::as_str),
            Some("monitoring-agent")
        );
    }
}
