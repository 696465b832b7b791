//! RBAC synthesis: per-component ServiceAccount and ClusterRole/Binding,
//! plus the namespaced Role/Binding the cluster agent needs for leader
//! election.
//!
//! Cluster-scoped names are prefixed with the intent's namespace so two
//! intents with the same name in different namespaces never collide.

use crds::SentinelAgent;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};

use crate::builders::{self, Component, object_meta};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Name of a component's cluster-scoped RBAC objects.
pub fn cluster_scoped_name(
    intent: &SentinelAgent,
    component: Component,
) -> Result<String, ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    Ok(format!("{namespace}-{}", component.workload_name(intent)))
}

/// Synthesizes a component's ServiceAccount.
pub fn service_account(
    intent: &SentinelAgent,
    component: Component,
) -> Result<(ServiceAccount, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = component.workload_name(intent);
    let metadata = object_meta(intent, component, &name, Some(&namespace));
    let fingerprint = Fingerprint::of(&metadata, intent.metadata.generation)?;
    let mut account = ServiceAccount {
        metadata,
        ..Default::default()
    };
    fingerprint.stamp(&mut account.metadata);
    Ok((account, fingerprint))
}

/// Synthesizes a component's ClusterRole.
pub fn cluster_role(
    intent: &SentinelAgent,
    component: Component,
) -> Result<(ClusterRole, Fingerprint), ReconcileError> {
    let name = cluster_scoped_name(intent, component)?;
    let rules = component_rules(component);
    let fingerprint = Fingerprint::of(&rules, intent.metadata.generation)?;
    let mut role = ClusterRole {
        metadata: object_meta(intent, component, &name, None),
        rules: Some(rules),
        ..Default::default()
    };
    fingerprint.stamp(&mut role.metadata);
    Ok((role, fingerprint))
}

/// Synthesizes the binding of a component's ClusterRole to its
/// ServiceAccount.
pub fn cluster_role_binding(
    intent: &SentinelAgent,
    component: Component,
) -> Result<(ClusterRoleBinding, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = cluster_scoped_name(intent, component)?;
    let role_ref = RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "ClusterRole".to_string(),
        name: name.clone(),
    };
    let subjects = vec![Subject {
        kind: "ServiceAccount".to_string(),
        name: component.workload_name(intent),
        namespace: Some(namespace),
        ..Default::default()
    }];
    let fingerprint = Fingerprint::of(&(&role_ref, &subjects), intent.metadata.generation)?;
    let mut binding = ClusterRoleBinding {
        metadata: object_meta(intent, component, &name, None),
        role_ref,
        subjects: Some(subjects),
    };
    fingerprint.stamp(&mut binding.metadata);
    Ok((binding, fingerprint))
}

/// Synthesizes the namespaced Role the cluster agent uses for leader
/// election and credential reads.
pub fn leader_election_role(
    intent: &SentinelAgent,
) -> Result<(Role, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::ClusterAgent.workload_name(intent);
    let rules = vec![
        rule(&[""], &["configmaps"], &["get", "create", "update"]),
        rule(
            &["coordination.k8s.io"],
            &["leases"],
            &["get", "create", "update"],
        ),
        rule(&[""], &["secrets"], &["get"]),
    ];
    let fingerprint = Fingerprint::of(&rules, intent.metadata.generation)?;
    let mut role = Role {
        metadata: object_meta(intent, Component::ClusterAgent, &name, Some(&namespace)),
        rules: Some(rules),
    };
    fingerprint.stamp(&mut role.metadata);
    Ok((role, fingerprint))
}

/// Synthesizes the binding of the leader-election Role.
pub fn leader_election_role_binding(
    intent: &SentinelAgent,
) -> Result<(RoleBinding, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::ClusterAgent.workload_name(intent);
    let role_ref = RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "Role".to_string(),
        name: name.clone(),
    };
    let subjects = vec![Subject {
        kind: "ServiceAccount".to_string(),
        name: name.clone(),
        namespace: Some(namespace.clone()),
        ..Default::default()
    }];
    let fingerprint = Fingerprint::of(&(&role_ref, &subjects), intent.metadata.generation)?;
    let mut binding = RoleBinding {
        metadata: object_meta(intent, Component::ClusterAgent, &name, Some(&namespace)),
        role_ref,
        subjects: Some(subjects),
    };
    fingerprint.stamp(&mut binding.metadata);
    Ok((binding, fingerprint))
}

fn component_rules(component: Component) -> Vec<PolicyRule> {
    match component {
        Component::Agent => vec![
            rule(
                &[""],
                &["nodes", "pods", "endpoints"],
                &["get", "list", "watch"],
            ),
            rule(
                &[""],
                &["nodes/metrics", "nodes/spec", "nodes/proxy"],
                &["get"],
            ),
        ],
        Component::ClusterAgent => vec![
            rule(
                &[""],
                &["pods", "nodes", "services", "endpoints"],
                &["get", "list", "watch"],
            ),
            rule(&[""], &["events"], &["create"]),
            rule(
                &["apps"],
                &["deployments", "daemonsets"],
                &["get", "list", "watch"],
            ),
        ],
        Component::ClusterChecksRunner => vec![
            rule(
                &[""],
                &["services", "endpoints", "pods"],
                &["get", "list", "watch"],
            ),
            rule(&[""], &["events"], &["create"]),
        ],
    }
}

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(|s| s.to_string()).collect()),
        resources: Some(resources.iter().map(|s| s.to_string()).collect()),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::intent_with_all_components;

    #[test]
    fn cluster_scoped_names_carry_the_namespace() {
        let intent = intent_with_all_components("monitoring");
        assert_eq!(
            cluster_scoped_name(&intent, Component::Agent).unwrap(),
            "default-monitoring-agent"
        );
    }

    #[test]
    fn service_account_fingerprint_covers_its_labels() {
        // Same workload name, different installations: the label set (the
        // part-of label in particular) differs, so the fingerprints must too.
        let mut alpha = intent_with_all_components("alpha");
        let mut beta = intent_with_all_components("beta");
        for intent in [&mut alpha, &mut beta] {
            if let Some(agent) = intent.spec.agent.as_mut() {
                agent.name = Some("shared-agent".to_string());
            }
        }
        let (_, fp_alpha) = service_account(&alpha, Component::Agent).unwrap();
        let (_, fp_beta) = service_account(&beta, Component::Agent).unwrap();
        assert_ne!(fp_alpha.hash, fp_beta.hash);
    }

    #[test]
    fn binding_targets_the_component_service_account() {
        let intent = intent_with_all_components("monitoring");
        let (binding, _) = cluster_role_binding(&intent, Component::ClusterAgent).unwrap();
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.kind, "ServiceAccount");
        assert_eq!(subject.name, "monitoring-cluster-agent");
        assert_eq!(subject.namespace.as_deref(), Some("default"));
        assert_eq!(binding.role_ref.name, "default-monitoring-cluster-agent");
    }

    #[test]
    fn leader_election_role_grants_lease_updates() {
        let intent = intent_with_all_components("monitoring");
        let (role, _) = leader_election_role(&intent).unwrap();
        let lease_rule = role
            .rules
            .unwrap()
            .into_iter()
            .find(|r| {
                r.resources
                    .as_ref()
                    .is_some_and(|res| res.contains(&"leases".to_string()))
            })
            .unwrap();
        assert!(lease_rule.verbs.contains(&"update".to_string()));
    }
}
