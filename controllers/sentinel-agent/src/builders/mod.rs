//! Desired-state synthesis.
//!
//! Pure builders: intent in, `(object, Fingerprint)` out. No I/O. Every
//! builder stamps the fingerprint annotations onto the object it returns;
//! owner references are applied by the reconciler before a write.
//!
//! Selector handling: the first creation derives the pod selector from the
//! generated labels; on updates the caller passes the live selector and it
//! is preserved verbatim, since selectors are immutable server-side.

pub mod agent;
pub mod checks_runner;
pub mod cluster_agent;
pub mod configmap;
pub mod network_policy;
pub mod pdb;
pub mod rbac;

use std::collections::BTreeMap;

use crds::SentinelAgent;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use crate::error::ReconcileError;

/// Value of the `app.kubernetes.io/managed-by` label on every managed object.
pub const MANAGED_BY: &str = "sentinel-operator";

/// The three workload components an intent may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Agent,
    ClusterAgent,
    ClusterChecksRunner,
}

impl Component {
    /// Suffix appended to the intent name for the default workload name.
    pub fn suffix(&self) -> &'static str {
        match self {
            Component::Agent => "agent",
            Component::ClusterAgent => "cluster-agent",
            Component::ClusterChecksRunner => "cluster-checks-runner",
        }
    }

    /// Explicit name override from the sub-spec, when present.
    pub fn name_override<'a>(&self, intent: &'a SentinelAgent) -> Option<&'a str> {
        match self {
            Component::Agent => intent.spec.agent.as_ref().and_then(|s| s.name.as_deref()),
            Component::ClusterAgent => intent
                .spec
                .cluster_agent
                .as_ref()
                .and_then(|s| s.name.as_deref()),
            Component::ClusterChecksRunner => intent
                .spec
                .cluster_checks_runner
                .as_ref()
                .and_then(|s| s.name.as_deref()),
        }
    }

    /// Resolved workload name: the override, else `<intent>-<suffix>`.
    pub fn workload_name(&self, intent: &SentinelAgent) -> String {
        match self.name_override(intent) {
            Some(name) => name.to_string(),
            None => format!("{}-{}", intent.name_any(), self.suffix()),
        }
    }
}

/// Namespace of the intent. An intent without one cannot be reconciled.
pub fn intent_namespace(intent: &SentinelAgent) -> Result<String, ReconcileError> {
    intent.namespace().ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "intent {} has no namespace",
            intent.name_any()
        ))
    })
}

/// Labels identifying a pod of one component. Used as the selector basis,
/// so this set must stay stable across releases.
pub(crate) fn selector_labels(
    intent: &SentinelAgent,
    component: Component,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            format!("sentinel-{}", component.suffix()),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            component.workload_name(intent),
        ),
    ])
}

/// Full label set for a managed object.
pub(crate) fn common_labels(
    intent: &SentinelAgent,
    component: Component,
) -> BTreeMap<String, String> {
    let mut labels = selector_labels(intent, component);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels.insert(
        "app.kubernetes.io/part-of".to_string(),
        intent.name_any(),
    );
    labels
}

/// The live selector when there is one, else a selector over the generated
/// pod labels.
pub(crate) fn selector_for(
    previous: Option<&LabelSelector>,
    labels: &BTreeMap<String, String>,
) -> LabelSelector {
    match previous {
        Some(selector) => selector.clone(),
        None => LabelSelector {
            match_labels: Some(labels.clone()),
            ..Default::default()
        },
    }
}

/// Metadata shared by every managed object.
pub(crate) fn object_meta(
    intent: &SentinelAgent,
    component: Component,
    name: &str,
    namespace: Option<&str>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: Some(common_labels(intent, component)),
        ..Default::default()
    }
}

/// Registry prefix applied to a component image.
pub(crate) fn full_image(registry: Option<&str>, image: &str) -> String {
    match registry {
        Some(registry) if !registry.is_empty() => format!("{registry}/{image}"),
        _ => image.to_string(),
    }
}

pub(crate) fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub(crate) fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Environment shared by every component container.
pub(crate) fn global_env(intent: &SentinelAgent) -> Vec<EnvVar> {
    let mut vars = vec![
        env("SENTINEL_CLUSTER_NAME", &intent.spec.cluster_name),
        secret_env("SENTINEL_API_KEY", &intent.spec.credentials_secret, "api-key"),
    ];
    if let Some(site) = intent.spec.site.as_deref() {
        vars.push(env("SENTINEL_SITE", site));
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::intent_with_all_components;

    #[test]
    fn default_workload_names_derive_from_the_intent() {
        let intent = intent_with_all_components("monitoring");
        assert_eq!(
            Component::Agent.workload_name(&intent),
            "monitoring-agent"
        );
        assert_eq!(
            Component::ClusterChecksRunner.workload_name(&intent),
            "monitoring-cluster-checks-runner"
        );
    }

    #[test]
    fn name_override_wins() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(agent) = intent.spec.agent.as_mut() {
            agent.name = Some("node-watch".to_string());
        }
        assert_eq!(Component::Agent.workload_name(&intent), "node-watch");
    }

    #[test]
    fn generated_selector_covers_the_selector_labels() {
        let intent = intent_with_all_components("monitoring");
        let labels = selector_labels(&intent, Component::Agent);
        let selector = selector_for(None, &labels);
        assert_eq!(selector.match_labels.as_ref(), Some(&labels));
    }

    #[test]
    fn previous_selector_is_preserved_verbatim() {
        let intent = intent_with_all_components("monitoring");
        let labels = selector_labels(&intent, Component::Agent);
        let previous = LabelSelector {
            match_labels: Some(BTreeMap::from([("legacy".to_string(), "x".to_string())])),
            ..Default::default()
        };
        let selector = selector_for(Some(&previous), &labels);
        assert_eq!(selector, previous);
    }

    #[test]
    fn registry_prefixes_the_image() {
        assert_eq!(
            full_image(Some("registry.example.com"), "sentinel/agent:7"),
            "registry.example.com/sentinel/agent:7"
        );
        assert_eq!(full_image(None, "sentinel/agent:7"), "sentinel/agent:7");
    }
}
