//! Cluster checks runner Deployment synthesis.
//!
//! The runner executes checks the cluster agent dispatches, so its pods are
//! pointed at the cluster agent by name.

use crds::{ClusterChecksRunnerSpec, SentinelAgent};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::builders::{
    self, Component, configmap, env, full_image, global_env, object_meta, selector_for,
    selector_labels,
};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

/// Synthesizes the cluster checks runner Deployment.
pub fn deployment(
    intent: &SentinelAgent,
    previous_selector: Option<&LabelSelector>,
) -> Result<(Deployment, Fingerprint), ReconcileError> {
    let runner = spec_of(intent)?;
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::ClusterChecksRunner.workload_name(intent);
    let labels = selector_labels(intent, Component::ClusterChecksRunner);

    let spec = DeploymentSpec {
        replicas: runner.replicas,
        selector: selector_for(previous_selector, &labels),
        template: pod_template(intent, runner, &name),
        ..Default::default()
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut workload = Deployment {
        metadata: object_meta(
            intent,
            Component::ClusterChecksRunner,
            &name,
            Some(&namespace),
        ),
        spec: Some(spec),
        ..Default::default()
    };
    fingerprint.stamp(&mut workload.metadata);
    Ok((workload, fingerprint))
}

fn spec_of(intent: &SentinelAgent) -> Result<&ClusterChecksRunnerSpec, ReconcileError> {
    intent.spec.cluster_checks_runner.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig(
            "checks runner component requested without a checks runner spec".to_string(),
        )
    })
}

fn pod_template(
    intent: &SentinelAgent,
    runner: &ClusterChecksRunnerSpec,
    name: &str,
) -> PodTemplateSpec {
    let mut vars = global_env(intent);
    vars.push(env(
        "SENTINEL_CLUSTER_AGENT_NAME",
        &Component::ClusterAgent.workload_name(intent),
    ));
    vars.push(env("SENTINEL_CLUSTER_CHECKS_ENABLED", "true"));

    let mut volumes: Vec<Volume> = Vec::new();
    let mut mounts: Vec<VolumeMount> = Vec::new();
    if runner.custom_config.is_some() {
        volumes.push(Volume {
            name: "custom-config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: configmap::custom_config_name(name),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "custom-config".to_string(),
            mount_path: "/etc/sentinel-agent".to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    PodTemplateSpec {
        metadata: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            labels: Some(builders::common_labels(
                intent,
                Component::ClusterChecksRunner,
            )),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(name.to_string()),
            containers: vec![Container {
                name: "checks-runner".to_string(),
                image: Some(full_image(intent.spec.registry.as_deref(), &runner.image)),
                env: Some(vars),
                volume_mounts: (!mounts.is_empty()).then_some(mounts),
                ..Default::default()
            }],
            volumes: (!volumes.is_empty()).then_some(volumes),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::intent_with_all_components;

    #[test]
    fn runner_points_at_the_cluster_agent() {
        let intent = intent_with_all_components("monitoring");
        let (deployment, _) = deployment(&intent, None).unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let vars = pod.containers[0].env.clone().unwrap();
        let target = vars
            .iter()
            .find(|e| e.name == "SENTINEL_CLUSTER_AGENT_NAME")
            .and_then(|e| e.value.clone());
        assert_eq!(target.as_deref(), Some("monitoring-cluster-agent"));
    }

    #[test]
    fn runner_name_is_deterministic() {
        let intent = intent_with_all_components("monitoring");
        let (deployment, _) = deployment(&intent, None).unwrap();
        assert_eq!(
            deployment.metadata.name.as_deref(),
            Some("monitoring-cluster-checks-runner")
        );
    }
}
