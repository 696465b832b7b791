//! Cluster agent Deployment synthesis.

use crds::{ClusterAgentSpec, SentinelAgent};
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

/// Synthesizes the cluster agent Deployment.
pub fn deployment(
    intent: &SentinelAgent,
    previous_selector: Option<&LabelSelector>,
) -> Result<(Deployment, Fingerprint), ReconcileError> {
    let cluster_agent = spec_of(intent)?;
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::ClusterAgent.workload_name(intent);
    let labels = selector_labels(intent, Component::ClusterAgent);

    let spec = DeploymentSpec {
        replicas: cluster_agent.replicas,
        selector: selector_for(previous_selector, &labels),
        template: pod_template(intent, cluster_agent, &name),
        ..Default::default()
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut workload = Deployment {
        metadata: object_meta(intent, Component::ClusterAgent, &name, Some(&namespace)),
        spec: Some(spec),
        ..Default::default()
    };
    fingerprint.stamp(&mut workload.metadata);
    Ok((workload, fingerprint))
}

fn spec_of(intent: &SentinelAgent) -> Result<&ClusterAgentSpec, ReconcileError> {
    intent.spec.cluster_agent.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig(
            "cluster agent component requested without a cluster agent spec".to_string(),
        )
    })
}

fn pod_template(
    intent: &SentinelAgent,
    cluster_agent: &ClusterAgentSpec,
    name: &str,
) -> PodTemplateSpec {
    let mut vars = global_env(intent);
    if cluster_agent.cluster_checks_enabled {
        vars.push(env("SENTINEL_CLUSTER_CHECKS_ENABLED", "true"));
    }

    let mut volumes: Vec<Volume> = Vec::new();
    let mut mounts: Vec<VolumeMount> = Vec::new();
    if cluster_agent.custom_config.is_some() {
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
            labels: Some(builders::common_labels(intent, Component::ClusterAgent)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(name.to_string()),
            containers: vec![Container {
                name: "cluster-agent".to_string(),
                image: Some(full_image(
                    intent.spec.registry.as_deref(),
                    &cluster_agent.image,
                )),
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
    fn replicas_follow_the_intent() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(ca) = intent.spec.cluster_agent.as_mut() {
            ca.replicas = Some(2);
        }
        let (deployment, _) = deployment(&intent, None).unwrap();
        assert_eq!(deployment.spec.unwrap().replicas, Some(2));
    }

    #[test]
    fn custom_config_mounts_the_component_config_map() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(ca) = intent.spec.cluster_agent.as_mut() {
            ca.custom_config = Some("log_level: debug".to_string());
        }
        let (deployment, _) = deployment(&intent, None).unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(
            volume.config_map.as_ref().unwrap().name,
            "monitoring-cluster-agent-custom-config"
        );
    }

    #[test]
    fn checks_flag_lands_in_the_environment() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(ca) = intent.spec.cluster_agent.as_mut() {
            ca.cluster_checks_enabled = true;
        }
        let (deployment, _) = deployment(&intent, None).unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let names: Vec<_> = pod.containers[0]
            .env
            .clone()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert!(names.contains(&"SENTINEL_CLUSTER_CHECKS_ENABLED".to_string()));
    }
}
