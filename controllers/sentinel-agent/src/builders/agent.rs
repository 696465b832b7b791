//! Node agent workload synthesis: plain DaemonSet or CanaryDaemonSet.
//!
//! Both mechanisms share one pod template; the canary-capable variant adds
//! the rollout pacing fields from the intent's `rollout` block.

use crds::{AgentSpec, CanaryDaemonSet, CanaryRolloutStrategy, SentinelAgent};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy, RollingUpdateDaemonSet,
};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, HostPathVolumeSource, PodSpec, PodTemplateSpec, Toleration, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::builders::{
    self, Component, env, full_image, global_env, object_meta, selector_for, selector_labels,
};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

/// Synthesizes the agent DaemonSet.
pub fn daemon_set(
    intent: &SentinelAgent,
    previous_selector: Option<&LabelSelector>,
) -> Result<(DaemonSet, Fingerprint), ReconcileError> {
    let agent = agent_spec(intent)?;
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::Agent.workload_name(intent);
    let labels = selector_labels(intent, Component::Agent);

    let spec = DaemonSetSpec {
        selector: selector_for(previous_selector, &labels),
        template: pod_template(intent, agent, &name),
        update_strategy: Some(update_strategy(agent)),
        ..Default::default()
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut workload = DaemonSet {
        metadata: object_meta(intent, Component::Agent, &name, Some(&namespace)),
        spec: Some(spec),
        ..Default::default()
    };
    fingerprint.stamp(&mut workload.metadata);
    Ok((workload, fingerprint))
}

/// Synthesizes the agent CanaryDaemonSet, the canary-capable mechanism.
pub fn canary_daemon_set(
    intent: &SentinelAgent,
    previous_selector: Option<&LabelSelector>,
) -> Result<(CanaryDaemonSet, Fingerprint), ReconcileError> {
    let agent = agent_spec(intent)?;
    let namespace = builders::intent_namespace(intent)?;
    let name = Component::Agent.workload_name(intent);
    let labels = selector_labels(intent, Component::Agent);

    let spec = crds::CanaryDaemonSetSpec {
        selector: Some(selector_for(previous_selector, &labels)),
        template: pod_template(intent, agent, &name),
        strategy: rollout_strategy(agent),
    };
    let fingerprint = Fingerprint::of(&spec, intent.metadata.generation)?;

    let mut workload = CanaryDaemonSet::new(&name, spec);
    workload.metadata = object_meta(intent, Component::Agent, &name, Some(&namespace));
    fingerprint.stamp(&mut workload.metadata);
    Ok((workload, fingerprint))
}

fn agent_spec(intent: &SentinelAgent) -> Result<&AgentSpec, ReconcileError> {
    intent.spec.agent.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig("agent component requested without an agent spec".to_string())
    })
}

fn pod_template(intent: &SentinelAgent, agent: &AgentSpec, name: &str) -> PodTemplateSpec {
    let mut vars = global_env(intent);
    if let Some(level) = agent.log_level.as_deref() {
        vars.push(env("SENTINEL_LOG_LEVEL", level));
    }

    let mut volumes: Vec<Volume> = Vec::new();
    let mut mounts: Vec<VolumeMount> = Vec::new();
    if agent.log_collection {
        vars.push(env("SENTINEL_LOGS_ENABLED", "true"));
        volumes.push(host_path_volume("pod-logs", "/var/log/pods"));
        mounts.push(read_only_mount("pod-logs", "/var/log/pods"));
    }
    if agent.process_collection {
        vars.push(env("SENTINEL_PROCESS_COLLECTION_ENABLED", "true"));
        volumes.push(host_path_volume("passwd", "/etc/passwd"));
        mounts.push(read_only_mount("passwd", "/etc/passwd"));
    }

    PodTemplateSpec {
        metadata: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            labels: Some(builders::common_labels(intent, Component::Agent)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(name.to_string()),
            containers: vec![agent_container(intent, agent, vars, mounts)],
            volumes: (!volumes.is_empty()).then_some(volumes),
            // The agent runs on every node, control plane included.
            tolerations: Some(vec![Toleration {
                operator: Some("Exists".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

fn agent_container(
    intent: &SentinelAgent,
    agent: &AgentSpec,
    vars: Vec<EnvVar>,
    mounts: Vec<VolumeMount>,
) -> Container {
    Container {
        name: "agent".to_string(),
        image: Some(full_image(intent.spec.registry.as_deref(), &agent.image)),
        env: Some(vars),
        volume_mounts: (!mounts.is_empty()).then_some(mounts),
        ..Default::default()
    }
}

fn update_strategy(agent: &AgentSpec) -> DaemonSetUpdateStrategy {
    let max_unavailable = agent
        .rollout
        .as_ref()
        .and_then(|r| r.max_unavailable.as_deref())
        .map(parse_int_or_percent);
    DaemonSetUpdateStrategy {
        type_: Some("RollingUpdate".to_string()),
        rolling_update: Some(RollingUpdateDaemonSet {
            max_unavailable,
            ..Default::default()
        }),
    }
}

fn rollout_strategy(agent: &AgentSpec) -> CanaryRolloutStrategy {
    match agent.rollout.as_ref() {
        Some(rollout) => CanaryRolloutStrategy {
            max_unavailable: rollout.max_unavailable.clone(),
            max_parallel_pod_creation: rollout.max_parallel_pod_creation,
            slow_start_interval_seconds: rollout.slow_start_interval_seconds,
            canary: rollout.canary.clone(),
        },
        None => CanaryRolloutStrategy::default(),
    }
}

fn parse_int_or_percent(value: &str) -> IntOrString {
    match value.parse::<i32>() {
        Ok(n) => IntOrString::Int(n),
        Err(_) => IntOrString::String(value.to_string()),
    }
}

fn host_path_volume(name: &str, path: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: None,
        }),
        ..Default::default()
    }
}

fn read_only_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::SPEC_HASH_ANNOTATION;
    use crate::test_utils::intent_with_all_components;

    #[test]
    fn daemon_set_is_stamped_and_named() {
        let intent = intent_with_all_components("monitoring");
        let (ds, fp) = daemon_set(&intent, None).unwrap();
        assert_eq!(ds.metadata.name.as_deref(), Some("monitoring-agent"));
        assert_eq!(ds.metadata.namespace.as_deref(), Some("default"));
        let annotations = ds.metadata.annotations.unwrap();
        assert_eq!(annotations.get(SPEC_HASH_ANNOTATION), Some(&fp.hash));
    }

    #[test]
    fn identical_intents_fingerprint_identically() {
        let intent = intent_with_all_components("monitoring");
        let (_, a) = daemon_set(&intent, None).unwrap();
        let (_, b) = daemon_set(&intent, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn image_change_changes_the_fingerprint() {
        let intent = intent_with_all_components("monitoring");
        let mut other = intent.clone();
        if let Some(agent) = other.spec.agent.as_mut() {
            agent.image = "sentinel/agent:next".to_string();
        }
        let (_, a) = daemon_set(&intent, None).unwrap();
        let (_, b) = daemon_set(&other, None).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn log_collection_adds_the_pod_log_mount() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(agent) = intent.spec.agent.as_mut() {
            agent.log_collection = true;
        }
        let (ds, _) = daemon_set(&intent, None).unwrap();
        let spec = ds.spec.unwrap();
        let pod = spec.template.spec.unwrap();
        let names: Vec<_> = pod
            .volumes
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert!(names.contains(&"pod-logs".to_string()));
    }

    #[test]
    fn canary_variant_carries_the_rollout_strategy() {
        let mut intent = intent_with_all_components("monitoring");
        if let Some(agent) = intent.spec.agent.as_mut() {
            agent.use_canary_daemon_set = true;
            agent.rollout = Some(crds::RolloutSpec {
                max_unavailable: Some("10%".to_string()),
                max_parallel_pod_creation: Some(5),
                slow_start_interval_seconds: None,
                canary: Some(crds::CanarySpec {
                    replicas: 2,
                    duration_seconds: 600,
                }),
            });
        }
        let (cds, _) = canary_daemon_set(&intent, None).unwrap();
        assert_eq!(cds.spec.strategy.max_unavailable.as_deref(), Some("10%"));
        assert_eq!(cds.spec.strategy.canary.as_ref().map(|c| c.replicas), Some(2));
    }

    #[test]
    fn previous_selector_survives_resynthesis() {
        let intent = intent_with_all_components("monitoring");
        let previous = LabelSelector {
            match_labels: Some(
                [("legacy".to_string(), "selector".to_string())].into(),
            ),
            ..Default::default()
        };
        let (ds, _) = daemon_set(&intent, Some(&previous)).unwrap();
        assert_eq!(ds.spec.unwrap().selector, previous);
    }
}
