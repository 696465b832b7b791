//! Test helpers: intent factories shared across the unit tests.

use crds::{
    AgentSpec, ClusterAgentSpec, ClusterChecksRunnerSpec, SentinelAgent, SentinelAgentSpec,
};

/// An intent requesting every component, ready to own objects.
pub fn intent_with_all_components(name: &str) -> SentinelAgent {
    let mut intent = SentinelAgent::new(
        name,
        SentinelAgentSpec {
            cluster_name: "test-cluster".to_string(),
            site: None,
            registry: None,
            credentials_secret: "sentinel-credentials".to_string(),
            keep_labels: None,
            keep_annotations: None,
            agent: Some(AgentSpec {
                name: None,
                image: "sentinel/agent:7.50".to_string(),
                log_level: None,
                use_canary_daemon_set: false,
                rollout: None,
                log_collection: false,
                process_collection: false,
                network_policy: None,
            }),
            cluster_agent: Some(ClusterAgentSpec {
                name: None,
                image: "sentinel/cluster-agent:7.50".to_string(),
                replicas: Some(1),
                cluster_checks_enabled: true,
                custom_config: None,
                network_policy: None,
            }),
            cluster_checks_runner: Some(ClusterChecksRunnerSpec {
                name: None,
                image: "sentinel/agent:7.50".to_string(),
                replicas: Some(2),
                custom_config: None,
                network_policy: None,
            }),
        },
    );
    intent.metadata.namespace = Some("default".to_string());
    intent.metadata.uid = Some("intent-uid-1".to_string());
    intent.metadata.generation = Some(1);
    intent
}

/// An intent requesting only the node agent.
pub fn agent_only_intent(name: &str) -> SentinelAgent {
    let mut intent = intent_with_all_components(name);
    intent.spec.cluster_agent = None;
    intent.spec.cluster_checks_runner = None;
    intent
}
