//! ConfigMap synthesis: per-component custom config and the install-info
//! record every installation carries.

use std::collections::BTreeMap;

use crds::SentinelAgent;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use crate::builders::{self, Component, object_meta};
use crate::error::ReconcileError;
use crate::fingerprint::Fingerprint;

/// Name of the custom-config ConfigMap for a workload.
pub fn custom_config_name(workload: &str) -> String {
    format!("{workload}-custom-config")
}

/// Name of the install-info ConfigMap for an intent.
pub fn install_info_name(intent: &SentinelAgent) -> String {
    format!("{}-install-info", intent.name_any())
}

/// Key the custom configuration is stored (and mounted) under.
pub const CUSTOM_CONFIG_KEY: &str = "sentinel.yaml";

/// Synthesizes the custom-config ConfigMap for one component, or `None`
/// when the sub-spec carries no custom configuration.
pub fn custom_config(
    intent: &SentinelAgent,
    component: Component,
) -> Result<Option<(ConfigMap, Fingerprint)>, ReconcileError> {
    let content = match component {
        Component::Agent => None,
        Component::ClusterAgent => intent
            .spec
            .cluster_agent
            .as_ref()
            .and_then(|s| s.custom_config.clone()),
        Component::ClusterChecksRunner => intent
            .spec
            .cluster_checks_runner
            .as_ref()
            .and_then(|s| s.custom_config.clone()),
    };
    let Some(content) = content else {
        return Ok(None);
    };

    let namespace = builders::intent_namespace(intent)?;
    let name = custom_config_name(&component.workload_name(intent));
    let data = BTreeMap::from([(CUSTOM_CONFIG_KEY.to_string(), content)]);
    let fingerprint = Fingerprint::of(&data, intent.metadata.generation)?;

    let mut config_map = ConfigMap {
        metadata: object_meta(intent, component, &name, Some(&namespace)),
        data: Some(data),
        ..Default::default()
    };
    fingerprint.stamp(&mut config_map.metadata);
    Ok(Some((config_map, fingerprint)))
}

/// Synthesizes the install-info ConfigMap recording which tool manages this
/// installation.
pub fn install_info(intent: &SentinelAgent) -> Result<(ConfigMap, Fingerprint), ReconcileError> {
    let namespace = builders::intent_namespace(intent)?;
    let name = install_info_name(intent);
    let data = BTreeMap::from([(
        "install_info".to_string(),
        format!(
            "---\ninstall_method:\n  tool: sentinel-operator\n  tool_version: {}\n",
            env!("CARGO_PKG_VERSION")
        ),
    )]);
    let fingerprint = Fingerprint::of(&data, intent.metadata.generation)?;

    let mut config_map = ConfigMap {
        metadata: object_meta(intent, Component::Agent, &name, Some(&namespace)),
        data: Some(data),
        ..Default::default()
    };
    fingerprint.stamp(&mut config_map.metadata);
    Ok((config_map, fingerprint))
}
