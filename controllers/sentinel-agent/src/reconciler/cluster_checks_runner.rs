//! Cluster checks runner component reconciliation.
//!
//! The runner only exists while the cluster agent exists with check
//! dispatching enabled; a runner without a dispatcher is meaningless, so
//! anything else drives the cleanup path.

use chrono::Utc;
use crds::{SentinelAgent, SentinelAgentStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use tracing::warn;

use crate::builders::{self, Component, configmap, network_policy, pdb, rbac};
use crate::cluster::ClusterOps;
use crate::error::ReconcileError;
use crate::events::{EventAction, EventInfo, EventSink};
use crate::merge::MergePolicy;
use crate::owner;
use crate::status::deployment_status;
use crate::steps::StepOutcome;

use super::{Reconciler, check_rename};

/// Whether the intent's component set calls for a checks runner at all.
pub(crate) fn needs_checks_runner(intent: &SentinelAgent) -> bool {
    intent.spec.cluster_checks_runner.is_some()
        && intent
            .spec
            .cluster_agent
            .as_ref()
            .is_some_and(|ca| ca.cluster_checks_enabled)
}

impl<C: ClusterOps, E: EventSink> Reconciler<C, E> {
    pub(crate) async fn reconcile_cluster_checks_runner(
        &self,
        intent: &SentinelAgent,
        status: &mut SentinelAgentStatus,
    ) -> Result<StepOutcome, ReconcileError> {
        let namespace = builders::intent_namespace(intent)?;
        if !needs_checks_runner(intent) {
            self.cleanup_deployment_component(
                intent,
                &namespace,
                Component::ClusterChecksRunner,
                status,
            )
            .await?;
            return Ok(StepOutcome::Continue);
        }

        let name = Component::ClusterChecksRunner.workload_name(intent);
        check_rename(
            "Deployment",
            status
                .cluster_checks_runner
                .as_ref()
                .map(|s| s.deployment_name.as_str()),
            &name,
        )?;

        self.ensure_checks_runner_dependencies(intent, &namespace, &name)
            .await?;
        // Leave the recorded status in place until a pass succeeds; an error
        // below must not lose the recorded workload name.
        let previous = status.cluster_checks_runner.clone();

        match self.cluster.get::<Deployment>(&namespace, &name).await? {
            None => {
                let (mut desired, _) = builders::checks_runner::deployment(intent, None)?;
                owner::set_owner(&mut desired.metadata, intent)?;
                self.cluster.create(&desired).await?;
                self.events
                    .record(EventInfo::new(
                        &name,
                        &namespace,
                        "Deployment",
                        EventAction::Create,
                    ))
                    .await;
                status.cluster_checks_runner = Some(deployment_status(
                    Some(&desired),
                    previous.as_ref(),
                    Some(Utc::now()),
                ));
            }
            Some(live) => {
                if !owner::is_owned_by(&live.metadata, intent) {
                    warn!("Deployment {namespace}/{name} exists but is not owned, skipping");
                    return Ok(StepOutcome::Continue);
                }
                let live_selector = live.spec.as_ref().map(|s| &s.selector);
                let (mut desired, fingerprint) =
                    builders::checks_runner::deployment(intent, live_selector)?;
                if fingerprint.is_current(live.metadata.annotations.as_ref()) {
                    status.cluster_checks_runner =
                        Some(deployment_status(Some(&live), previous.as_ref(), None));
                } else {
                    let live_replicas = live.spec.as_ref().and_then(|s| s.replicas);
                    if let Some(spec) = desired.spec.as_mut() {
                        spec.replicas =
                            MergePolicy::deployment().merged_replicas(live_replicas, spec.replicas);
                    }
                    self.merge_live_metadata(intent, &mut desired, &live.metadata);
                    owner::set_owner(&mut desired.metadata, intent)?;
                    self.cluster.update(&desired).await?;
                    self.events
                        .record(EventInfo::new(
                            &name,
                            &namespace,
                            "Deployment",
                            EventAction::Update,
                        ))
                        .await;
                    status.cluster_checks_runner = Some(deployment_status(
                        Some(&desired),
                        previous.as_ref(),
                        Some(Utc::now()),
                    ));
                }
            }
        }
        Ok(StepOutcome::Continue)
    }

    async fn ensure_checks_runner_dependencies(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let (account, fp) = rbac::service_account(intent, Component::ClusterChecksRunner)?;
        self.ensure_namespaced(intent, "ServiceAccount", account, &fp)
            .await?;

        let (role, fp) = rbac::cluster_role(intent, Component::ClusterChecksRunner)?;
        self.ensure_clustered(intent, "ClusterRole", role, &fp)
            .await?;
        let (binding, fp) = rbac::cluster_role_binding(intent, Component::ClusterChecksRunner)?;
        self.ensure_clustered(intent, "ClusterRoleBinding", binding, &fp)
            .await?;

        match configmap::custom_config(intent, Component::ClusterChecksRunner)? {
            Some((config_map, fp)) => {
                self.ensure_namespaced(intent, "ConfigMap", config_map, &fp)
                    .await?;
            }
            None => {
                self.delete_namespaced_if_owned::<ConfigMap>(
                    intent,
                    "ConfigMap",
                    namespace,
                    &configmap::custom_config_name(name),
                )
                .await?;
            }
        }

        let (budget, fp) = pdb::pod_disruption_budget(intent, Component::ClusterChecksRunner)?;
        self.ensure_namespaced(intent, "PodDisruptionBudget", budget, &fp)
            .await?;

        if network_policy::requested(intent, Component::ClusterChecksRunner) {
            let (policy, fp) =
                network_policy::network_policy(intent, Component::ClusterChecksRunner)?;
            self.ensure_namespaced(intent, "NetworkPolicy", policy, &fp)
                .await?;
        } else {
            self.delete_namespaced_if_owned::<NetworkPolicy>(
                intent,
                "NetworkPolicy",
                namespace,
                name,
            )
            .await?;
        }
        Ok(())
    }
}
