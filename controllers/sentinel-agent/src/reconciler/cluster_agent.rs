//! Cluster agent component reconciliation.

use chrono::Utc;
use crds::{SentinelAgent, SentinelAgentStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
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

impl<C: ClusterOps, E: EventSink> Reconciler<C, E> {
    pub(crate) async fn reconcile_cluster_agent(
        &self,
        intent: &SentinelAgent,
        status: &mut SentinelAgentStatus,
    ) -> Result<StepOutcome, ReconcileError> {
        let namespace = builders::intent_namespace(intent)?;
        if intent.spec.cluster_agent.is_none() {
            self.cleanup_deployment_component(intent, &namespace, Component::ClusterAgent, status)
                .await?;
            return Ok(StepOutcome::Continue);
        }

        let name = Component::ClusterAgent.workload_name(intent);
        check_rename(
            "Deployment",
            status.cluster_agent.as_ref().map(|s| s.deployment_name.as_str()),
            &name,
        )?;

        self.ensure_cluster_agent_dependencies(intent, &namespace, &name)
            .await?;
        // Leave the recorded status in place until a pass succeeds; an error
        // below must not lose the recorded workload name.
        let previous = status.cluster_agent.clone();

        match self.cluster.get::<Deployment>(&namespace, &name).await? {
            None => {
                let (mut desired, _) = builders::cluster_agent::deployment(intent, None)?;
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
                status.cluster_agent = Some(deployment_status(
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
                    builders::cluster_agent::deployment(intent, live_selector)?;
                if fingerprint.is_current(live.metadata.annotations.as_ref()) {
                    status.cluster_agent =
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
                    status.cluster_agent = Some(deployment_status(
                        Some(&desired),
                        previous.as_ref(),
                        Some(Utc::now()),
                    ));
                }
            }
        }
        Ok(StepOutcome::Continue)
    }

    async fn ensure_cluster_agent_dependencies(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let (account, fp) = rbac::service_account(intent, Component::ClusterAgent)?;
        self.ensure_namespaced(intent, "ServiceAccount", account, &fp)
            .await?;

        let (role, fp) = rbac::cluster_role(intent, Component::ClusterAgent)?;
        self.ensure_clustered(intent, "ClusterRole", role, &fp)
            .await?;
        let (binding, fp) = rbac::cluster_role_binding(intent, Component::ClusterAgent)?;
        self.ensure_clustered(intent, "ClusterRoleBinding", binding, &fp)
            .await?;

        let (role, fp) = rbac::leader_election_role(intent)?;
        self.ensure_namespaced(intent, "Role", role, &fp).await?;
        let (binding, fp) = rbac::leader_election_role_binding(intent)?;
        self.ensure_namespaced(intent, "RoleBinding", binding, &fp)
            .await?;

        match configmap::custom_config(intent, Component::ClusterAgent)? {
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

        let (budget, fp) = pdb::pod_disruption_budget(intent, Component::ClusterAgent)?;
        self.ensure_namespaced(intent, "PodDisruptionBudget", budget, &fp)
            .await?;

        if network_policy::requested(intent, Component::ClusterAgent) {
            let (policy, fp) = network_policy::network_policy(intent, Component::ClusterAgent)?;
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

    /// Removes everything a disabled Deployment-shaped component left
    /// behind, owner-gated, and clears its status record.
    pub(crate) async fn cleanup_deployment_component(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        component: Component,
        status: &mut SentinelAgentStatus,
    ) -> Result<(), ReconcileError> {
        let recorded = match component {
            Component::ClusterAgent => status
                .cluster_agent
                .as_ref()
                .map(|s| s.deployment_name.clone()),
            Component::ClusterChecksRunner => status
                .cluster_checks_runner
                .as_ref()
                .map(|s| s.deployment_name.clone()),
            Component::Agent => None,
        };
        let name = recorded
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| component.workload_name(intent));

        self.delete_namespaced_if_owned::<Deployment>(intent, "Deployment", namespace, &name)
            .await?;
        self.delete_namespaced_if_owned::<PodDisruptionBudget>(
            intent,
            "PodDisruptionBudget",
            namespace,
            &format!("{name}-pdb"),
        )
        .await?;
        self.delete_namespaced_if_owned::<NetworkPolicy>(intent, "NetworkPolicy", namespace, &name)
            .await?;
        self.delete_namespaced_if_owned::<ConfigMap>(
            intent,
            "ConfigMap",
            namespace,
            &configmap::custom_config_name(&name),
        )
        .await?;
        if component == Component::ClusterAgent {
            self.delete_namespaced_if_owned::<Role>(intent, "Role", namespace, &name)
                .await?;
            self.delete_namespaced_if_owned::<RoleBinding>(intent, "RoleBinding", namespace, &name)
                .await?;
        }
        self.delete_namespaced_if_owned::<ServiceAccount>(
            intent,
            "ServiceAccount",
            namespace,
            &name,
        )
        .await?;
        let clustered = format!("{namespace}-{name}");
        self.delete_clustered_if_owned::<ClusterRoleBinding>(
            intent,
            "ClusterRoleBinding",
            &clustered,
        )
        .await?;
        self.delete_clustered_if_owned::<ClusterRole>(intent, "ClusterRole", &clustered)
            .await?;

        match component {
            Component::ClusterAgent => status.cluster_agent = None,
            Component::ClusterChecksRunner => status.cluster_checks_runner = None,
            Component::Agent => {}
        }
        Ok(())
    }
}
