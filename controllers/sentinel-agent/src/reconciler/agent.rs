//! Node agent component reconciliation, including the workload-mechanism
//! migration protocol.
//!
//! The intent's `use_canary_daemon_set` flag selects exactly one of
//! {DaemonSet, CanaryDaemonSet}. When the flag flips, the retired mechanism
//! is deleted and the pass ends with a short requeue; the new mechanism is
//! only created on a later pass, so both never coexist.

use chrono::Utc;
use crds::{CanaryDaemonSet, SentinelAgent, SentinelAgentStatus};
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use tracing::{info, warn};

use crate::builders::{self, Component, configmap, network_policy, rbac};
use crate::cluster::ClusterOps;
use crate::error::ReconcileError;
use crate::events::{EventAction, EventInfo, EventSink};
use crate::owner;
use crate::status::{canary_daemon_set_status, daemon_set_status};
use crate::steps::StepOutcome;

use super::{MECHANISM_SWITCH_DELAY, Reconciler, check_rename};

impl<C: ClusterOps, E: EventSink> Reconciler<C, E> {
    pub(crate) async fn reconcile_agent(
        &self,
        intent: &SentinelAgent,
        status: &mut SentinelAgentStatus,
    ) -> Result<StepOutcome, ReconcileError> {
        let namespace = builders::intent_namespace(intent)?;
        let Some(agent_spec) = intent.spec.agent.as_ref() else {
            self.cleanup_agent(intent, &namespace, status).await?;
            return Ok(StepOutcome::Continue);
        };

        let name = Component::Agent.workload_name(intent);
        let kind = if agent_spec.use_canary_daemon_set {
            "CanaryDaemonSet"
        } else {
            "DaemonSet"
        };
        check_rename(
            kind,
            status.agent.as_ref().map(|s| s.daemonset_name.as_str()),
            &name,
        )?;

        self.ensure_agent_dependencies(intent, &namespace, &name)
            .await?;

        if agent_spec.use_canary_daemon_set {
            // Retire the plain mechanism before the canary-capable one may
            // exist. Create happens on a later pass.
            if let Some(live) = self.cluster.get::<DaemonSet>(&namespace, &name).await? {
                if owner::is_owned_by(&live.metadata, intent) {
                    info!("Mechanism switch: retiring DaemonSet {namespace}/{name}");
                    self.cluster.delete::<DaemonSet>(&namespace, &name).await?;
                    self.events
                        .record(EventInfo::new(
                            &name,
                            &namespace,
                            "DaemonSet",
                            EventAction::Delete,
                        ))
                        .await;
                    return Ok(StepOutcome::RequeueAfter(MECHANISM_SWITCH_DELAY));
                }
                warn!("DaemonSet {namespace}/{name} is not owned, leaving in place");
            }
            self.reconcile_canary_daemon_set(intent, &namespace, &name, status)
                .await?;
        } else {
            if let Some(live) = self
                .cluster
                .get::<CanaryDaemonSet>(&namespace, &name)
                .await?
            {
                if owner::is_owned_by(&live.metadata, intent) {
                    info!("Mechanism switch: retiring CanaryDaemonSet {namespace}/{name}");
                    self.cluster
                        .delete::<CanaryDaemonSet>(&namespace, &name)
                        .await?;
                    self.events
                        .record(EventInfo::new(
                            &name,
                            &namespace,
                            "CanaryDaemonSet",
                            EventAction::Delete,
                        ))
                        .await;
                    return Ok(StepOutcome::RequeueAfter(MECHANISM_SWITCH_DELAY));
                }
                warn!("CanaryDaemonSet {namespace}/{name} is not owned, leaving in place");
            }
            self.reconcile_daemon_set(intent, &namespace, &name, status)
                .await?;
        }
        Ok(StepOutcome::Continue)
    }

    async fn reconcile_daemon_set(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        name: &str,
        status: &mut SentinelAgentStatus,
    ) -> Result<(), ReconcileError> {
        // Leave the recorded status in place until a pass succeeds; an error
        // below must not lose the recorded workload name.
        let previous = status.agent.clone();
        match self.cluster.get::<DaemonSet>(namespace, name).await? {
            None => {
                let (mut desired, _) = builders::agent::daemon_set(intent, None)?;
                owner::set_owner(&mut desired.metadata, intent)?;
                self.cluster.create(&desired).await?;
                self.events
                    .record(EventInfo::new(
                        name,
                        namespace,
                        "DaemonSet",
                        EventAction::Create,
                    ))
                    .await;
                status.agent = Some(daemon_set_status(
                    &desired,
                    previous.as_ref(),
                    Some(Utc::now()),
                ));
            }
            Some(live) => {
                if !owner::is_owned_by(&live.metadata, intent) {
                    warn!("DaemonSet {namespace}/{name} exists but is not owned, skipping");
                    return Ok(());
                }
                let live_selector = live.spec.as_ref().map(|s| &s.selector);
                let (mut desired, fingerprint) =
                    builders::agent::daemon_set(intent, live_selector)?;
                if fingerprint.is_current(live.metadata.annotations.as_ref()) {
                    status.agent = Some(daemon_set_status(&live, previous.as_ref(), None));
                } else {
                    self.merge_live_metadata(intent, &mut desired, &live.metadata);
                    owner::set_owner(&mut desired.metadata, intent)?;
                    self.cluster.update(&desired).await?;
                    self.events
                        .record(EventInfo::new(
                            name,
                            namespace,
                            "DaemonSet",
                            EventAction::Update,
                        ))
                        .await;
                    status.agent = Some(daemon_set_status(
                        &desired,
                        previous.as_ref(),
                        Some(Utc::now()),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn reconcile_canary_daemon_set(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        name: &str,
        status: &mut SentinelAgentStatus,
    ) -> Result<(), ReconcileError> {
        let previous = status.agent.clone();
        match self
            .cluster
            .get::<CanaryDaemonSet>(namespace, name)
            .await?
        {
            None => {
                let (mut desired, _) = builders::agent::canary_daemon_set(intent, None)?;
                owner::set_owner(&mut desired.metadata, intent)?;
                self.cluster.create(&desired).await?;
                self.events
                    .record(EventInfo::new(
                        name,
                        namespace,
                        "CanaryDaemonSet",
                        EventAction::Create,
                    ))
                    .await;
                status.agent = Some(canary_daemon_set_status(
                    &desired,
                    previous.as_ref(),
                    Some(Utc::now()),
                ));
            }
            Some(live) => {
                if !owner::is_owned_by(&live.metadata, intent) {
                    warn!("CanaryDaemonSet {namespace}/{name} exists but is not owned, skipping");
                    return Ok(());
                }
                let live_selector = live.spec.selector.as_ref();
                let (mut desired, fingerprint) =
                    builders::agent::canary_daemon_set(intent, live_selector)?;
                if fingerprint.is_current(live.metadata.annotations.as_ref()) {
                    status.agent = Some(canary_daemon_set_status(&live, previous.as_ref(), None));
                } else {
                    self.merge_live_metadata(intent, &mut desired, &live.metadata);
                    owner::set_owner(&mut desired.metadata, intent)?;
                    self.cluster.update(&desired).await?;
                    self.events
                        .record(EventInfo::new(
                            name,
                            namespace,
                            "CanaryDaemonSet",
                            EventAction::Update,
                        ))
                        .await;
                    status.agent = Some(canary_daemon_set_status(
                        &desired,
                        previous.as_ref(),
                        Some(Utc::now()),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn ensure_agent_dependencies(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let (account, fp) = rbac::service_account(intent, Component::Agent)?;
        self.ensure_namespaced(intent, "ServiceAccount", account, &fp)
            .await?;

        let (role, fp) = rbac::cluster_role(intent, Component::Agent)?;
        self.ensure_clustered(intent, "ClusterRole", role, &fp)
            .await?;
        let (binding, fp) = rbac::cluster_role_binding(intent, Component::Agent)?;
        self.ensure_clustered(intent, "ClusterRoleBinding", binding, &fp)
            .await?;

        let (info, fp) = configmap::install_info(intent)?;
        self.ensure_namespaced(intent, "ConfigMap", info, &fp)
            .await?;

        if network_policy::requested(intent, Component::Agent) {
            let (policy, fp) = network_policy::network_policy(intent, Component::Agent)?;
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

    async fn cleanup_agent(
        &self,
        intent: &SentinelAgent,
        namespace: &str,
        status: &mut SentinelAgentStatus,
    ) -> Result<(), ReconcileError> {
        let name = status
            .agent
            .as_ref()
            .map(|s| s.daemonset_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| Component::Agent.workload_name(intent));

        self.delete_namespaced_if_owned::<DaemonSet>(intent, "DaemonSet", namespace, &name)
            .await?;
        self.delete_namespaced_if_owned::<CanaryDaemonSet>(
            intent,
            "CanaryDaemonSet",
            namespace,
            &name,
        )
        .await?;
        self.delete_namespaced_if_owned::<NetworkPolicy>(intent, "NetworkPolicy", namespace, &name)
            .await?;
        self.delete_namespaced_if_owned::<ConfigMap>(
            intent,
            "ConfigMap",
            namespace,
            &configmap::install_info_name(intent),
        )
        .await?;
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

        status.agent = None;
        Ok(())
    }
}
