//! Reconciliation pipeline.
//!
//! One pass drives every component of one intent, in a fixed order:
//! cluster agent, cluster checks runner, node agent. The runner depends on
//! the cluster agent's check dispatching, and the node agents enroll
//! against the cluster agent, so the control plane settles first.
//!
//! Each step returns a `StepOutcome`; the first non-Continue outcome or
//! error ends the pass. Whatever happened, the observed status (with an
//! `Active` and a `ReconcileError` condition) is written back before the
//! pass returns, and a clean pass re-queues after the steady-state period.

pub mod agent;
pub mod cluster_agent;
pub mod cluster_checks_runner;
pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crds::{AgentCondition, AgentConditionType, SentinelAgent, SentinelAgentStatus};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

use crate::builders;
use crate::cluster::ClusterOps;
use crate::error::ReconcileError;
use crate::events::EventSink;
use crate::short_circuit;
use crate::steps::StepOutcome;

/// Delay before re-reconciling after a workload-mechanism switch. The old
/// mechanism's pods must start terminating before the new one is created.
pub const MECHANISM_SWITCH_DELAY: Duration = Duration::from_secs(5);

/// Requeue delay for an immediate `StepOutcome::Requeue`.
const IMMEDIATE_REQUEUE: Duration = Duration::from_secs(1);

/// Drives all managed resources of one intent toward its spec.
pub struct Reconciler<C, E> {
    pub(crate) cluster: Arc<C>,
    pub(crate) events: Arc<E>,
    requeue_period: Duration,
}

impl<C: ClusterOps, E: EventSink> Reconciler<C, E> {
    /// Builds a reconciler over the given cluster boundary and event sink.
    pub fn new(cluster: Arc<C>, events: Arc<E>, requeue_period: Duration) -> Self {
        Self {
            cluster,
            events,
            requeue_period,
        }
    }

    /// Runs one full reconciliation pass and maps its outcome onto the
    /// scheduler action.
    pub async fn run(&self, intent: &SentinelAgent) -> Result<Action, ReconcileError> {
        let name = intent.name_any();
        let namespace = builders::intent_namespace(intent)?;
        debug!("Reconciling SentinelAgent {namespace}/{name}");

        let mut status = intent.status.clone().unwrap_or_default();
        let outcome = self.reconcile_components(intent, &mut status).await;
        self.update_status_if_needed(intent, &mut status, &outcome)
            .await;

        match outcome {
            Ok(StepOutcome::Continue) => {
                debug!("SentinelAgent {namespace}/{name} settled");
                Ok(Action::requeue(self.requeue_period))
            }
            Ok(StepOutcome::Requeue) => Ok(Action::requeue(IMMEDIATE_REQUEUE)),
            Ok(StepOutcome::RequeueAfter(delay)) => {
                info!(
                    "SentinelAgent {namespace}/{name} requeued for {}s",
                    delay.as_secs()
                );
                Ok(Action::requeue(delay))
            }
            Err(e) => Err(e),
        }
    }

    async fn reconcile_components(
        &self,
        intent: &SentinelAgent,
        status: &mut SentinelAgentStatus,
    ) -> Result<StepOutcome, ReconcileError> {
        short_circuit!(self.reconcile_cluster_agent(intent, status).await?);
        short_circuit!(self.reconcile_cluster_checks_runner(intent, status).await?);
        short_circuit!(self.reconcile_agent(intent, status).await?);
        Ok(StepOutcome::Continue)
    }

    /// Writes the observed status back onto the intent when it changed.
    /// A status write failure never masks the pass outcome.
    async fn update_status_if_needed(
        &self,
        intent: &SentinelAgent,
        status: &mut SentinelAgentStatus,
        outcome: &Result<StepOutcome, ReconcileError>,
    ) {
        let now = Utc::now();
        match outcome {
            Ok(_) => {
                upsert_condition(status, AgentConditionType::Active, true, String::new(), now);
                upsert_condition(
                    status,
                    AgentConditionType::ReconcileError,
                    false,
                    String::new(),
                    now,
                );
            }
            Err(e) => {
                upsert_condition(status, AgentConditionType::Active, false, String::new(), now);
                upsert_condition(
                    status,
                    AgentConditionType::ReconcileError,
                    true,
                    e.to_string(),
                    now,
                );
            }
        }

        if intent.status.as_ref() == Some(status) {
            return;
        }
        let name = intent.name_any();
        let Ok(namespace) = builders::intent_namespace(intent) else {
            return;
        };
        if let Err(e) = self
            .cluster
            .patch_intent_status(&namespace, &name, status)
            .await
        {
            warn!("Failed to update status of SentinelAgent {namespace}/{name}: {e}");
        }
    }
}

/// Rejects renaming a workload once its name is recorded in status. The
/// pass fails without mutating anything.
pub(crate) fn check_rename(
    kind: &'static str,
    current: Option<&str>,
    requested: &str,
) -> Result<(), ReconcileError> {
    match current {
        Some(current) if !current.is_empty() && current != requested => {
            Err(ReconcileError::RenameForbidden {
                kind,
                current: current.to_string(),
                requested: requested.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Updates (or inserts) one condition in place. Timestamps only move when
/// the condition actually changes, so a settled intent patches nothing.
fn upsert_condition(
    status: &mut SentinelAgentStatus,
    condition_type: AgentConditionType,
    active: bool,
    message: String,
    now: DateTime<Utc>,
) {
    let value = if active { "True" } else { "False" };
    match status
        .conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        Some(condition) => {
            if condition.status != value {
                condition.last_transition_time = Some(now);
            }
            if condition.status != value || condition.message != message {
                condition.status = value.to_string();
                condition.message = message;
                condition.last_update_time = Some(now);
            }
        }
        None => status.conditions.push(AgentCondition {
            condition_type,
            status: value.to_string(),
            last_update_time: Some(now),
            last_transition_time: Some(now),
            message,
        }),
    }
}
