//! Generic drift handling for the auxiliary resources every component
//! carries (RBAC, config maps, network policies, disruption budgets).
//!
//! Per resource: absent means create (owner-ref, already stamped by the
//! builder); present and fingerprint-current means leave alone; drifted
//! means rewrite the synthesizer-owned fields onto the live object with an
//! additive label/annotation merge. A live object the intent does not own
//! is foreign: it is skipped with a warning and never mutated or deleted.

use crds::SentinelAgent;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::cluster::{ClusterOps, StoredObject};
use crate::error::ReconcileError;
use crate::events::{EventAction, EventInfo, EventSink};
use crate::fingerprint::Fingerprint;
use crate::merge::merge_metadata_maps;
use crate::owner;

use super::Reconciler;

impl<C: ClusterOps, E: EventSink> Reconciler<C, E> {
    /// Drives one namespaced auxiliary resource to its desired shape.
    pub(crate) async fn ensure_namespaced<K>(
        &self,
        intent: &SentinelAgent,
        kind: &'static str,
        mut desired: K,
        fingerprint: &Fingerprint,
    ) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let name = desired.name_any();
        let namespace = desired.namespace().unwrap_or_default();
        match self.cluster.get::<K>(&namespace, &name).await? {
            None => {
                owner::set_owner(desired.meta_mut(), intent)?;
                self.cluster.create(&desired).await?;
                info!("Created {kind} {namespace}/{name}");
                self.events
                    .record(EventInfo::new(&name, &namespace, kind, EventAction::Create))
                    .await;
            }
            Some(live) => {
                if !owner::is_owned_by(live.meta(), intent) {
                    warn!("{kind} {namespace}/{name} exists but is not owned, skipping");
                    return Ok(());
                }
                if fingerprint.is_current(live.meta().annotations.as_ref()) {
                    debug!("{kind} {namespace}/{name} is up to date");
                    return Ok(());
                }
                self.merge_live_metadata(intent, &mut desired, live.meta());
                owner::set_owner(desired.meta_mut(), intent)?;
                self.cluster.update(&desired).await?;
                info!("Updated {kind} {namespace}/{name}");
                self.events
                    .record(EventInfo::new(&name, &namespace, kind, EventAction::Update))
                    .await;
            }
        }
        Ok(())
    }

    /// Drives one cluster-scoped auxiliary resource to its desired shape.
    pub(crate) async fn ensure_clustered<K>(
        &self,
        intent: &SentinelAgent,
        kind: &'static str,
        mut desired: K,
        fingerprint: &Fingerprint,
    ) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let name = desired.name_any();
        match self.cluster.get_clustered::<K>(&name).await? {
            None => {
                owner::set_owner(desired.meta_mut(), intent)?;
                self.cluster.create_clustered(&desired).await?;
                info!("Created {kind} {name}");
                self.events
                    .record(EventInfo::new(&name, "", kind, EventAction::Create))
                    .await;
            }
            Some(live) => {
                if !owner::is_owned_by(live.meta(), intent) {
                    warn!("{kind} {name} exists but is not owned, skipping");
                    return Ok(());
                }
                if fingerprint.is_current(live.meta().annotations.as_ref()) {
                    return Ok(());
                }
                self.merge_live_metadata(intent, &mut desired, live.meta());
                owner::set_owner(desired.meta_mut(), intent)?;
                self.cluster.update_clustered(&desired).await?;
                info!("Updated {kind} {name}");
                self.events
                    .record(EventInfo::new(&name, "", kind, EventAction::Update))
                    .await;
            }
        }
        Ok(())
    }

    /// Deletes a namespaced resource iff the intent owns it. Returns whether
    /// a delete was issued.
    pub(crate) async fn delete_namespaced_if_owned<K>(
        &self,
        intent: &SentinelAgent,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let Some(live) = self.cluster.get::<K>(namespace, name).await? else {
            return Ok(false);
        };
        if !owner::is_owned_by(live.meta(), intent) {
            warn!("{kind} {namespace}/{name} is not owned, leaving in place");
            return Ok(false);
        }
        self.cluster.delete::<K>(namespace, name).await?;
        info!("Deleted {kind} {namespace}/{name}");
        self.events
            .record(EventInfo::new(name, namespace, kind, EventAction::Delete))
            .await;
        Ok(true)
    }

    /// Deletes a cluster-scoped resource iff the intent owns it.
    pub(crate) async fn delete_clustered_if_owned<K>(
        &self,
        intent: &SentinelAgent,
        kind: &'static str,
        name: &str,
    ) -> Result<bool, ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let Some(live) = self.cluster.get_clustered::<K>(name).await? else {
            return Ok(false);
        };
        if !owner::is_owned_by(live.meta(), intent) {
            warn!("{kind} {name} is not owned, leaving in place");
            return Ok(false);
        }
        self.cluster.delete_clustered::<K>(name).await?;
        info!("Deleted {kind} {name}");
        self.events
            .record(EventInfo::new(name, "", kind, EventAction::Delete))
            .await;
        Ok(true)
    }

    /// Folds the live object's metadata into the desired one: additive
    /// label/annotation merge per the intent's keep-filters, plus the
    /// resource version the replace call needs.
    pub(crate) fn merge_live_metadata<K: Resource>(
        &self,
        intent: &SentinelAgent,
        desired: &mut K,
        live: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    ) {
        let meta = desired.meta_mut();
        meta.labels = Some(merge_metadata_maps(
            live.labels.as_ref(),
            meta.labels.as_ref(),
            intent.spec.keep_labels.as_deref(),
        ));
        meta.annotations = Some(merge_metadata_maps(
            live.annotations.as_ref(),
            meta.annotations.as_ref(),
            intent.spec.keep_annotations.as_deref(),
        ));
        meta.resource_version = live.resource_version.clone();
    }
}
