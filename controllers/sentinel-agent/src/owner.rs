//! Owner-reference authority.
//!
//! The intent's controller owner-reference is the sole authority for whether
//! this controller may mutate or delete a managed object. Objects without it
//! are foreign and left untouched even when their name matches.

use crds::SentinelAgent;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

use crate::error::ReconcileError;

/// Builds the controller owner-reference pointing back at the intent.
pub fn owner_reference(intent: &SentinelAgent) -> Result<OwnerReference, ReconcileError> {
    intent.controller_owner_ref(&()).ok_or_else(|| {
        ReconcileError::InvalidConfig("SentinelAgent has no name or uid yet".to_string())
    })
}

/// Sets the intent as the controlling owner of `meta`, replacing any
/// previous controller reference from the same intent.
pub fn set_owner(meta: &mut ObjectMeta, intent: &SentinelAgent) -> Result<(), ReconcileError> {
    let owner_ref = owner_reference(intent)?;
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    match refs.iter_mut().find(|r| r.uid == owner_ref.uid) {
        Some(existing) => *existing = owner_ref,
        None => refs.push(owner_ref),
    }
    Ok(())
}

/// True when the intent is the controlling owner of `meta`.
pub fn is_owned_by(meta: &ObjectMeta, intent: &SentinelAgent) -> bool {
    let Some(uid) = intent.metadata.uid.as_deref() else {
        return false;
    };
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.controller == Some(true) && r.uid == uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> SentinelAgent {
        let mut intent = SentinelAgent::new(
            "demo",
            crds::SentinelAgentSpec {
                cluster_name: "test".to_string(),
                site: None,
                registry: None,
                credentials_secret: "creds".to_string(),
                keep_labels: None,
                keep_annotations: None,
                agent: None,
                cluster_agent: None,
                cluster_checks_runner: None,
            },
        );
        intent.metadata.uid = Some("uid-1".to_string());
        intent
    }

    #[test]
    fn set_owner_then_is_owned_by() {
        let intent = intent();
        let mut meta = ObjectMeta::default();
        set_owner(&mut meta, &intent).unwrap();
        assert!(is_owned_by(&meta, &intent));
    }

    #[test]
    fn objects_without_the_reference_are_foreign() {
        let intent = intent();
        assert!(!is_owned_by(&ObjectMeta::default(), &intent));

        let mut other = intent.clone();
        other.metadata.uid = Some("uid-2".to_string());
        let mut meta = ObjectMeta::default();
        set_owner(&mut meta, &other).unwrap();
        assert!(!is_owned_by(&meta, &intent));
    }
}
