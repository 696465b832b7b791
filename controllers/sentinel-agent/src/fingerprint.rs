//! Spec fingerprinting.
//!
//! Every managed resource carries a fingerprint of the semantically relevant
//! intent fields it was synthesized from, stored as annotations on the
//! resource itself. Drift detection is then a single annotation comparison
//! instead of a structural diff.
//!
//! The fingerprint is a typed `(hash, generation)` pair rather than a bare
//! string so "current vs stale" is a total function: a missing or
//! unparseable annotation is simply stale.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ReconcileError;

/// Annotation carrying the hex SHA-256 of the synthesized relevant fields.
pub const SPEC_HASH_ANNOTATION: &str = "agent.sentinelops.io/spec-hash";

/// Annotation carrying the intent generation the hash was computed from.
pub const GENERATION_ANNOTATION: &str = "agent.sentinelops.io/intent-generation";

/// Deterministic content hash of a resource's semantically relevant fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hex SHA-256 of the canonicalized relevant fields
    pub hash: String,
    /// Intent generation the hash was computed from, when known
    pub generation: Option<i64>,
}

impl Fingerprint {
    /// Computes the fingerprint of `relevant`.
    ///
    /// The value is serialized through `serde_json::Value`, whose object
    /// representation sorts keys, so the hash is canonical and independent
    /// of field ordering. Serialization failure is fatal for the step.
    pub fn of<T: Serialize>(relevant: &T, generation: Option<i64>) -> Result<Self, ReconcileError> {
        let canonical = serde_json::to_value(relevant)
            .and_then(|v| serde_json::to_vec(&v))
            .map_err(|e| ReconcileError::Synthesis(format!("fingerprint serialization: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(Self {
            hash: hex::encode(hasher.finalize()),
            generation,
        })
    }

    /// Reads the fingerprint previously stamped onto `annotations`.
    pub fn from_annotations(annotations: Option<&BTreeMap<String, String>>) -> Option<Self> {
        let annotations = annotations?;
        let hash = annotations.get(SPEC_HASH_ANNOTATION)?.clone();
        let generation = annotations
            .get(GENERATION_ANNOTATION)
            .and_then(|g| g.parse::<i64>().ok());
        Some(Self { hash, generation })
    }

    /// True when the stamped fingerprint matches this one.
    ///
    /// A missing annotation is "not current". The generation is advisory: a
    /// different generation with an identical hash is still current, since
    /// the relevant fields did not change.
    pub fn is_current(&self, annotations: Option<&BTreeMap<String, String>>) -> bool {
        match Self::from_annotations(annotations) {
            Some(stamped) => stamped.hash == self.hash,
            None => false,
        }
    }

    /// Writes the fingerprint annotations onto `meta` in place.
    pub fn stamp(&self, meta: &mut ObjectMeta) {
        let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
        annotations.insert(SPEC_HASH_ANNOTATION.to_string(), self.hash.clone());
        if let Some(generation) = self.generation {
            annotations.insert(GENERATION_ANNOTATION.to_string(), generation.to_string());
        }
    }
}

/// Convenience: the stamped hash of a live object, for status reporting.
pub fn current_hash(annotations: Option<&BTreeMap<String, String>>) -> Option<String> {
    Fingerprint::from_annotations(annotations).map(|fp| fp.hash)
}
