//! Merge policy for drifted resources.
//!
//! When a live object drifts, the synthesizer does not own the whole object:
//! only some fields may be overwritten. The policy is declarative per field
//! instead of ad hoc field-by-field copying, so nothing is silently dropped.
//!
//! Label/annotation merging is additive: desired keys win, previous-only
//! keys survive when they match the intent's keep-filter or carry the
//! operator's own domain. Keys dropped from the intent are never pruned.

use std::collections::BTreeMap;

/// Who owns a field on a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwnership {
    /// The synthesizer overwrites it on every update
    Synthesizer,
    /// The platform (or an external autoscaler) owns it; the live value wins
    Platform,
}

/// Per-kind merge policy.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    /// Ownership of the replica count
    pub replicas: FieldOwnership,
}

impl MergePolicy {
    /// Deployments: replicas may be driven by an external autoscaler, so the
    /// live value is preserved unless the intent pins one.
    pub fn deployment() -> Self {
        Self {
            replicas: FieldOwnership::Platform,
        }
    }

    /// DaemonSet-shaped workloads have no replica field to arbitrate.
    pub fn daemon_set() -> Self {
        Self {
            replicas: FieldOwnership::Synthesizer,
        }
    }

    /// Resolves the replica count to write on update.
    pub fn merged_replicas(&self, live: Option<i32>, desired: Option<i32>) -> Option<i32> {
        match self.replicas {
            FieldOwnership::Synthesizer => desired,
            FieldOwnership::Platform => desired.or(live),
        }
    }
}

/// Keys containing this domain always survive a merge.
const OPERATOR_DOMAIN: &str = "sentinelops.io";

/// Additive label/annotation merge.
///
/// Desired keys always win. Previous-only keys are kept when they match
/// `keep_filter` or contain the operator domain; everything else from the
/// previous map is dropped.
pub fn merge_metadata_maps(
    previous: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
    keep_filter: Option<&str>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = desired.cloned().unwrap_or_default();
    if let Some(previous) = previous {
        for (key, value) in previous {
            if merged.contains_key(key) {
                continue;
            }
            if key.contains(OPERATOR_DOMAIN) || matches_keep_filter(key, keep_filter) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Trailing-wildcard key filter: `foo.bar/*` keeps every key under that
/// prefix, a bare key keeps exactly itself.
fn matches_keep_filter(key: &str, filter: Option<&str>) -> bool {
    match filter {
        None | Some("") => false,
        Some(pattern) => match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        },
    }
}
