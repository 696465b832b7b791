//! Controller-specific error types.
//!
//! NotFound is deliberately not a variant: a missing object drives the
//! create branch and is handled structurally (`Option`) at the cluster
//! boundary.

use thiserror::Error;

/// Errors that can occur in the Sentinel Agent Controller.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Kubernetes API error (transient, propagated for backoff-and-retry)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A managed workload cannot be renamed once created. Terminal until the
    /// intent is corrected; nothing is mutated.
    #[error("{kind} {current} cannot be renamed to {requested} once created")]
    RenameForbidden {
        /// Workload kind
        kind: &'static str,
        /// Name recorded in status
        current: String,
        /// Name the intent now asks for
        requested: String,
    },

    /// Desired-state synthesis failed (terminal until the intent is edited)
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Invalid intent configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ReconcileError {
    /// True for errors the external queue should not retry until the intent
    /// is edited.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileError::RenameForbidden { .. }
                | ReconcileError::Synthesis(_)
                | ReconcileError::InvalidConfig(_)
        )
    }
}
