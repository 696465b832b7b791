//! Tagged step results for the reconciliation pipeline.
//!
//! Every dependency step and workload step returns
//! `Result<StepOutcome, ReconcileError>`. The first error or non-Continue
//! outcome short-circuits the remaining steps of the pass; requeue requests
//! propagate to the scheduler unmodified.

use std::time::Duration;

/// Outcome of one reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Proceed to the next step
    Continue,
    /// Stop the pass and requeue immediately
    Requeue,
    /// Stop the pass and requeue after the given delay
    RequeueAfter(Duration),
}

impl StepOutcome {
    /// True when the pipeline may run the next step.
    pub fn is_continue(&self) -> bool {
        matches!(self, StepOutcome::Continue)
    }
}

/// Short-circuits the enclosing function unless the step continued.
///
/// ```ignore
/// short_circuit!(self.ensure_rbac(intent).await?);
/// short_circuit!(self.ensure_config_map(intent).await?);
/// ```
#[macro_export]
macro_rules! short_circuit {
    ($step:expr) => {
        match $step {
            $crate::steps::StepOutcome::Continue => {}
            other => return Ok(other),
        }
    };
}
