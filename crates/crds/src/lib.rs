//! Sentinel Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Sentinel monitoring-agent
//! operator: the `SentinelAgent` intent object and the `CanaryDaemonSet`
//! canary-capable workload mechanism.

pub mod canary_daemon_set;
pub mod sentinel_agent;
pub mod status;

pub use canary_daemon_set::*;
pub use sentinel_agent::*;
pub use status::*;
