//! Create/update/delete audit events.
//!
//! Every mutation of a managed resource is reported through an `EventSink`.
//! Emission is fire-and-forget: a failing sink is logged and never aborts a
//! reconciliation pass.

use k8s_openapi::api::core::v1::ObjectReference;
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// What happened to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Resource created
    Create,
    /// Resource updated
    Update,
    /// Resource deleted
    Delete,
}

impl EventAction {
    fn reason(self) -> &'static str {
        match self {
            EventAction::Create => "Created",
            EventAction::Update => "Updated",
            EventAction::Delete => "Deleted",
        }
    }
}

/// One audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Resource kind
    pub kind: &'static str,
    /// What happened
    pub action: EventAction,
}

impl EventInfo {
    /// Builds the event record for one mutation.
    pub fn new(name: &str, namespace: &str, kind: &'static str, action: EventAction) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind,
            action,
        }
    }
}

/// Side-channel consumer of audit events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Records one event. Must never fail the caller.
    async fn record(&self, event: EventInfo);
}

/// Publishes events through the Kubernetes events API.
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    /// Creates a sink reporting as the controller.
    pub fn new(client: kube::Client) -> Self {
        let reporter = Reporter {
            controller: "sentinel-agent-controller".into(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEventSink {
    async fn record(&self, event: EventInfo) {
        let reference = ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some(event.kind.to_string()),
            name: Some(event.name.clone()),
            namespace: Some(event.namespace.clone()),
            ..Default::default()
        };
        let result = self
            .recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: event.action.reason().to_string(),
                    note: Some(format!("{} {}/{}", event.kind, event.namespace, event.name)),
                    action: event.action.reason().to_string(),
                    secondary: None,
                },
                &reference,
            )
            .await;
        if let Err(e) = result {
            warn!(
                "Failed to record {} event for {} {}/{}: {}",
                event.action.reason(),
                event.kind,
                event.namespace,
                event.name,
                e
            );
        }
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<EventInfo>>,
}

impl MemoryEventSink {
    /// Snapshot of everything recorded so far.
    pub fn recorded(&self) -> Vec<EventInfo> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EventSink for MemoryEventSink {
    async fn record(&self, event: EventInfo) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
