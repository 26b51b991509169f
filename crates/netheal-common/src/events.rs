//! Typed events wiring the pipeline stages together
//!
//! Every stage publishes onto one broadcast bus and filters the events it
//! consumes. The orchestrator subscribes to everything to drive the healing
//! pipeline state machine.

use crate::types::{ActionStatus, Severity};
use tokio::sync::broadcast;

/// Event emitted by a pipeline stage
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A new alert was persisted by the telemetry collector
    AlertCreated {
        alert_id: String,
        device: String,
        alert_type: String,
        severity: Severity,
    },
    /// An incoming alert was suppressed as a duplicate
    AlertSuppressed {
        alert_id: String,
        parent_alert: String,
    },
    /// The correlation engine opened a new incident
    IncidentCreated {
        incident_id: String,
        primary_alert: String,
    },
    /// An existing incident gained alerts or changed shape
    IncidentUpdated { incident_id: String },
    /// Root-cause analysis finished for an incident
    AnalysisCompleted {
        incident_id: String,
        root_cause: Option<String>,
        confidence: f64,
    },
    /// The remediation engine instantiated an action
    ActionGenerated {
        action_id: String,
        incident_id: String,
        device: String,
    },
    /// An action was queued for execution
    ActionQueued { action_id: String, incident_id: String },
    /// An action is waiting for operator approval
    ApprovalRequired { action_id: String, incident_id: String },
    /// An action reached a terminal state
    ActionCompleted {
        action_id: String,
        incident_id: String,
        status: ActionStatus,
        success: bool,
    },
}

/// Broadcast bus carrying [`PipelineEvent`]s between stages
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    /// Publish an event; lagging or absent receivers are not an error
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(PipelineEvent::IncidentUpdated {
            incident_id: "INC-20260801-0001".into(),
        });
        match rx.recv().await.unwrap() {
            PipelineEvent::IncidentUpdated { incident_id } => {
                assert_eq!(incident_id, "INC-20260801-0001");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.publish(PipelineEvent::IncidentUpdated {
            incident_id: "INC-20260801-0002".into(),
        });
    }
}
