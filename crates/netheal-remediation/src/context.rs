//! Condition context for policy evaluation
//!
//! Policy conditions reference dotted field paths over heterogeneous
//! entities. Rather than reflecting over live objects, a flat snapshot is
//! built from the incident, its primary alert and the target device, and
//! conditions are evaluated against that.

use netheal_common::{Alert, Device, Incident};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Flattened snapshot the policy conditions see
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    values: HashMap<String, Value>,
}

impl ConditionContext {
    /// Build the snapshot from the entities involved in one incident
    pub fn build(incident: &Incident, alert: Option<&Alert>, device: Option<&Device>) -> Self {
        let mut values = HashMap::new();

        values.insert("incident.id".into(), json!(incident.incident_id));
        values.insert("incident.severity".into(), json!(incident.severity));
        values.insert("incident.priority".into(), json!(incident.priority));
        values.insert("incident.state".into(), json!(incident.state));
        values.insert("incident.alert_count".into(), json!(incident.alerts.len()));
        values.insert(
            "incident.device_count".into(),
            json!(incident.affected_devices.len()),
        );
        values.insert(
            "incident.correlation_rule".into(),
            json!(incident.correlation_rule),
        );
        values.insert(
            "incident.root_cause".into(),
            json!(incident.final_root_cause),
        );
        values.insert(
            "incident.root_cause_confidence".into(),
            json!(incident.root_cause_confidence),
        );

        if let Some(alert) = alert {
            values.insert("alert.type".into(), json!(alert.alert_type));
            values.insert("alert.severity".into(), json!(alert.severity));
            values.insert("alert.category".into(), json!(alert.category));
            values.insert("alert.device".into(), json!(alert.device));
            values.insert("alert.message".into(), json!(alert.message));
            values.insert(
                "alert.occurrence_count".into(),
                json!(alert.occurrence_count),
            );
        }

        if let Some(device) = device {
            values.insert("device.hostname".into(), json!(device.hostname));
            values.insert("device.vendor".into(), json!(device.vendor));
            values.insert("device.model".into(), json!(device.model));
            values.insert("device.site".into(), json!(device.site));
            values.insert("device.device_type".into(), json!(device.device_type));
            values.insert("device.status".into(), json!(device.status));
            values.insert("device.criticality".into(), json!(device.criticality));
            values.insert(
                "device.automation_enabled".into(),
                json!(device.automation_enabled),
            );
        }

        ConditionContext { values }
    }

    /// Look up a dotted field path
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, Value)]) -> Self {
        ConditionContext {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}
