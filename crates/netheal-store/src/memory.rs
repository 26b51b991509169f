//! In-memory store implementation
//!
//! Backed by concurrent maps, with an insertion sequence used to break
//! `created_at` ties so scan ordering is deterministic.

use crate::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use netheal_common::{Action, Alert, Device, Error, Incident, Policy, Result, Topology};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    value: T,
}

/// DashMap-backed store, the default for tests and simulation
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: DashMap<String, Device>,
    alerts: DashMap<String, Stored<Alert>>,
    incidents: DashMap<String, Stored<Incident>>,
    actions: DashMap<String, Stored<Action>>,
    policies: DashMap<String, Policy>,
    topology: DashMap<(), Topology>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn sorted_alerts(&self) -> Vec<Stored<Alert>> {
        let mut all: Vec<Stored<Alert>> = self.alerts.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        all
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_device(&self, device: Device) -> Result<()> {
        self.devices.insert(device.hostname.clone(), device);
        Ok(())
    }

    async fn get_device(&self, hostname: &str) -> Result<Option<Device>> {
        Ok(self.devices.get(hostname).map(|d| d.clone()))
    }

    async fn get_device_by_ip(&self, mgmt_ip: &str) -> Result<Option<Device>> {
        Ok(self
            .devices
            .iter()
            .find(|d| d.mgmt_ip == mgmt_ip)
            .map(|d| d.clone()))
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        let mut devices: Vec<Device> = self.devices.iter().map(|d| d.clone()).collect();
        devices.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(devices)
    }

    async fn insert_alert(&self, alert: Alert) -> Result<()> {
        debug!(alert_id = %alert.alert_id, device = %alert.device, "storing alert");
        let seq = self.next_seq();
        self.alerts
            .insert(alert.alert_id.clone(), Stored { seq, value: alert });
        Ok(())
    }

    async fn update_alert(&self, alert: Alert) -> Result<()> {
        let mut entry = self
            .alerts
            .get_mut(&alert.alert_id)
            .ok_or_else(|| Error::NotFound(format!("alert {}", alert.alert_id)))?;
        entry.value = alert;
        Ok(())
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts.get(alert_id).map(|a| a.value.clone()))
    }

    async fn find_active_alert(
        &self,
        device: &str,
        alert_type: &str,
        since: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Option<Alert>> {
        let mut best: Option<Stored<Alert>> = None;
        for entry in self.alerts.iter() {
            let alert = &entry.value;
            if alert.device != device
                || alert.alert_type != alert_type
                || !alert.status.is_active()
                || alert.created_at < since
            {
                continue;
            }
            if exclude_id == Some(alert.alert_id.as_str()) {
                continue;
            }
            let newer = match &best {
                None => true,
                Some(b) => {
                    (alert.created_at, entry.seq) > (b.value.created_at, b.seq)
                }
            };
            if newer {
                best = Some(entry.value().clone());
            }
        }
        Ok(best.map(|s| s.value))
    }

    async fn alerts_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        Ok(self
            .sorted_alerts()
            .into_iter()
            .map(|s| s.value)
            .filter(|a| a.created_at >= start && a.created_at <= end)
            .collect())
    }

    async fn insert_incident(&self, incident: Incident) -> Result<()> {
        debug!(incident_id = %incident.incident_id, "storing incident");
        let seq = self.next_seq();
        self.incidents
            .insert(incident.incident_id.clone(), Stored { seq, value: incident });
        Ok(())
    }

    async fn update_incident(&self, incident: Incident) -> Result<()> {
        let mut entry = self
            .incidents
            .get_mut(&incident.incident_id)
            .ok_or_else(|| Error::NotFound(format!("incident {}", incident.incident_id)))?;
        entry.value = incident;
        Ok(())
    }

    async fn get_incident(&self, incident_id: &str) -> Result<Option<Incident>> {
        Ok(self.incidents.get(incident_id).map(|i| i.value.clone()))
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let mut all: Vec<Stored<Incident>> =
            self.incidents.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(all.into_iter().map(|s| s.value).collect())
    }

    async fn find_open_incident_for_device(
        &self,
        device: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        let mut best: Option<Stored<Incident>> = None;
        for entry in self.incidents.iter() {
            let incident = &entry.value;
            if !incident.state.is_open()
                || incident.created_at < since
                || !incident.affected_devices.iter().any(|d| d == device)
            {
                continue;
            }
            let newer = match &best {
                None => true,
                Some(b) => (incident.created_at, entry.seq) > (b.value.created_at, b.seq),
            };
            if newer {
                best = Some(entry.value().clone());
            }
        }
        Ok(best.map(|s| s.value))
    }

    async fn insert_action(&self, action: Action) -> Result<()> {
        debug!(action_id = %action.action_id, device = %action.target_device, "storing action");
        let seq = self.next_seq();
        self.actions
            .insert(action.action_id.clone(), Stored { seq, value: action });
        Ok(())
    }

    async fn update_action(&self, action: Action) -> Result<()> {
        let mut entry = self
            .actions
            .get_mut(&action.action_id)
            .ok_or_else(|| Error::NotFound(format!("action {}", action.action_id)))?;
        entry.value = action;
        Ok(())
    }

    async fn get_action(&self, action_id: &str) -> Result<Option<Action>> {
        Ok(self.actions.get(action_id).map(|a| a.value.clone()))
    }

    async fn list_actions_for_incident(&self, incident_id: &str) -> Result<Vec<Action>> {
        let mut matching: Vec<Stored<Action>> = self
            .actions
            .iter()
            .filter(|e| e.value.incident_id.as_deref() == Some(incident_id))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(matching.into_iter().map(|s| s.value).collect())
    }

    async fn upsert_policy(&self, policy: Policy) -> Result<()> {
        self.policies.insert(policy.policy_id.clone(), policy);
        Ok(())
    }

    async fn list_policies(&self) -> Result<Vec<Policy>> {
        let mut policies: Vec<Policy> = self.policies.iter().map(|p| p.clone()).collect();
        policies.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.policy_id.cmp(&b.policy_id)));
        Ok(policies)
    }

    async fn set_topology(&self, topology: Topology) -> Result<()> {
        self.topology.insert((), topology);
        Ok(())
    }

    async fn get_topology(&self) -> Result<Option<Topology>> {
        Ok(self.topology.get(&()).map(|t| t.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netheal_common::{AlertCategory, AlertStatus, Severity};
    use std::collections::HashMap;

    fn alert(id: &str, device: &str, alert_type: &str, status: AlertStatus) -> Alert {
        let now = Utc::now();
        Alert {
            alert_id: id.to_string(),
            device: device.to_string(),
            source_ip: "10.0.0.1".to_string(),
            alert_type: alert_type.to_string(),
            category: AlertCategory::Network,
            severity: Severity::Major,
            status,
            message: "test".to_string(),
            first_occurrence: now,
            last_occurrence: now,
            occurrence_count: 1,
            parent_alert: None,
            incident_id: None,
            correlation_key: None,
            details: HashMap::new(),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn find_active_alert_skips_excluded_and_inactive() {
        let store = MemoryStore::new();
        let since = Utc::now() - chrono::Duration::seconds(60);

        store
            .insert_alert(alert("ALT-1", "r1", "interface_down", AlertStatus::Resolved))
            .await
            .unwrap();
        store
            .insert_alert(alert("ALT-2", "r1", "interface_down", AlertStatus::Open))
            .await
            .unwrap();

        let found = store
            .find_active_alert("r1", "interface_down", since, None)
            .await
            .unwrap();
        assert_eq!(found.unwrap().alert_id, "ALT-2");

        let found = store
            .find_active_alert("r1", "interface_down", since, Some("ALT-2"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn update_of_missing_alert_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_alert(alert("ALT-9", "r1", "high_cpu", AlertStatus::Open))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[tokio::test]
    async fn policies_sorted_by_priority() {
        let store = MemoryStore::new();
        for (id, priority) in [("POL-b", 20), ("POL-a", 10)] {
            store
                .upsert_policy(Policy {
                    policy_id: id.to_string(),
                    name: id.to_string(),
                    triggers: Vec::new(),
                    excludes: Vec::new(),
                    time_conditions: Default::default(),
                    actions: Vec::new(),
                    rate_limit: Default::default(),
                    priority,
                    enabled: true,
                    status: netheal_common::PolicyStatus::Active,
                })
                .await
                .unwrap();
        }
        let policies = store.list_policies().await.unwrap();
        assert_eq!(policies[0].policy_id, "POL-a");
        assert_eq!(policies[1].policy_id, "POL-b");
    }
}
