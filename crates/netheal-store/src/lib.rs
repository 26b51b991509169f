//! Abstract entity store for the NetHeal pipeline
//!
//! The pipeline treats persistence as an external collaborator: every stage
//! talks to a [`Store`] and never to a database directly. The default
//! implementation is the in-memory [`MemoryStore`], which is also what the
//! test suites run against.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netheal_common::{Action, Alert, Device, Incident, Policy, Result, Topology};

/// Persistence interface shared by every pipeline stage
///
/// Reads are safe to issue concurrently; writes follow a single-writer-per-
/// entity discipline enforced by component ownership (alerts are written by
/// telemetry and correlation, incidents by correlation/RCA/orchestrator,
/// actions only by remediation).
#[async_trait]
pub trait Store: Send + Sync {
    // Devices
    async fn upsert_device(&self, device: Device) -> Result<()>;
    async fn get_device(&self, hostname: &str) -> Result<Option<Device>>;
    async fn get_device_by_ip(&self, mgmt_ip: &str) -> Result<Option<Device>>;
    async fn list_devices(&self) -> Result<Vec<Device>>;

    // Alerts
    async fn insert_alert(&self, alert: Alert) -> Result<()>;
    async fn update_alert(&self, alert: Alert) -> Result<()>;
    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>>;
    /// Most recent open/acknowledged alert on `(device, alert_type)` created
    /// at or after `since`, excluding `exclude_id` when given
    async fn find_active_alert(
        &self,
        device: &str,
        alert_type: &str,
        since: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Option<Alert>>;
    /// All alerts created inside `[start, end]`, ordered by creation
    async fn alerts_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Alert>>;

    // Incidents
    async fn insert_incident(&self, incident: Incident) -> Result<()>;
    async fn update_incident(&self, incident: Incident) -> Result<()>;
    async fn get_incident(&self, incident_id: &str) -> Result<Option<Incident>>;
    async fn list_incidents(&self) -> Result<Vec<Incident>>;
    /// Most recent still-open incident touching `device`, created at or
    /// after `since`
    async fn find_open_incident_for_device(
        &self,
        device: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Incident>>;

    // Actions
    async fn insert_action(&self, action: Action) -> Result<()>;
    async fn update_action(&self, action: Action) -> Result<()>;
    async fn get_action(&self, action_id: &str) -> Result<Option<Action>>;
    async fn list_actions_for_incident(&self, incident_id: &str) -> Result<Vec<Action>>;

    // Policies
    async fn upsert_policy(&self, policy: Policy) -> Result<()>;
    async fn list_policies(&self) -> Result<Vec<Policy>>;

    // Topology
    async fn set_topology(&self, topology: Topology) -> Result<()>;
    async fn get_topology(&self) -> Result<Option<Topology>>;
}
