//! Entity model for the NetHeal pipeline
//!
//! These are the semantic shapes shared by every stage. Persistence layout
//! is the store's concern; cross-references between entities are stored as
//! ids one way (alert -> incident, action -> incident) and resolved through
//! the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Device hostname, unique across the inventory
pub type DeviceId = String;

/// Operational state of a managed device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Up,
    Down,
    Unreachable,
}

/// Business criticality of a device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Critical,
    High,
    Medium,
    Low,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Critical => "critical",
            Criticality::High => "high",
            Criticality::Medium => "medium",
            Criticality::Low => "low",
        }
    }
}

/// Window during which disruptive changes are allowed on a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// Lowercase weekday names, e.g. "saturday"
    pub days: Vec<String>,
    /// Local start hour, inclusive
    pub start_hour: u32,
    /// Local end hour, exclusive
    pub end_hour: u32,
}

impl MaintenanceWindow {
    /// Check whether the given instant falls inside the window
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let day = now.format("%A").to_string().to_lowercase();
        if !self.days.iter().any(|d| d.eq_ignore_ascii_case(&day)) {
            return false;
        }
        let hour = chrono::Timelike::hour(&now);
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Window wraps past midnight
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// A managed network device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub hostname: DeviceId,
    pub mgmt_ip: String,
    pub vendor: String,
    pub model: String,
    pub os_version: String,
    pub device_type: String,
    pub site: String,
    pub status: DeviceState,
    pub criticality: Criticality,
    pub automation_enabled: bool,
    pub netconf_enabled: bool,
    pub ssh_enabled: bool,
    pub snmp_enabled: bool,
    pub maintenance_window: Option<MaintenanceWindow>,
}

/// Normalized alert severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Warning,
    Info,
}

impl Severity {
    /// Numeric rank, higher is more severe
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::Major => 4,
            Severity::Minor => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// The more severe of two severities
    pub fn max(self, other: Severity) -> Severity {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Alert category buckets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Network,
    System,
    Security,
    Performance,
}

/// Lifecycle status of an alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    InProgress,
    Resolved,
    Suppressed,
}

impl AlertStatus {
    /// Open-ish states participate in dedup and correlation
    pub fn is_active(&self) -> bool {
        matches!(self, AlertStatus::Open | AlertStatus::Acknowledged)
    }
}

/// A single observable condition from one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    /// Device hostname, or the source IP when the device is unknown
    pub device: DeviceId,
    pub source_ip: String,
    pub alert_type: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub status: AlertStatus,
    pub message: String,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub occurrence_count: u32,
    /// Set on suppressed duplicates, pointing at the surviving alert
    pub parent_alert: Option<String>,
    pub incident_id: Option<String>,
    pub correlation_key: Option<String>,
    /// Enrichment attached by the collector (vendor, site, ...)
    pub details: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Record another occurrence of the same condition
    pub fn coalesce(&mut self, at: DateTime<Utc>) {
        self.occurrence_count += 1;
        self.last_occurrence = at;
    }
}

/// Incident priority, p1 is most urgent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
}

/// Lifecycle state of an incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentState {
    Open,
    Investigating,
    InProgress,
    Resolved,
    Closed,
    Escalated,
}

impl IncidentState {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            IncidentState::Open | IncidentState::Investigating | IncidentState::InProgress
        )
    }
}

/// One entry in an RCA timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// A ranked root-cause hypothesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcaResult {
    pub rca_id: String,
    /// Which analyzer produced the hypothesis
    pub analyzer: String,
    pub suspected_cause: String,
    pub confidence: f64,
    pub contributing_factors: Vec<String>,
    pub evidence: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

/// Timestamped free-form annotation on an incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentNote {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// SLA milestones for an incident
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaTimestamps {
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A correlated group of alerts with a shared probable cause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,
    pub title: String,
    /// Member alert ids, insertion ordered
    pub alerts: Vec<String>,
    pub primary_alert: String,
    pub affected_devices: Vec<DeviceId>,
    pub affected_services: Vec<String>,
    pub severity: Severity,
    pub priority: Priority,
    pub state: IncidentState,
    pub correlation_rule: Option<String>,
    pub correlation_confidence: f64,
    pub first_alert_time: DateTime<Utc>,
    pub rca_results: Vec<RcaResult>,
    pub final_root_cause: Option<String>,
    pub root_cause_confidence: f64,
    pub sla: SlaTimestamps,
    pub notes: Vec<IncidentNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Append a member alert; a no-op when already present
    pub fn add_alert(&mut self, alert_id: &str) -> bool {
        if self.alerts.iter().any(|a| a == alert_id) {
            return false;
        }
        self.alerts.push(alert_id.to_string());
        true
    }

    /// Track an affected device, keeping the list deduplicated
    pub fn add_device(&mut self, device: &str) {
        if !self.affected_devices.iter().any(|d| d == device) {
            self.affected_devices.push(device.to_string());
        }
    }

    /// Track an affected service, keeping the list deduplicated
    pub fn add_service(&mut self, service: &str) {
        if !self.affected_services.iter().any(|s| s == service) {
            self.affected_services.push(service.to_string());
        }
    }

    /// Append to the audit note log
    pub fn add_note(&mut self, text: impl Into<String>) {
        self.notes.push(IncidentNote {
            timestamp: Utc::now(),
            text: text.into(),
        });
    }
}

/// Comparison operator for a policy condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// A single field/operator/value predicate over the condition context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCondition {
    /// Dotted path into the condition context, e.g. `alert.type`
    pub field: String,
    pub operator: ConditionOp,
    pub value: serde_json::Value,
}

/// Hour range gate for policy time conditions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

/// When a policy is allowed to fire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeConditions {
    #[serde(default)]
    pub business_hours_only: bool,
    pub allowed_days: Option<Vec<String>>,
    pub allowed_hours: Option<HourRange>,
}

/// Risk classification of a remediation template
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn is_disruptive(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// One templated action a policy may take
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAction {
    /// Action template name, e.g. `enable_interface`
    pub template: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub risk_level: RiskLevel,
    pub requires_approval: bool,
}

/// Executions-per-window budget for a policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_executions: u32,
    pub window_seconds: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            max_executions: 10,
            window_seconds: 3600,
        }
    }
}

/// Administrative status of a policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    Inactive,
    Draft,
}

/// A remediation policy: triggers, excludes, gates and templated actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: String,
    pub name: String,
    pub triggers: Vec<PolicyCondition>,
    #[serde(default)]
    pub excludes: Vec<PolicyCondition>,
    #[serde(default)]
    pub time_conditions: TimeConditions,
    pub actions: Vec<PolicyAction>,
    #[serde(default)]
    pub rate_limit: RateLimit,
    /// Lower value wins
    pub priority: u32,
    pub enabled: bool,
    pub status: PolicyStatus,
}

/// Transport used to execute a step against a device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionMethod {
    Netconf,
    Cli,
    RestApi,
    Snmp,
}

impl ActionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMethod::Netconf => "netconf",
            ActionMethod::Cli => "cli",
            ActionMethod::RestApi => "rest_api",
            ActionMethod::Snmp => "snmp",
        }
    }
}

/// Lifecycle status of an action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Draft,
    PendingApproval,
    Approved,
    Queued,
    Executing,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
    RollbackFailed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Completed
                | ActionStatus::Failed
                | ActionStatus::Cancelled
                | ActionStatus::RolledBack
                | ActionStatus::RollbackFailed
        )
    }
}

/// What a step is for within the sequence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    PreCheck,
    Command,
    Verification,
}

/// Execution status of a single step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Skipped,
}

/// One numbered step in an action plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    pub sequence: u32,
    pub kind: StepKind,
    pub description: String,
    pub command: String,
    pub critical: bool,
    pub timeout_seconds: u64,
    pub expected_result: Option<String>,
    pub status: StepStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActionStep {
    pub fn new(
        sequence: u32,
        kind: StepKind,
        description: impl Into<String>,
        command: impl Into<String>,
        critical: bool,
        timeout_seconds: u64,
    ) -> Self {
        ActionStep {
            sequence,
            kind,
            description: description.into(),
            command: command.into(),
            critical,
            timeout_seconds,
            expected_result: None,
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Rollback instructions attached to an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub automatic: bool,
    pub commands: Vec<String>,
    pub executed: bool,
    pub success: Option<bool>,
}

/// Append-only record of something that happened during execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A sequenced remediation plan targeting one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_id: String,
    pub incident_id: Option<String>,
    pub target_device: DeviceId,
    /// Template name, e.g. `restart_bgp_session`
    pub action_type: String,
    pub method: ActionMethod,
    pub risk_level: RiskLevel,
    pub requires_approval: bool,
    pub parameters: HashMap<String, serde_json::Value>,
    pub steps: Vec<ActionStep>,
    pub rollback_plan: Option<RollbackPlan>,
    pub status: ActionStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub verification_passed: Option<bool>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub estimated_duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Append to the execution log
    pub fn log(&mut self, message: impl Into<String>) {
        self.execution_log.push(ExecutionLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }
}

/// Status of a topology link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
}

/// Undirected physical or logical link between two devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyLink {
    pub source_device: DeviceId,
    pub source_interface: String,
    pub dest_device: DeviceId,
    pub dest_interface: String,
    pub status: LinkState,
}

/// A service and the devices it depends on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDependency {
    pub name: String,
    pub dependent_devices: Vec<DeviceId>,
    pub critical_devices: Vec<DeviceId>,
    pub sla_target: Option<f64>,
}

/// Read-only network topology used for neighbor and dependency lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub topology_id: String,
    pub links: Vec<TopologyLink>,
    pub services: Vec<ServiceDependency>,
    /// Site name -> member devices
    pub sites: HashMap<String, Vec<DeviceId>>,
}

impl Topology {
    /// Devices directly linked to the given device
    pub fn neighbors(&self, device: &str) -> Vec<DeviceId> {
        let mut out = Vec::new();
        for link in &self.links {
            if link.source_device == device && !out.contains(&link.dest_device) {
                out.push(link.dest_device.clone());
            } else if link.dest_device == device && !out.contains(&link.source_device) {
                out.push(link.source_device.clone());
            }
        }
        out
    }

    /// Devices sharing a site with the given device, excluding it
    pub fn co_site_devices(&self, device: &str) -> Vec<DeviceId> {
        for members in self.sites.values() {
            if members.iter().any(|m| m == device) {
                return members.iter().filter(|m| *m != device).cloned().collect();
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_max_prefers_higher_rank() {
        assert_eq!(Severity::Major.max(Severity::Critical), Severity::Critical);
        assert_eq!(Severity::Critical.max(Severity::Info), Severity::Critical);
        assert_eq!(Severity::Warning.max(Severity::Warning), Severity::Warning);
    }

    #[test]
    fn incident_add_alert_is_idempotent() {
        let mut incident = Incident {
            incident_id: "INC-20260801-0001".into(),
            title: "test".into(),
            alerts: vec!["ALT-1".into()],
            primary_alert: "ALT-1".into(),
            affected_devices: vec!["r1".into()],
            affected_services: Vec::new(),
            severity: Severity::Major,
            priority: Priority::P2,
            state: IncidentState::Open,
            correlation_rule: None,
            correlation_confidence: 0.0,
            first_alert_time: Utc::now(),
            rca_results: Vec::new(),
            final_root_cause: None,
            root_cause_confidence: 0.0,
            sla: SlaTimestamps::default(),
            notes: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!incident.add_alert("ALT-1"));
        assert!(incident.add_alert("ALT-2"));
        assert!(!incident.add_alert("ALT-2"));
        assert_eq!(incident.alerts.len(), 2);
    }

    #[test]
    fn maintenance_window_wraps_midnight() {
        let window = MaintenanceWindow {
            days: vec![
                "monday".into(),
                "tuesday".into(),
                "wednesday".into(),
                "thursday".into(),
                "friday".into(),
                "saturday".into(),
                "sunday".into(),
            ],
            start_hour: 22,
            end_hour: 4,
        };
        let late = Utc::now()
            .date_naive()
            .and_hms_opt(23, 30, 0)
            .unwrap()
            .and_utc();
        let noon = Utc::now()
            .date_naive()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        assert!(window.contains(late));
        assert!(!window.contains(noon));
    }
}
