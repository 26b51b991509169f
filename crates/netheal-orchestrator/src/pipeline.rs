//! Per-incident healing pipeline state machine
//!
//! The orchestrator owns one entry per incident from detection through
//! resolution or failure. Entries carry a deadline; pipelines past it are
//! forcibly failed. Finished entries stay visible for a short audit window
//! before eviction.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use netheal_common::{HealingStats, OrchestratorConfig};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Stage of one incident's healing pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Correlation,
    Rca,
    RcaCompleted,
    Remediation,
    ActionGenerated,
    ActionQueued,
    ApprovalRequired,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }
}

/// One recorded pipeline transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEventRecord {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Pipeline state for one incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub incident_id: String,
    pub stage: PipelineStage,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub current_action: Option<String>,
    pub events: Vec<PipelineEventRecord>,
    pub completed_at: Option<DateTime<Utc>>,
    pub healing_time_ms: Option<f64>,
    pub failure_reason: Option<String>,
}

impl PipelineEntry {
    fn record(&mut self, description: impl Into<String>) {
        self.events.push(PipelineEventRecord {
            timestamp: Utc::now(),
            description: description.into(),
        });
    }
}

/// Snapshot of the orchestrator state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub stage_counts: HashMap<PipelineStage, usize>,
    pub stats: HealingStats,
}

/// Orchestrator-owned map of healing pipelines
pub struct HealingPipeline {
    config: OrchestratorConfig,
    entries: Mutex<HashMap<String, PipelineEntry>>,
    stats: RwLock<HealingStats>,
}

impl HealingPipeline {
    pub fn new(config: OrchestratorConfig) -> Self {
        HealingPipeline {
            config,
            entries: Mutex::new(HashMap::new()),
            stats: RwLock::new(HealingStats::default()),
        }
    }

    /// Start tracking an incident, beginning at the correlation stage
    pub fn track(&self, incident_id: &str) {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        if entries.contains_key(incident_id) {
            return;
        }
        let mut entry = PipelineEntry {
            incident_id: incident_id.to_string(),
            stage: PipelineStage::Correlation,
            started_at: now,
            deadline: now + ChronoDuration::seconds(self.config.incident_timeout_seconds),
            current_action: None,
            events: Vec::new(),
            completed_at: None,
            healing_time_ms: None,
            failure_reason: None,
        };
        entry.record("pipeline opened at correlation");
        entries.insert(incident_id.to_string(), entry);
        debug!(incident_id = %incident_id, "pipeline tracking started");
    }

    /// Move an incident's pipeline to a new stage
    pub fn advance(&self, incident_id: &str, stage: PipelineStage, note: &str) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(incident_id) else {
            return;
        };
        if entry.stage.is_terminal() {
            return;
        }
        entry.stage = stage;
        entry.record(note);
    }

    /// Attach the currently executing action
    pub fn set_current_action(&self, incident_id: &str, action_id: &str) {
        if let Some(entry) = self.entries.lock().get_mut(incident_id) {
            entry.current_action = Some(action_id.to_string());
        }
    }

    /// Finish a pipeline, folding the outcome into the rolling statistics
    pub fn complete(&self, incident_id: &str, success: bool, reason: Option<String>) {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(incident_id) else {
            return;
        };
        if entry.stage.is_terminal() {
            return;
        }

        let healing_time_ms = (now - entry.started_at).num_milliseconds() as f64;
        entry.completed_at = Some(now);
        if success {
            entry.stage = PipelineStage::Completed;
            entry.healing_time_ms = Some(healing_time_ms);
            entry.record(format!("healed in {:.0}ms", healing_time_ms));
            info!(incident_id = %incident_id, healing_time_ms, "incident healed");
        } else {
            entry.stage = PipelineStage::Failed;
            entry.failure_reason = reason.clone();
            entry.record(format!(
                "failed: {}",
                reason.as_deref().unwrap_or("unknown")
            ));
            warn!(
                incident_id = %incident_id,
                reason = reason.as_deref().unwrap_or("unknown"),
                "healing failed"
            );
        }
        drop(entries);

        let healing_time = success.then_some(healing_time_ms);
        self.stats
            .write()
            .record_outcome(success, healing_time, self.config.ema_alpha);
    }

    /// Fail pipelines past their deadline and evict old finished entries.
    /// Returns the incident ids that timed out.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let timed_out: Vec<String> = {
            let entries = self.entries.lock();
            entries
                .values()
                .filter(|e| !e.stage.is_terminal() && e.deadline <= now)
                .map(|e| e.incident_id.clone())
                .collect()
        };
        for incident_id in &timed_out {
            self.complete(incident_id, false, Some("Pipeline timeout".to_string()));
        }

        let retention = ChronoDuration::seconds(self.config.audit_retention_seconds);
        self.entries.lock().retain(|_, entry| {
            entry
                .completed_at
                .map(|done| now - done < retention)
                .unwrap_or(true)
        });

        timed_out
    }

    pub fn entry(&self, incident_id: &str) -> Option<PipelineEntry> {
        self.entries.lock().get(incident_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| !e.stage.is_terminal())
            .count()
    }

    /// Per-stage counts plus the rolling healing statistics
    pub fn snapshot(&self) -> PipelineSnapshot {
        let mut stage_counts: HashMap<PipelineStage, usize> = HashMap::new();
        let entries = self.entries.lock();
        for entry in entries.values() {
            *stage_counts.entry(entry.stage).or_insert(0) += 1;
        }
        let mut stats = self.stats.read().clone();
        stats.active_pipelines = entries
            .values()
            .filter(|e| !e.stage.is_terminal())
            .count();
        PipelineSnapshot {
            stage_counts,
            stats,
        }
    }
}
