//! Per-component counters surfaced through status snapshots

use serde::{Deserialize, Serialize};

/// Telemetry collector counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub events_received: u64,
    pub events_dropped: u64,
    pub buffer_overflows: u64,
    pub parse_errors: u64,
    pub normalization_errors: u64,
    pub alerts_created: u64,
    pub alerts_coalesced: u64,
    pub buffer_depth: usize,
}

/// Correlation engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationStats {
    pub alerts_processed: u64,
    pub alerts_suppressed: u64,
    pub incidents_created: u64,
    pub incidents_joined: u64,
    pub fallback_attachments: u64,
    pub correlation_errors: u64,
}

/// RCA engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RcaStats {
    pub analyses_completed: u64,
    pub analyses_failed: u64,
    pub analyses_timed_out: u64,
    pub causes_produced: u64,
}

/// Remediation engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationStats {
    pub actions_generated: u64,
    pub actions_completed: u64,
    pub actions_failed: u64,
    pub rollbacks: u64,
    pub rollback_failures: u64,
    pub safety_check_failures: u64,
    pub retries: u64,
    pub approvals_pending: u64,
    pub auto_approved: u64,
    pub no_policy_matched: u64,
}

/// Orchestrator-level healing statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealingStats {
    pub active_pipelines: usize,
    pub completed_healings: u64,
    pub failed_healings: u64,
    /// Completed / (completed + failed), 0.0 when nothing finished yet
    pub success_rate: f64,
    /// Exponential moving average of healing duration in milliseconds
    pub avg_healing_time_ms: f64,
}

impl HealingStats {
    /// Fold a finished pipeline into the rolling statistics
    pub fn record_outcome(&mut self, success: bool, healing_time_ms: Option<f64>, alpha: f64) {
        if success {
            self.completed_healings += 1;
        } else {
            self.failed_healings += 1;
        }
        let total = self.completed_healings + self.failed_healings;
        if total > 0 {
            self.success_rate = self.completed_healings as f64 / total as f64;
        }
        if let Some(ms) = healing_time_ms {
            if self.avg_healing_time_ms == 0.0 {
                self.avg_healing_time_ms = ms;
            } else {
                self.avg_healing_time_ms = alpha * ms + (1.0 - alpha) * self.avg_healing_time_ms;
            }
        }
    }
}
