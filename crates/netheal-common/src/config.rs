//! Configuration management for the NetHeal pipeline

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub correlation: CorrelationConfig,
    pub rca: RcaConfig,
    pub remediation: RemediationConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Telemetry ingestion sources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TelemetrySource {
    Syslog,
    Snmp,
}

/// Telemetry collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub bind_address: String,
    pub enabled_sources: Vec<TelemetrySource>,
    pub syslog_port: u16,
    pub syslog_fallback_port: u16,
    pub snmp_port: u16,
    pub snmp_fallback_port: u16,
    /// Datagrams beyond this per-second budget are dropped silently
    pub max_events_per_second: u32,
    /// Ring buffer capacity; overflow discards the oldest event
    pub buffer_size: usize,
    /// Events drained from the buffer per processing tick
    pub batch_size: usize,
    pub tick_interval_ms: u64,
    /// Open alerts on the same (device, type) within this window coalesce
    pub coalesce_window_seconds: i64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            bind_address: "0.0.0.0".to_string(),
            enabled_sources: vec![TelemetrySource::Syslog, TelemetrySource::Snmp],
            syslog_port: 514,
            syslog_fallback_port: 1514,
            snmp_port: 162,
            snmp_fallback_port: 1162,
            max_events_per_second: 1000,
            buffer_size: 10_000,
            batch_size: 100,
            tick_interval_ms: 1000,
            coalesce_window_seconds: 30,
        }
    }
}

/// Alert correlation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub batch_size: usize,
    pub batch_interval_seconds: u64,
    /// Duplicate suppression window across (device, type)
    pub dedup_window_seconds: i64,
    pub min_correlation_confidence: f64,
    pub max_correlation_distance: u32,
    pub max_co_site_devices: usize,
    pub topology_aware: bool,
    /// Window for attaching rule-less alerts to an open incident on the device
    pub fallback_window_seconds: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            batch_size: 10,
            batch_interval_seconds: 5,
            dedup_window_seconds: 60,
            min_correlation_confidence: 0.6,
            max_correlation_distance: 3,
            max_co_site_devices: 10,
            topology_aware: true,
            fallback_window_seconds: 300,
        }
    }
}

/// Root-cause analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RcaConfig {
    pub max_root_causes: usize,
    pub min_confidence_threshold: f64,
    pub analysis_timeout_seconds: u64,
    pub tick_interval_seconds: u64,
}

impl Default for RcaConfig {
    fn default() -> Self {
        RcaConfig {
            max_root_causes: 5,
            min_confidence_threshold: 0.5,
            analysis_timeout_seconds: 30,
            tick_interval_seconds: 10,
        }
    }
}

/// How aggressively remediation is allowed to run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemediationMode {
    Conservative,
    Moderate,
    Aggressive,
}

impl RemediationMode {
    /// Concurrency bound implied by the mode
    pub fn max_concurrent_actions(&self) -> usize {
        match self {
            RemediationMode::Conservative => 2,
            RemediationMode::Moderate => 5,
            RemediationMode::Aggressive => 10,
        }
    }
}

/// Remediation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub mode: RemediationMode,
    pub auto_approval_enabled: bool,
    pub dry_run: bool,
    pub rollback_enabled: bool,
    pub cooldown_seconds: i64,
    pub max_retries: u32,
    pub retry_delay_seconds: i64,
    pub execution_timeout_seconds: u64,
    pub queue_tick_ms: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        RemediationConfig {
            mode: RemediationMode::Conservative,
            auto_approval_enabled: true,
            dry_run: false,
            rollback_enabled: true,
            cooldown_seconds: 300,
            max_retries: 3,
            retry_delay_seconds: 60,
            execution_timeout_seconds: 300,
            queue_tick_ms: 500,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// A pipeline exceeding this is forcibly failed
    pub incident_timeout_seconds: i64,
    /// How long completed pipelines stay visible for audit
    pub audit_retention_seconds: i64,
    pub sweep_interval_seconds: u64,
    /// Smoothing factor for the healing-time EMA
    pub ema_alpha: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            incident_timeout_seconds: 3600,
            audit_retention_seconds: 300,
            sweep_interval_seconds: 10,
            ema_alpha: 0.1,
        }
    }
}

impl Config {
    /// Parse a TOML configuration document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Configuration(format!("invalid config: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `SYSLOG_PORT` / `SNMP_PORT` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("SYSLOG_PORT") {
            if let Ok(port) = port.parse() {
                self.telemetry.syslog_port = port;
            }
        }
        if let Ok(port) = std::env::var("SNMP_PORT") {
            if let Ok(port) = port.parse() {
                self.telemetry.snmp_port = port;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.telemetry.syslog_port, 514);
        assert_eq!(config.telemetry.max_events_per_second, 1000);
        assert_eq!(config.telemetry.buffer_size, 10_000);
        assert_eq!(config.correlation.batch_size, 10);
        assert_eq!(config.correlation.min_correlation_confidence, 0.6);
        assert_eq!(config.rca.max_root_causes, 5);
        assert_eq!(config.remediation.cooldown_seconds, 300);
        assert_eq!(config.remediation.mode.max_concurrent_actions(), 2);
        assert_eq!(config.orchestrator.incident_timeout_seconds, 3600);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [telemetry]
            syslog_port = 5514

            [remediation]
            mode = "aggressive"
            "#,
        )
        .unwrap();
        assert_eq!(config.telemetry.syslog_port, 5514);
        assert_eq!(config.telemetry.snmp_port, 162);
        assert_eq!(config.remediation.mode.max_concurrent_actions(), 10);
        assert_eq!(config.rca.analysis_timeout_seconds, 30);
    }
}
