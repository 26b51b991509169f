//! Healing orchestrator for the NetHeal pipeline
//!
//! Wires the telemetry, correlation, RCA and remediation stages together
//! over the event bus and tracks each incident's healing pipeline from
//! detection through resolution or failure.

pub mod pipeline;
pub mod service;

pub use pipeline::{HealingPipeline, PipelineEntry, PipelineSnapshot, PipelineStage};
pub use service::{HealingService, ServiceStatus};
