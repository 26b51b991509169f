//! Common types and utilities for the NetHeal autonomous healing pipeline
//!
//! This crate provides the entity model, configuration, error handling and
//! event types shared by every stage of the pipeline.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod metrics;
pub mod types;

pub use config::{
    Config, CorrelationConfig, OrchestratorConfig, RcaConfig, RemediationConfig, RemediationMode,
    TelemetryConfig, TelemetrySource,
};
pub use error::{Error, Result};
pub use events::{EventBus, PipelineEvent};
pub use ids::IdGenerator;
pub use metrics::{
    CorrelationStats, HealingStats, RcaStats, RemediationStats, TelemetryStats,
};
pub use types::*;
