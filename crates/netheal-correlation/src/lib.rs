//! Alert correlation engine for the NetHeal pipeline
//!
//! Reduces the alert stream into incidents using rule-based, temporal and
//! topology-aware matching, with duplicate suppression up front.

pub mod engine;
pub mod rules;

pub use engine::{correlation_confidence, devices_in_scope, priority_for, CorrelationEngine};
pub use rules::{baseline_rules, CorrelationRule};
