//! Root-cause analysis engine for the NetHeal pipeline
//!
//! Applies rule, topology and temporal detectors over each incident's alert
//! set and persists a ranked list of cause hypotheses.

pub mod engine;
pub mod graph;
pub mod rules;
pub mod temporal;

pub use engine::{analyze_topology, rank_results, RcaEngine};
pub use graph::DependencyGraph;
pub use rules::{analyze_rules, AnalysisContext};
