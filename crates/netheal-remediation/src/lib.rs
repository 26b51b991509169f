//! Policy-driven remediation engine for the NetHeal pipeline
//!
//! Evaluates remediation policies against analyzed incidents, instantiates
//! actions from templates, gates them through safety checks and executes
//! them with verification, rollback and retry.

pub mod context;
pub mod engine;
pub mod executor;
pub mod planner;
pub mod policy;
pub mod safety;
pub mod templates;

pub use context::ConditionContext;
pub use engine::RemediationEngine;
pub use executor::{Executor, SimulatedExecutor, StepOutcome};
pub use planner::{build_action, build_steps, extract_parameters, select_method, substitute};
pub use policy::{
    evaluate_condition, policy_matches, select_policy, time_allows, PolicyRateLimiter,
};
pub use safety::{safety_check, SafetyResult};
pub use templates::{all_templates, template, ActionTemplate};
