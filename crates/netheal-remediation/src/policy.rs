//! Policy matching
//!
//! Policies are evaluated in ascending priority order. A policy matches when
//! every trigger condition holds, no exclude condition holds, the time
//! window allows execution and the per-policy rate limiter has budget. The
//! first match wins; evaluation errors skip the policy and continue.

use crate::context::ConditionContext;
use chrono::{DateTime, Datelike, Timelike, Utc};
use netheal_common::{
    ConditionOp, Error, Policy, PolicyCondition, PolicyStatus, Result, TimeConditions,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

fn numbers(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((a.as_f64()?, b.as_f64()?))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let Some((x, y)) = numbers(a, b) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

fn value_contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected
            .as_str()
            .map(|needle| s.contains(needle))
            .unwrap_or(false),
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn list_contains(list: &Value, actual: &Value) -> Result<bool> {
    match list {
        Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, actual))),
        _ => Err(Error::Remediation(format!(
            "in/not_in condition value must be a list, got {}",
            list
        ))),
    }
}

/// Evaluate one condition against the context
///
/// A missing field makes positive operators false and negative operators
/// true.
pub fn evaluate_condition(ctx: &ConditionContext, cond: &PolicyCondition) -> Result<bool> {
    let actual = match ctx.get(&cond.field) {
        Some(value) => value,
        None => {
            return Ok(matches!(
                cond.operator,
                ConditionOp::NotEquals | ConditionOp::NotIn
            ))
        }
    };

    match cond.operator {
        ConditionOp::Equals => Ok(values_equal(actual, &cond.value)),
        ConditionOp::NotEquals => Ok(!values_equal(actual, &cond.value)),
        ConditionOp::Contains => Ok(value_contains(actual, &cond.value)),
        ConditionOp::GreaterThan => Ok(numbers(actual, &cond.value)
            .map(|(a, b)| a > b)
            .unwrap_or(false)),
        ConditionOp::LessThan => Ok(numbers(actual, &cond.value)
            .map(|(a, b)| a < b)
            .unwrap_or(false)),
        ConditionOp::In => list_contains(&cond.value, actual),
        ConditionOp::NotIn => Ok(!list_contains(&cond.value, actual)?),
    }
}

/// Whether the time conditions allow execution at `now`
pub fn time_allows(tc: &TimeConditions, now: DateTime<Utc>) -> bool {
    let weekday = now.weekday();
    let hour = now.hour();

    if tc.business_hours_only {
        let is_weekday = !matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun);
        if !is_weekday || !(9..17).contains(&hour) {
            return false;
        }
    }

    if let Some(days) = &tc.allowed_days {
        let today = format!("{:?}", weekday).to_lowercase();
        let allowed = days.iter().any(|d| {
            let d = d.to_lowercase();
            d == today || d.starts_with(&today)
        });
        if !allowed {
            return false;
        }
    }

    if let Some(range) = &tc.allowed_hours {
        let inside = if range.start <= range.end {
            hour >= range.start && hour < range.end
        } else {
            hour >= range.start || hour < range.end
        };
        if !inside {
            return false;
        }
    }

    true
}

/// Per-policy executions-per-window budget
#[derive(Debug, Default)]
pub struct PolicyRateLimiter {
    history: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl PolicyRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(entries: &mut VecDeque<DateTime<Utc>>, window_seconds: u64, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(window_seconds as i64);
        while entries.front().map(|t| *t < cutoff).unwrap_or(false) {
            entries.pop_front();
        }
    }

    /// Whether the policy still has budget at `now`
    pub fn has_budget(&self, policy: &Policy, now: DateTime<Utc>) -> bool {
        let mut history = self.history.lock();
        let entries = history.entry(policy.policy_id.clone()).or_default();
        Self::prune(entries, policy.rate_limit.window_seconds, now);
        (entries.len() as u32) < policy.rate_limit.max_executions
    }

    /// Consume one execution slot
    pub fn record(&self, policy_id: &str, now: DateTime<Utc>) {
        self.history
            .lock()
            .entry(policy_id.to_string())
            .or_default()
            .push_back(now);
    }
}

/// Whether the policy matches the context at `now`
pub fn policy_matches(
    policy: &Policy,
    ctx: &ConditionContext,
    now: DateTime<Utc>,
    limiter: &PolicyRateLimiter,
) -> Result<bool> {
    for trigger in &policy.triggers {
        if !evaluate_condition(ctx, trigger)? {
            return Ok(false);
        }
    }
    for exclude in &policy.excludes {
        if evaluate_condition(ctx, exclude)? {
            return Ok(false);
        }
    }
    if !time_allows(&policy.time_conditions, now) {
        return Ok(false);
    }
    if !limiter.has_budget(policy, now) {
        debug!(policy = %policy.name, "policy out of rate-limit budget");
        return Ok(false);
    }
    Ok(true)
}

/// Select the first matching policy, in ascending priority order
///
/// Selection is a pure function of the context snapshot, the policy set and
/// the clock (plus rate-limit history, which the caller owns).
pub fn select_policy<'a>(
    policies: &'a [Policy],
    ctx: &ConditionContext,
    now: DateTime<Utc>,
    limiter: &PolicyRateLimiter,
) -> Option<&'a Policy> {
    let mut eligible: Vec<&Policy> = policies
        .iter()
        .filter(|p| p.enabled && p.status == PolicyStatus::Active && !p.actions.is_empty())
        .collect();
    eligible.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.policy_id.cmp(&b.policy_id)));

    for policy in eligible {
        match policy_matches(policy, ctx, now, limiter) {
            Ok(true) => return Some(policy),
            Ok(false) => {}
            Err(e) => {
                warn!(policy = %policy.name, "policy evaluation error, skipping: {}", e);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netheal_common::{HourRange, PolicyAction, RateLimit, RiskLevel};
    use serde_json::json;

    fn cond(field: &str, operator: ConditionOp, value: Value) -> PolicyCondition {
        PolicyCondition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn ctx() -> ConditionContext {
        ConditionContext::from_pairs(&[
            ("alert.type", json!("interface_down")),
            ("alert.severity", json!("major")),
            ("alert.occurrence_count", json!(3)),
            ("device.criticality", json!("critical")),
            ("alert.message", json!("Interface Gi0/1 is down")),
        ])
    }

    fn policy(id: &str, priority: u32, triggers: Vec<PolicyCondition>) -> Policy {
        Policy {
            policy_id: id.to_string(),
            name: id.to_string(),
            triggers,
            excludes: Vec::new(),
            time_conditions: TimeConditions::default(),
            actions: vec![PolicyAction {
                template: "enable_interface".to_string(),
                parameters: Default::default(),
                risk_level: RiskLevel::Low,
                requires_approval: false,
            }],
            rate_limit: RateLimit {
                max_executions: 5,
                window_seconds: 3600,
            },
            priority,
            enabled: true,
            status: PolicyStatus::Active,
        }
    }

    #[test]
    fn operators_behave() {
        let ctx = ctx();
        let checks = [
            (cond("alert.type", ConditionOp::Equals, json!("interface_down")), true),
            (cond("alert.type", ConditionOp::NotEquals, json!("high_cpu")), true),
            (cond("alert.message", ConditionOp::Contains, json!("Gi0/1")), true),
            (cond("alert.occurrence_count", ConditionOp::GreaterThan, json!(2)), true),
            (cond("alert.occurrence_count", ConditionOp::LessThan, json!(2)), false),
            (
                cond("alert.severity", ConditionOp::In, json!(["critical", "major"])),
                true,
            ),
            (
                cond("alert.severity", ConditionOp::NotIn, json!(["info", "warning"])),
                true,
            ),
            // Missing fields: positive ops false, negative ops true
            (cond("alert.missing", ConditionOp::Equals, json!("x")), false),
            (cond("alert.missing", ConditionOp::NotEquals, json!("x")), true),
            (cond("alert.missing", ConditionOp::NotIn, json!(["x"])), true),
        ];
        for (condition, expected) in checks {
            assert_eq!(
                evaluate_condition(&ctx, &condition).unwrap(),
                expected,
                "condition on {} failed",
                condition.field
            );
        }
    }

    #[test]
    fn malformed_in_list_is_an_error() {
        let ctx = ctx();
        let condition = cond("alert.severity", ConditionOp::In, json!("not-a-list"));
        assert!(evaluate_condition(&ctx, &condition).is_err());
    }

    #[test]
    fn business_hours_gate() {
        let tc = TimeConditions {
            business_hours_only: true,
            allowed_days: None,
            allowed_hours: None,
        };
        // A Wednesday at 10:00 and 18:00, and a Saturday at 10:00
        let wed_morning = Utc.with_ymd_and_hms(2026, 7, 29, 10, 0, 0).unwrap();
        let wed_evening = Utc.with_ymd_and_hms(2026, 7, 29, 18, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        assert!(time_allows(&tc, wed_morning));
        assert!(!time_allows(&tc, wed_evening));
        assert!(!time_allows(&tc, saturday));
    }

    #[test]
    fn allowed_days_and_hours() {
        let tc = TimeConditions {
            business_hours_only: false,
            allowed_days: Some(vec!["saturday".to_string(), "sunday".to_string()]),
            allowed_hours: Some(HourRange { start: 22, end: 4 }),
        };
        let sat_night = Utc.with_ymd_and_hms(2026, 8, 1, 23, 0, 0).unwrap();
        let sat_noon = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let monday_night = Utc.with_ymd_and_hms(2026, 8, 3, 23, 0, 0).unwrap();
        assert!(time_allows(&tc, sat_night));
        assert!(!time_allows(&tc, sat_noon));
        assert!(!time_allows(&tc, monday_night));
    }

    #[test]
    fn selection_is_priority_ordered_and_deterministic() {
        let ctx = ctx();
        let limiter = PolicyRateLimiter::new();
        let now = Utc::now();
        let policies = vec![
            policy(
                "POL-low-prio",
                50,
                vec![cond("alert.type", ConditionOp::Equals, json!("interface_down"))],
            ),
            policy(
                "POL-high-prio",
                10,
                vec![cond("alert.type", ConditionOp::Equals, json!("interface_down"))],
            ),
            policy(
                "POL-no-match",
                1,
                vec![cond("alert.type", ConditionOp::Equals, json!("high_cpu"))],
            ),
        ];

        let selected = select_policy(&policies, &ctx, now, &limiter).unwrap();
        assert_eq!(selected.policy_id, "POL-high-prio");
        // Same inputs, same outcome
        let again = select_policy(&policies, &ctx, now, &limiter).unwrap();
        assert_eq!(again.policy_id, "POL-high-prio");
    }

    #[test]
    fn rate_limit_budget_is_consumed() {
        let ctx = ctx();
        let limiter = PolicyRateLimiter::new();
        let now = Utc::now();
        let mut p = policy(
            "POL-limited",
            10,
            vec![cond("alert.type", ConditionOp::Equals, json!("interface_down"))],
        );
        p.rate_limit = RateLimit {
            max_executions: 2,
            window_seconds: 3600,
        };
        let policies = vec![p];

        for _ in 0..2 {
            assert!(select_policy(&policies, &ctx, now, &limiter).is_some());
            limiter.record("POL-limited", now);
        }
        assert!(select_policy(&policies, &ctx, now, &limiter).is_none());
    }

    #[test]
    fn disabled_or_inactive_policies_are_ignored() {
        let ctx = ctx();
        let limiter = PolicyRateLimiter::new();
        let now = Utc::now();
        let mut disabled = policy(
            "POL-disabled",
            1,
            vec![cond("alert.type", ConditionOp::Equals, json!("interface_down"))],
        );
        disabled.enabled = false;
        let mut draft = policy(
            "POL-draft",
            2,
            vec![cond("alert.type", ConditionOp::Equals, json!("interface_down"))],
        );
        draft.status = PolicyStatus::Draft;

        assert!(select_policy(&[disabled, draft], &ctx, now, &limiter).is_none());
    }
}
