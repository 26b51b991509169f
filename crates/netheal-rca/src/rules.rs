//! Rule-based root-cause analyzers
//!
//! Each rule is a pure function of the incident's alert set: it inspects
//! alerts grouped by type and returns a hypothesis with confidence derived
//! from temporal proximity, affected-device counts and the presence of
//! critical subtypes.

use crate::temporal;
use chrono::Duration as ChronoDuration;
use netheal_common::{ids, Alert, Incident, RcaResult, TimelineEntry};
use std::collections::BTreeSet;

/// Everything a rule analyzer sees: the incident plus its alerts sorted by
/// creation time
pub struct AnalysisContext<'a> {
    pub incident: &'a Incident,
    pub alerts: &'a [Alert],
}

impl<'a> AnalysisContext<'a> {
    pub fn alerts_of_type(&self, alert_type: &str) -> Vec<&Alert> {
        self.alerts
            .iter()
            .filter(|a| a.alert_type == alert_type)
            .collect()
    }

    pub fn has_type(&self, alert_type: &str) -> bool {
        self.alerts.iter().any(|a| a.alert_type == alert_type)
    }

    pub fn distinct_types(&self) -> Vec<String> {
        let set: BTreeSet<String> = self.alerts.iter().map(|a| a.alert_type.clone()).collect();
        set.into_iter().collect()
    }

    pub fn device_count(&self) -> usize {
        let set: BTreeSet<&str> = self.alerts.iter().map(|a| a.device.as_str()).collect();
        set.len()
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.alerts
            .iter()
            .map(|a| TimelineEntry {
                timestamp: a.created_at,
                description: format!("{} on {}", a.alert_type, a.device),
            })
            .collect()
    }

    fn span_seconds(&self) -> i64 {
        match (self.alerts.first(), self.alerts.last()) {
            (Some(first), Some(last)) => (last.created_at - first.created_at).num_seconds(),
            _ => 0,
        }
    }
}

fn result(
    analyzer: &str,
    cause: String,
    confidence: f64,
    factors: Vec<String>,
    evidence: Vec<String>,
    timeline: Vec<TimelineEntry>,
) -> RcaResult {
    RcaResult {
        rca_id: ids::rca_id(),
        analyzer: analyzer.to_string(),
        suspected_cause: cause,
        confidence: confidence.min(1.0),
        contributing_factors: factors,
        evidence,
        timeline,
    }
}

/// An interface failure pulling down sessions and services behind it
pub fn interface_failure_cascade(ctx: &AnalysisContext) -> Option<RcaResult> {
    let interfaces = ctx.alerts_of_type("interface_down");
    let first = interfaces.first()?;
    let secondary: Vec<&Alert> = ctx
        .alerts
        .iter()
        .filter(|a| {
            matches!(
                a.alert_type.as_str(),
                "bgp_peer_down" | "service_unreachable" | "high_latency"
            )
        })
        .collect();
    if secondary.is_empty() {
        return None;
    }

    let mut confidence = 0.6 + 0.1 * (secondary.len().min(2) as f64);
    // Tight cascades are more convincing than slow ones
    if ctx.span_seconds() <= 60 {
        confidence += 0.1;
    }
    Some(result(
        "rule_based",
        format!(
            "interface failure on {} cascading to dependent sessions",
            first.device
        ),
        confidence.min(0.95),
        vec![
            format!("{} interface_down alert(s)", interfaces.len()),
            format!("{} downstream alert(s)", secondary.len()),
        ],
        secondary
            .iter()
            .map(|a| format!("{} on {}", a.alert_type, a.device))
            .collect(),
        ctx.timeline(),
    ))
}

/// A device gone dark, or many unrelated symptoms on one device
pub fn device_hardware_failure(ctx: &AnalysisContext) -> Option<RcaResult> {
    if let Some(unreachable) = ctx.alerts_of_type("device_unreachable").first() {
        let confidence = (0.7 + 0.05 * ctx.device_count() as f64).min(0.9);
        return Some(result(
            "rule_based",
            format!("probable hardware failure on {}", unreachable.device),
            confidence,
            vec!["device unreachable".to_string()],
            vec![format!(
                "{} affected device(s) in incident",
                ctx.device_count()
            )],
            ctx.timeline(),
        ));
    }

    // Many distinct symptom types on a single device
    if ctx.device_count() == 1 && ctx.distinct_types().len() >= 3 {
        let device = &ctx.alerts[0].device;
        let types = ctx.distinct_types();
        return Some(result(
            "rule_based",
            format!("probable hardware failure on {}", device),
            (0.55 + 0.05 * types.len() as f64).min(0.85),
            vec![format!("{} distinct symptom types", types.len())],
            types,
            ctx.timeline(),
        ));
    }
    None
}

/// BGP sessions oscillating instead of staying down
pub fn bgp_convergence_issue(ctx: &AnalysisContext) -> Option<RcaResult> {
    let flapping = temporal::flapping_devices(ctx.alerts);
    let (device, flaps) = flapping.first()?;
    if !ctx.has_type("bgp_peer_down") {
        return None;
    }
    Some(result(
        "rule_based",
        format!("bgp convergence issue on {} ({} transitions)", device, flaps),
        (0.6 + 0.05 * *flaps as f64).min(0.85),
        vec!["alternating up/down transitions".to_string()],
        vec![format!("flap count {}", flaps)],
        ctx.timeline(),
    ))
}

/// Resource exhaustion degrading the control plane
pub fn performance_degradation(ctx: &AnalysisContext) -> Option<RcaResult> {
    let cpu = ctx.alerts_of_type("high_cpu");
    let memory = ctx.alerts_of_type("high_memory");
    let first = cpu.first().or_else(|| memory.first())?;

    let mut confidence = 0.55;
    if !cpu.is_empty() && !memory.is_empty() {
        confidence += 0.15;
    }
    let occurrences: u32 = cpu
        .iter()
        .chain(memory.iter())
        .map(|a| a.occurrence_count)
        .sum();
    confidence += (0.02 * occurrences as f64).min(0.1);

    Some(result(
        "rule_based",
        format!("resource exhaustion on {}", first.device),
        confidence.min(0.8),
        vec![
            format!("{} high_cpu alert(s)", cpu.len()),
            format!("{} high_memory alert(s)", memory.len()),
        ],
        vec![format!("{} total occurrences", occurrences)],
        ctx.timeline(),
    ))
}

/// Authentication anomalies, possibly paired with configuration changes
pub fn security_incident(ctx: &AnalysisContext) -> Option<RcaResult> {
    let auth: Vec<&Alert> = ctx
        .alerts
        .iter()
        .filter(|a| {
            matches!(
                a.alert_type.as_str(),
                "authentication_failure" | "authentication_event" | "unauthorized_access"
            )
        })
        .collect();
    let first = auth.first()?;

    let mut confidence: f64 = 0.6;
    let mut factors = vec![format!("{} authentication alert(s)", auth.len())];
    if ctx.has_type("config_change") {
        confidence += 0.15;
        factors.push("configuration changed during the window".to_string());
    }
    Some(result(
        "rule_based",
        format!("suspicious access activity on {}", first.device),
        confidence.min(0.85),
        factors,
        auth.iter().map(|a| a.message.clone()).collect(),
        ctx.timeline(),
    ))
}

/// A configuration change immediately followed by other symptoms
pub fn config_change_impact(ctx: &AnalysisContext) -> Option<RcaResult> {
    let change = ctx.alerts_of_type("config_change").first().copied()?;
    let fallout: Vec<&Alert> = ctx
        .alerts
        .iter()
        .filter(|a| {
            a.alert_type != "config_change"
                && a.created_at >= change.created_at
                && a.created_at - change.created_at <= ChronoDuration::seconds(300)
        })
        .collect();
    if fallout.is_empty() {
        return None;
    }
    Some(result(
        "rule_based",
        format!("recent configuration change on {}", change.device),
        0.75,
        vec![format!("{} alert(s) within 300s of the change", fallout.len())],
        fallout
            .iter()
            .map(|a| format!("{} on {}", a.alert_type, a.device))
            .collect(),
        ctx.timeline(),
    ))
}

/// Run the full rule set in order
pub fn analyze_rules(ctx: &AnalysisContext) -> Vec<RcaResult> {
    [
        interface_failure_cascade(ctx),
        device_hardware_failure(ctx),
        bgp_convergence_issue(ctx),
        performance_degradation(ctx),
        security_incident(ctx),
        config_change_impact(ctx),
    ]
    .into_iter()
    .flatten()
    .collect()
}
