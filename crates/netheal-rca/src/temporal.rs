//! Temporal analysis over an incident's alert sequence

use netheal_common::{ids, Alert, RcaResult, TimelineEntry};
use std::collections::HashMap;

/// Transitions per device across paired up/down event types
///
/// A device whose state alternates at least [`FLAP_THRESHOLD`] times is
/// considered flapping.
pub const FLAP_THRESHOLD: u32 = 2;

fn direction(alert_type: &str) -> Option<bool> {
    if alert_type.ends_with("_down") {
        Some(false)
    } else if alert_type.ends_with("_up") {
        Some(true)
    } else {
        None
    }
}

/// Count alternating up/down transitions per device. Alerts must be sorted
/// by creation time.
pub fn flap_counts(alerts: &[Alert]) -> HashMap<String, u32> {
    let mut last_state: HashMap<String, bool> = HashMap::new();
    let mut counts: HashMap<String, u32> = HashMap::new();
    for alert in alerts {
        let Some(state) = direction(&alert.alert_type) else {
            continue;
        };
        match last_state.get(&alert.device) {
            Some(prev) if *prev != state => {
                *counts.entry(alert.device.clone()).or_insert(0) += 1;
            }
            _ => {}
        }
        last_state.insert(alert.device.clone(), state);
    }
    counts
}

/// Devices flapping at or above the threshold
pub fn flapping_devices(alerts: &[Alert]) -> Vec<(String, u32)> {
    let mut out: Vec<(String, u32)> = flap_counts(alerts)
        .into_iter()
        .filter(|(_, n)| *n >= FLAP_THRESHOLD)
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    out
}

fn timeline_of(alerts: &[Alert]) -> Vec<TimelineEntry> {
    alerts
        .iter()
        .map(|a| TimelineEntry {
            timestamp: a.created_at,
            description: format!("{} on {}", a.alert_type, a.device),
        })
        .collect()
}

/// Monotonically decreasing inter-arrival gaps suggest a gradually
/// escalating failure
pub fn detect_escalation(alerts: &[Alert]) -> Option<RcaResult> {
    if alerts.len() < 3 {
        return None;
    }
    let gaps: Vec<i64> = alerts
        .windows(2)
        .map(|pair| (pair[1].created_at - pair[0].created_at).num_milliseconds())
        .collect();
    let decreasing = gaps.windows(2).all(|pair| pair[1] < pair[0]);
    if !decreasing {
        return None;
    }
    Some(RcaResult {
        rca_id: ids::rca_id(),
        analyzer: "temporal".to_string(),
        suspected_cause: "gradual escalation of an underlying fault".to_string(),
        confidence: 0.55,
        contributing_factors: vec![format!(
            "inter-arrival gaps shrinking across {} alerts",
            alerts.len()
        )],
        evidence: gaps.iter().map(|g| format!("gap {}ms", g)).collect(),
        timeline: timeline_of(alerts),
    })
}

/// More than one alert per minute suggests a burst event
pub fn detect_burst(alerts: &[Alert]) -> Option<RcaResult> {
    if alerts.len() < 2 {
        return None;
    }
    let span = alerts[alerts.len() - 1].created_at - alerts[0].created_at;
    let span_minutes = (span.num_milliseconds() as f64 / 60_000.0).max(1.0 / 60.0);
    let rate = alerts.len() as f64 / span_minutes;
    if rate <= 1.0 {
        return None;
    }
    let confidence = (0.5 + 0.02 * alerts.len() as f64).min(0.7);
    Some(RcaResult {
        rca_id: ids::rca_id(),
        analyzer: "temporal".to_string(),
        suspected_cause: "burst failure event".to_string(),
        confidence,
        contributing_factors: vec![format!("{:.1} alerts/minute", rate)],
        evidence: vec![format!(
            "{} alerts within {}s",
            alerts.len(),
            span.num_seconds().max(1)
        )],
        timeline: timeline_of(alerts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use netheal_common::{AlertCategory, AlertStatus, Severity};

    fn alert_at(device: &str, alert_type: &str, offset_secs: i64) -> Alert {
        let t = Utc::now() + ChronoDuration::seconds(offset_secs);
        Alert {
            alert_id: format!("ALT-{}-{}", device, offset_secs),
            device: device.to_string(),
            source_ip: "10.0.0.1".to_string(),
            alert_type: alert_type.to_string(),
            category: AlertCategory::Network,
            severity: Severity::Major,
            status: AlertStatus::Open,
            message: String::new(),
            first_occurrence: t,
            last_occurrence: t,
            occurrence_count: 1,
            parent_alert: None,
            incident_id: None,
            correlation_key: None,
            details: Default::default(),
            created_at: t,
        }
    }

    #[test]
    fn flapping_requires_alternation() {
        let alerts = vec![
            alert_at("r1", "bgp_peer_down", 0),
            alert_at("r1", "bgp_peer_up", 10),
            alert_at("r1", "bgp_peer_down", 20),
            alert_at("r2", "bgp_peer_down", 30),
        ];
        let flapping = flapping_devices(&alerts);
        assert_eq!(flapping, vec![("r1".to_string(), 2)]);
    }

    #[test]
    fn repeated_downs_do_not_count_as_flaps() {
        let alerts = vec![
            alert_at("r1", "interface_down", 0),
            alert_at("r1", "interface_down", 10),
            alert_at("r1", "interface_down", 20),
        ];
        assert!(flapping_devices(&alerts).is_empty());
    }

    #[test]
    fn escalation_needs_shrinking_gaps() {
        let alerts = vec![
            alert_at("r1", "high_cpu", 0),
            alert_at("r1", "high_memory", 60),
            alert_at("r2", "interface_down", 90),
            alert_at("r2", "bgp_peer_down", 100),
        ];
        let result = detect_escalation(&alerts).unwrap();
        assert_eq!(result.analyzer, "temporal");
        assert!(result.suspected_cause.contains("escalation"));

        let steady = vec![
            alert_at("r1", "high_cpu", 0),
            alert_at("r1", "high_memory", 30),
            alert_at("r2", "interface_down", 60),
        ];
        assert!(detect_escalation(&steady).is_none());
    }

    #[test]
    fn burst_triggers_above_one_per_minute() {
        let alerts = vec![
            alert_at("r1", "interface_down", 0),
            alert_at("r2", "interface_down", 5),
            alert_at("r3", "interface_down", 10),
        ];
        let result = detect_burst(&alerts).unwrap();
        assert!(result.confidence >= 0.5 && result.confidence <= 0.7);

        let slow = vec![
            alert_at("r1", "interface_down", 0),
            alert_at("r2", "interface_down", 600),
        ];
        assert!(detect_burst(&slow).is_none());
    }
}
