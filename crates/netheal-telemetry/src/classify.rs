//! Event classification and severity normalization
//!
//! Classification is a deterministic case-insensitive substring match; the
//! table order matters and the first match wins.

use netheal_common::{AlertCategory, Severity};

/// Event types that always produce an alert, regardless of severity
const ALERTING_TYPES: &[&str] = &[
    "interface_down",
    "bgp_peer_down",
    "high_cpu",
    "high_memory",
    "device_unreachable",
    "authentication_failure",
];

/// Classify a message into an event type
pub fn classify(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("interface") && has("down") {
        "interface_down"
    } else if has("interface") && has("up") {
        "interface_up"
    } else if has("bgp") && has("down") {
        "bgp_peer_down"
    } else if has("bgp") && has("up") {
        "bgp_peer_up"
    } else if has("cpu") && has("high") {
        "high_cpu"
    } else if has("memory") && has("high") {
        "high_memory"
    } else if has("login") || has("authentication") {
        "authentication_event"
    } else if has("config") && has("changed") {
        "config_change"
    } else {
        "system_message"
    }
}

/// Map a raw syslog severity (0-7) to the normalized scale
pub fn syslog_severity(raw: u8) -> Severity {
    match raw {
        0..=2 => Severity::Critical, // emergency, alert, critical
        3 => Severity::Major,        // error
        4 => Severity::Minor,        // warning
        _ => Severity::Info,         // notice, info, debug
    }
}

/// Category bucket for an event type
pub fn category_for(event_type: &str) -> AlertCategory {
    match event_type {
        "interface_down" | "interface_up" | "bgp_peer_down" | "bgp_peer_up"
        | "device_unreachable" => AlertCategory::Network,
        "high_cpu" | "high_memory" => AlertCategory::Performance,
        "authentication_event" | "authentication_failure" | "config_change"
        | "unauthorized_access" => AlertCategory::Security,
        _ => AlertCategory::System,
    }
}

/// Whether an event warrants an alert
pub fn should_alert(event_type: &str, severity: Severity) -> bool {
    ALERTING_TYPES.contains(&event_type)
        || matches!(severity, Severity::Critical | Severity::Major)
}
