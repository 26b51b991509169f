//! Correlation rule definitions

/// One correlation rule: which alert types it anchors on, which types it
/// pulls in, and inside what window
#[derive(Debug, Clone)]
pub struct CorrelationRule {
    pub name: String,
    pub trigger_types: Vec<String>,
    pub correlated_types: Vec<String>,
    pub window_seconds: i64,
    pub topology_dependent: bool,
    pub confidence_base: f64,
}

impl CorrelationRule {
    pub fn triggers_on(&self, alert_type: &str) -> bool {
        self.trigger_types.iter().any(|t| t == alert_type)
    }

    pub fn correlates(&self, alert_type: &str) -> bool {
        self.correlated_types.iter().any(|t| t == alert_type)
    }
}

fn rule(
    name: &str,
    triggers: &[&str],
    correlated: &[&str],
    window_seconds: i64,
    topology_dependent: bool,
    confidence_base: f64,
) -> CorrelationRule {
    CorrelationRule {
        name: name.to_string(),
        trigger_types: triggers.iter().map(|s| s.to_string()).collect(),
        correlated_types: correlated.iter().map(|s| s.to_string()).collect(),
        window_seconds,
        topology_dependent,
        confidence_base,
    }
}

/// The baseline rule set, in evaluation order
pub fn baseline_rules() -> Vec<CorrelationRule> {
    vec![
        rule(
            "interface_cascade",
            &["interface_down"],
            &["bgp_peer_down", "service_unreachable", "high_latency"],
            120,
            true,
            0.90,
        ),
        rule(
            "device_failure_cascade",
            &["device_unreachable", "snmp_timeout"],
            &["interface_down", "service_unreachable", "bgp_peer_down"],
            180,
            true,
            0.95,
        ),
        rule(
            "bgp_flapping",
            &["bgp_peer_down"],
            &["bgp_peer_up", "routing_table_change", "packet_loss"],
            300,
            false,
            0.80,
        ),
        rule(
            "performance_degradation",
            &["high_cpu", "high_memory"],
            &["high_utilization", "slow_response", "packet_drops"],
            600,
            false,
            0.70,
        ),
        rule(
            "security_incident",
            &["authentication_failure", "unauthorized_access"],
            &["config_change", "unusual_traffic", "port_scan"],
            900,
            false,
            0.85,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_rule_table() {
        let rules = baseline_rules();
        assert_eq!(rules.len(), 5);
        assert_eq!(rules[0].name, "interface_cascade");
        assert!(rules[0].triggers_on("interface_down"));
        assert!(rules[0].correlates("bgp_peer_down"));
        assert!(rules[0].topology_dependent);
        assert_eq!(rules[1].window_seconds, 180);
        assert!((rules[4].confidence_base - 0.85).abs() < f64::EPSILON);
        assert!(!rules[2].topology_dependent);
    }
}
