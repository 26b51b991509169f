//! Remediation action templates
//!
//! Each template names its category, risk, supported transports, pre-checks,
//! main command sequence, verification steps and rollback plan. Command
//! patterns substitute `{parameter}` placeholders from the action's
//! parameter map.

use netheal_common::{ActionMethod, RiskLevel};

/// Static definition of one remediation action type
#[derive(Debug, Clone)]
pub struct ActionTemplate {
    pub name: &'static str,
    pub category: &'static str,
    pub risk_level: RiskLevel,
    pub methods: &'static [ActionMethod],
    pub requires_approval: bool,
    pub pre_checks: &'static [&'static str],
    pub commands: &'static [&'static str],
    pub verification_steps: &'static [&'static str],
    pub rollback_commands: &'static [&'static str],
    pub rollback_automatic: bool,
    pub estimated_duration_seconds: u64,
}

static TEMPLATES: &[ActionTemplate] = &[
    ActionTemplate {
        name: "enable_interface",
        category: "interface",
        risk_level: RiskLevel::Low,
        methods: &[ActionMethod::Netconf, ActionMethod::Cli],
        requires_approval: false,
        pre_checks: &["show interface {interface_name}"],
        commands: &["interface {interface_name}", "no shutdown"],
        verification_steps: &["show interface {interface_name} | include line protocol"],
        rollback_commands: &["interface {interface_name}", "shutdown"],
        rollback_automatic: false,
        estimated_duration_seconds: 30,
    },
    ActionTemplate {
        name: "restart_bgp_session",
        category: "routing",
        risk_level: RiskLevel::Medium,
        methods: &[ActionMethod::Netconf, ActionMethod::Cli],
        requires_approval: true,
        pre_checks: &["show bgp neighbor {neighbor_ip}"],
        commands: &["clear bgp neighbor {neighbor_ip}"],
        verification_steps: &["show bgp neighbor {neighbor_ip} | include Established"],
        rollback_commands: &["clear bgp neighbor {neighbor_ip} soft"],
        rollback_automatic: true,
        estimated_duration_seconds: 120,
    },
    ActionTemplate {
        name: "clear_interface_counters",
        category: "interface",
        risk_level: RiskLevel::Low,
        methods: &[ActionMethod::Cli, ActionMethod::Snmp],
        requires_approval: false,
        pre_checks: &["show interface {interface_name} counters"],
        commands: &["clear counters {interface_name}"],
        verification_steps: &["show interface {interface_name} counters"],
        rollback_commands: &[],
        rollback_automatic: false,
        estimated_duration_seconds: 10,
    },
    ActionTemplate {
        name: "restart_service",
        category: "system",
        risk_level: RiskLevel::Medium,
        methods: &[ActionMethod::Cli, ActionMethod::RestApi],
        requires_approval: true,
        pre_checks: &["show processes | include {service_name}"],
        commands: &["service {service_name} restart"],
        verification_steps: &["show processes | include {service_name}"],
        rollback_commands: &["service {service_name} start"],
        rollback_automatic: true,
        estimated_duration_seconds: 60,
    },
    ActionTemplate {
        name: "update_interface_config",
        category: "interface",
        risk_level: RiskLevel::High,
        methods: &[ActionMethod::Netconf, ActionMethod::Cli],
        requires_approval: true,
        pre_checks: &[
            "show running-config interface {interface_name}",
            "copy running-config flash:backup-config",
        ],
        commands: &["interface {interface_name}", "{config_line}"],
        verification_steps: &["show running-config interface {interface_name}"],
        rollback_commands: &["configure replace flash:backup-config force"],
        rollback_automatic: true,
        estimated_duration_seconds: 180,
    },
    ActionTemplate {
        name: "reload_device_config",
        category: "system",
        risk_level: RiskLevel::Critical,
        methods: &[ActionMethod::Cli],
        requires_approval: true,
        pre_checks: &[
            "show running-config | include hostname",
            "copy running-config flash:backup-config",
        ],
        commands: &["configure replace {config_source} force"],
        verification_steps: &["show running-config | include hostname"],
        rollback_commands: &["configure replace flash:backup-config force"],
        rollback_automatic: false,
        estimated_duration_seconds: 300,
    },
];

/// Look up a template by name
pub fn template(name: &str) -> Option<&'static ActionTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// All known templates
pub fn all_templates() -> &'static [ActionTemplate] {
    TEMPLATES
}
