//! Action planning: method selection, parameter extraction and step
//! generation

use crate::templates::ActionTemplate;
use chrono::Utc;
use netheal_common::{
    Action, ActionMethod, ActionStatus, ActionStep, Alert, Device, PolicyAction, RollbackPlan,
    StepKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

const PRE_CHECK_TIMEOUT_SECONDS: u64 = 30;
const COMMAND_TIMEOUT_SECONDS: u64 = 60;
const VERIFICATION_TIMEOUT_SECONDS: u64 = 30;

static INTERFACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)interface\s+([A-Za-z]+[0-9][0-9/\.]*)").expect("interface regex"));
static IP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})\b").expect("ip regex"));

/// Pick the execution transport for a device/template pair
///
/// Netconf when the device and template both support it, then CLI over SSH,
/// then REST, with CLI as the last resort.
pub fn select_method(device: Option<&Device>, template: &ActionTemplate) -> ActionMethod {
    let netconf = device.map(|d| d.netconf_enabled).unwrap_or(false);
    let ssh = device.map(|d| d.ssh_enabled).unwrap_or(false);

    if netconf && template.methods.contains(&ActionMethod::Netconf) {
        ActionMethod::Netconf
    } else if ssh {
        ActionMethod::Cli
    } else if template.methods.contains(&ActionMethod::RestApi) {
        ActionMethod::RestApi
    } else {
        ActionMethod::Cli
    }
}

/// Pull template parameters out of the triggering alert
pub fn extract_parameters(alert: &Alert) -> HashMap<String, Value> {
    let mut params = HashMap::new();
    if let Some(caps) = INTERFACE_RE.captures(&alert.message) {
        params.insert(
            "interface_name".to_string(),
            Value::String(caps[1].to_string()),
        );
    }
    if let Some(caps) = IP_RE.captures(&alert.message) {
        params.insert("neighbor_ip".to_string(), Value::String(caps[1].to_string()));
    }
    params
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{key}` placeholders from the parameter map
pub fn substitute(pattern: &str, params: &HashMap<String, Value>) -> String {
    let mut out = pattern.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{}}}", key), &value_as_text(value));
    }
    out
}

/// Build the numbered step sequence: pre-checks, main commands, then
/// verifications
pub fn build_steps(template: &ActionTemplate, params: &HashMap<String, Value>) -> Vec<ActionStep> {
    let mut steps = Vec::new();
    let mut sequence = 0u32;

    for check in template.pre_checks {
        sequence += 1;
        steps.push(ActionStep::new(
            sequence,
            StepKind::PreCheck,
            format!("pre-check {}", sequence),
            substitute(check, params),
            true,
            PRE_CHECK_TIMEOUT_SECONDS,
        ));
    }
    for command in template.commands {
        sequence += 1;
        steps.push(ActionStep::new(
            sequence,
            StepKind::Command,
            format!("{} step {}", template.name, sequence),
            substitute(command, params),
            true,
            COMMAND_TIMEOUT_SECONDS,
        ));
    }
    for verification in template.verification_steps {
        sequence += 1;
        let mut step = ActionStep::new(
            sequence,
            StepKind::Verification,
            format!("verify {}", sequence),
            substitute(verification, params),
            false,
            VERIFICATION_TIMEOUT_SECONDS,
        );
        step.expected_result = Some("success".to_string());
        steps.push(step);
    }
    steps
}

/// Instantiate an action from a template for one incident/device
pub fn build_action(
    action_id: String,
    incident_id: &str,
    target_device: &str,
    template: &ActionTemplate,
    policy_action: &PolicyAction,
    method: ActionMethod,
    parameters: HashMap<String, Value>,
) -> Action {
    let steps = build_steps(template, &parameters);
    let rollback_plan = if template.rollback_commands.is_empty() {
        None
    } else {
        Some(RollbackPlan {
            automatic: template.rollback_automatic,
            commands: template
                .rollback_commands
                .iter()
                .map(|c| substitute(c, &parameters))
                .collect(),
            executed: false,
            success: None,
        })
    };

    let now = Utc::now();
    Action {
        action_id,
        incident_id: Some(incident_id.to_string()),
        target_device: target_device.to_string(),
        action_type: template.name.to_string(),
        method,
        risk_level: policy_action.risk_level,
        requires_approval: template.requires_approval || policy_action.requires_approval,
        parameters,
        steps,
        rollback_plan,
        status: ActionStatus::Draft,
        retry_count: 0,
        error_message: None,
        verification_passed: None,
        scheduled_for: None,
        execution_log: Vec::new(),
        estimated_duration_seconds: template.estimated_duration_seconds,
        created_at: now,
        updated_at: now,
        started_at: None,
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::template;
    use netheal_common::{AlertCategory, AlertStatus, Criticality, DeviceState, RiskLevel, Severity};
    use proptest::prelude::*;
    use serde_json::json;

    fn device(netconf: bool, ssh: bool) -> Device {
        Device {
            hostname: "r1".into(),
            mgmt_ip: "10.0.0.1".into(),
            vendor: "cisco".into(),
            model: "ASR".into(),
            os_version: "7.3".into(),
            device_type: "router".into(),
            site: "fra1".into(),
            status: DeviceState::Up,
            criticality: Criticality::High,
            automation_enabled: true,
            netconf_enabled: netconf,
            ssh_enabled: ssh,
            snmp_enabled: true,
            maintenance_window: None,
        }
    }

    #[test]
    fn method_preference_order() {
        let t = template("enable_interface").unwrap();
        assert_eq!(
            select_method(Some(&device(true, true)), t),
            ActionMethod::Netconf
        );
        assert_eq!(select_method(Some(&device(false, true)), t), ActionMethod::Cli);
        // enable_interface has no REST support, so no-ssh falls to CLI
        assert_eq!(select_method(Some(&device(false, false)), t), ActionMethod::Cli);

        let service = template("restart_service").unwrap();
        assert_eq!(
            select_method(Some(&device(false, false)), service),
            ActionMethod::RestApi
        );
        assert_eq!(select_method(None, service), ActionMethod::RestApi);
    }

    proptest! {
        /// Method selection is a deterministic function of its inputs
        #[test]
        fn method_selection_deterministic(netconf in any::<bool>(), ssh in any::<bool>()) {
            let t = template("restart_bgp_session").unwrap();
            let d = device(netconf, ssh);
            let first = select_method(Some(&d), t);
            let second = select_method(Some(&d), t);
            prop_assert_eq!(first, second);
            // And the preference order is honoured
            if netconf {
                prop_assert_eq!(first, ActionMethod::Netconf);
            } else if ssh {
                prop_assert_eq!(first, ActionMethod::Cli);
            } else {
                prop_assert_eq!(first, ActionMethod::Cli);
            }
        }
    }

    #[test]
    fn parameters_come_from_the_alert_message() {
        let now = Utc::now();
        let alert = Alert {
            alert_id: "ALT-1".into(),
            device: "r1".into(),
            source_ip: "10.0.0.1".into(),
            alert_type: "interface_down".into(),
            category: AlertCategory::Network,
            severity: Severity::Major,
            status: AlertStatus::Open,
            message: "Interface GigabitEthernet0/1 is down, neighbor 10.0.0.2 lost".into(),
            first_occurrence: now,
            last_occurrence: now,
            occurrence_count: 1,
            parent_alert: None,
            incident_id: None,
            correlation_key: None,
            details: Default::default(),
            created_at: now,
        };
        let params = extract_parameters(&alert);
        assert_eq!(params.get("interface_name"), Some(&json!("GigabitEthernet0/1")));
        assert_eq!(params.get("neighbor_ip"), Some(&json!("10.0.0.2")));
    }

    #[test]
    fn steps_are_numbered_and_typed() {
        let t = template("enable_interface").unwrap();
        let mut params = HashMap::new();
        params.insert("interface_name".to_string(), json!("Gi0/1"));
        let steps = build_steps(t, &params);

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].kind, StepKind::PreCheck);
        assert!(steps[0].critical);
        assert_eq!(steps[0].timeout_seconds, 30);
        assert_eq!(steps[0].command, "show interface Gi0/1");
        assert_eq!(steps[1].kind, StepKind::Command);
        assert_eq!(steps[1].command, "interface Gi0/1");
        assert_eq!(steps[3].kind, StepKind::Verification);
        assert!(!steps[3].critical);
        assert_eq!(
            steps.iter().map(|s| s.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn built_action_carries_rollback_and_approval() {
        let t = template("update_interface_config").unwrap();
        let policy_action = PolicyAction {
            template: t.name.to_string(),
            parameters: Default::default(),
            risk_level: RiskLevel::High,
            requires_approval: true,
        };
        let mut params = HashMap::new();
        params.insert("interface_name".to_string(), json!("Gi0/1"));
        params.insert("config_line".to_string(), json!("mtu 9000"));

        let action = build_action(
            "ACT-20260801-0001".to_string(),
            "INC-20260801-0001",
            "r1",
            t,
            &policy_action,
            ActionMethod::Netconf,
            params,
        );
        assert_eq!(action.status, ActionStatus::Draft);
        assert!(action.requires_approval);
        assert_eq!(action.risk_level, RiskLevel::High);
        let rollback = action.rollback_plan.as_ref().unwrap();
        assert!(rollback.automatic);
        assert!(!rollback.executed);
        assert!(action.steps.iter().any(|s| s.command == "mtu 9000"));
    }
}
