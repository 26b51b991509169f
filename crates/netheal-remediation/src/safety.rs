//! Pre-execution safety gate
//!
//! Checks run in a fixed order and the first failure is terminal for the
//! action; safety failures are never retried.

use chrono::{DateTime, Utc};
use netheal_common::{Action, ActionMethod, Device, DeviceState};

/// Outcome of the safety gate: `Err` carries the human-readable reason
pub type SafetyResult = std::result::Result<(), String>;

/// Run all safety checks for an action about to execute
///
/// `another_active` reports whether a different action is currently
/// executing against the same device.
pub fn safety_check(
    action: &Action,
    device: Option<&Device>,
    another_active: bool,
    dry_run: bool,
    now: DateTime<Utc>,
) -> SafetyResult {
    let Some(device) = device else {
        return Err("Device not found".to_string());
    };

    if device.status != DeviceState::Up {
        return Err("Device is not operational".to_string());
    }

    if action.risk_level.is_disruptive() {
        let inside = device
            .maintenance_window
            .as_ref()
            .map(|w| w.contains(now))
            .unwrap_or(false);
        if !inside {
            return Err("High-risk action outside maintenance window".to_string());
        }
    }

    if !device.automation_enabled {
        return Err("Automation disabled for this device".to_string());
    }

    let transport_ok = match action.method {
        ActionMethod::Netconf => device.netconf_enabled,
        ActionMethod::Cli => device.ssh_enabled,
        ActionMethod::Snmp => device.snmp_enabled,
        ActionMethod::RestApi => true,
    };
    if !transport_ok {
        return Err(format!(
            "Required transport {} unavailable",
            action.method.as_str()
        ));
    }

    if another_active {
        return Err("Another action is executing on this device".to_string());
    }

    if dry_run {
        return Err("Dry-run mode active".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netheal_common::{ActionStatus, Criticality, MaintenanceWindow, RiskLevel};

    fn device() -> Device {
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
            netconf_enabled: true,
            ssh_enabled: true,
            snmp_enabled: true,
            maintenance_window: None,
        }
    }

    fn action(risk: RiskLevel, method: ActionMethod) -> Action {
        Action {
            action_id: "ACT-20260801-0001".into(),
            incident_id: Some("INC-20260801-0001".into()),
            target_device: "r1".into(),
            action_type: "enable_interface".into(),
            method,
            risk_level: risk,
            requires_approval: false,
            parameters: Default::default(),
            steps: Vec::new(),
            rollback_plan: None,
            status: ActionStatus::Approved,
            retry_count: 0,
            error_message: None,
            verification_passed: None,
            scheduled_for: None,
            execution_log: Vec::new(),
            estimated_duration_seconds: 30,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn passes_for_a_healthy_automated_device() {
        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            Some(&device()),
            false,
            false,
            Utc::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn missing_device_fails_first() {
        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            None,
            false,
            false,
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), "Device not found");
    }

    #[test]
    fn automation_disabled_has_the_documented_reason() {
        let mut d = device();
        d.automation_enabled = false;
        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            Some(&d),
            false,
            false,
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), "Automation disabled for this device");
    }

    #[test]
    fn high_risk_requires_maintenance_window() {
        let mut d = device();
        let result = safety_check(
            &action(RiskLevel::High, ActionMethod::Cli),
            Some(&d),
            false,
            false,
            Utc::now(),
        );
        assert_eq!(
            result.unwrap_err(),
            "High-risk action outside maintenance window"
        );

        // An always-open window lets it through
        d.maintenance_window = Some(MaintenanceWindow {
            days: vec![
                "monday".into(),
                "tuesday".into(),
                "wednesday".into(),
                "thursday".into(),
                "friday".into(),
                "saturday".into(),
                "sunday".into(),
            ],
            start_hour: 0,
            end_hour: 24,
        });
        assert!(safety_check(
            &action(RiskLevel::High, ActionMethod::Cli),
            Some(&d),
            false,
            false,
            Utc::now(),
        )
        .is_ok());
    }

    #[test]
    fn transport_and_concurrency_and_dry_run() {
        let mut d = device();
        d.netconf_enabled = false;
        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Netconf),
            Some(&d),
            false,
            false,
            Utc::now(),
        );
        assert!(result.unwrap_err().contains("netconf"));

        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            Some(&device()),
            true,
            false,
            Utc::now(),
        );
        assert_eq!(
            result.unwrap_err(),
            "Another action is executing on this device"
        );

        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            Some(&device()),
            false,
            true,
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), "Dry-run mode active");
    }

    #[test]
    fn down_device_is_rejected() {
        let mut d = device();
        d.status = DeviceState::Unreachable;
        let result = safety_check(
            &action(RiskLevel::Low, ActionMethod::Cli),
            Some(&d),
            false,
            false,
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), "Device is not operational");
    }
}
