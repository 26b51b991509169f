//! Remediation engine
//!
//! For each analyzed incident: select a policy, instantiate an action from
//! its template, gate it through cooldown/approval, execute steps through
//! the pluggable executor, verify, and roll back or retry on failure.
//! Execution is bounded by the mode's concurrency limit and never runs two
//! actions against the same device at once.

use crate::context::ConditionContext;
use crate::executor::Executor;
use crate::planner::{build_action, extract_parameters, select_method};
use crate::policy::{select_policy, PolicyRateLimiter};
use crate::safety::safety_check;
use crate::templates;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use netheal_common::{
    Action, ActionStatus, ActionStep, AlertStatus, Error, EventBus, IdGenerator, PipelineEvent,
    RemediationConfig, RemediationStats, Result, RiskLevel, StepKind, StepStatus,
};
use netheal_store::Store;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
struct ScheduledAction {
    action_id: String,
    not_before: DateTime<Utc>,
}

/// Policy-driven remediation over analyzed incidents
pub struct RemediationEngine {
    config: RemediationConfig,
    store: Arc<dyn Store>,
    bus: EventBus,
    ids: Arc<IdGenerator>,
    executor: Arc<dyn Executor>,
    limiter: PolicyRateLimiter,
    cooldowns: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Devices with an execution in flight
    active: Mutex<HashSet<String>>,
    queue: Mutex<VecDeque<ScheduledAction>>,
    stats: RwLock<RemediationStats>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RemediationEngine {
    pub fn new(
        config: RemediationConfig,
        store: Arc<dyn Store>,
        bus: EventBus,
        ids: Arc<IdGenerator>,
        executor: Arc<dyn Executor>,
    ) -> Arc<Self> {
        Arc::new(RemediationEngine {
            config,
            store,
            bus,
            ids,
            executor,
            limiter: PolicyRateLimiter::new(),
            cooldowns: Mutex::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
            queue: Mutex::new(VecDeque::new()),
            stats: RwLock::new(RemediationStats::default()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the analysis subscriber and the execution worker
    pub fn start(self: Arc<Self>) {
        info!("starting remediation engine");

        let subscriber = {
            let engine = self.clone();
            let mut rx = engine.bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(PipelineEvent::AnalysisCompleted { incident_id, .. }) => {
                            if let Err(e) = engine.remediate_incident(&incident_id).await {
                                warn!(incident_id = %incident_id, "remediation failed: {}", e);
                            }
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("remediation subscriber lagged by {} events", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let worker = {
            let engine = self.clone();
            tokio::spawn(async move {
                let mut tick = interval(Duration::from_millis(engine.config.queue_tick_ms));
                loop {
                    tick.tick().await;
                    engine.clone().run_due_actions().await;
                }
            })
        };

        self.tasks.lock().extend([subscriber, worker]);
    }

    /// Stop the workers; queued work is dropped
    pub fn stop(&self) {
        info!("stopping remediation engine");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.queue.lock().clear();
    }

    /// Select a policy for the incident and generate an action
    pub async fn remediate_incident(&self, incident_id: &str) -> Result<()> {
        let Some(incident) = self.store.get_incident(incident_id).await? else {
            warn!(incident_id = %incident_id, "incident vanished before remediation");
            return Ok(());
        };
        if !incident.state.is_open() {
            return Ok(());
        }
        // One in-flight action per incident
        let existing = self.store.list_actions_for_incident(incident_id).await?;
        if existing.iter().any(|a| !a.status.is_terminal()) {
            debug!(incident_id = %incident_id, "incident already has an active action");
            return Ok(());
        }

        let alert = self.store.get_alert(&incident.primary_alert).await?;
        let target_device = alert
            .as_ref()
            .map(|a| a.device.clone())
            .or_else(|| incident.affected_devices.first().cloned());
        let Some(target_device) = target_device else {
            warn!(incident_id = %incident_id, "incident has no target device");
            return Ok(());
        };
        let device = self.store.get_device(&target_device).await?;

        let ctx = ConditionContext::build(&incident, alert.as_ref(), device.as_ref());
        let policies = self.store.list_policies().await?;
        let now = Utc::now();
        let Some(policy) = select_policy(&policies, &ctx, now, &self.limiter) else {
            self.stats.write().no_policy_matched += 1;
            debug!(incident_id = %incident_id, "no policy matched");
            return Ok(());
        };
        let policy_action = policy
            .actions
            .first()
            .ok_or_else(|| Error::Remediation(format!("policy {} has no actions", policy.name)))?;

        let Some(template) = templates::template(&policy_action.template) else {
            error!(
                policy = %policy.name,
                template = %policy_action.template,
                "policy references an unknown action template"
            );
            return Ok(());
        };

        let mut parameters = alert.as_ref().map(extract_parameters).unwrap_or_default();
        for (key, value) in &policy_action.parameters {
            parameters.insert(key.clone(), value.clone());
        }

        let method = select_method(device.as_ref(), template);
        let mut action = build_action(
            self.ids.next_action_id(),
            incident_id,
            &target_device,
            template,
            policy_action,
            method,
            parameters,
        );
        action.log(format!("generated by policy {}", policy.name));

        self.limiter.record(&policy.policy_id, now);
        self.store.insert_action(action.clone()).await?;
        self.stats.write().actions_generated += 1;

        info!(
            action_id = %action.action_id,
            incident_id = %incident_id,
            policy = %policy.name,
            template = %template.name,
            "action generated"
        );
        self.bus.publish(PipelineEvent::ActionGenerated {
            action_id: action.action_id.clone(),
            incident_id: incident_id.to_string(),
            device: target_device,
        });

        self.gate_action(action).await
    }

    fn should_auto_approve(action: &Action) -> bool {
        action.risk_level == RiskLevel::Low
            && matches!(
                action.action_type.as_str(),
                "clear_interface_counters" | "enable_interface"
            )
    }

    /// Cooldown, approval and queueing gates
    async fn gate_action(&self, mut action: Action) -> Result<()> {
        let now = Utc::now();

        if let Some(until) = self.cooldown_until(&action.target_device, now) {
            action.status = ActionStatus::Queued;
            action.scheduled_for = Some(until);
            action.log(format!("device in cooldown, scheduled for {}", until));
            self.store.update_action(action.clone()).await?;
            self.enqueue(&action.action_id, until);
            self.publish_queued(&action);
            return Ok(());
        }

        if action.requires_approval && !self.config.auto_approval_enabled {
            action.status = ActionStatus::PendingApproval;
            action.log("waiting for operator approval");
            self.store.update_action(action.clone()).await?;
            self.stats.write().approvals_pending += 1;
            info!(action_id = %action.action_id, "approval required");
            self.bus.publish(PipelineEvent::ApprovalRequired {
                action_id: action.action_id.clone(),
                incident_id: action.incident_id.clone().unwrap_or_default(),
            });
            return Ok(());
        }

        if action.requires_approval && Self::should_auto_approve(&action) {
            action.log("auto-approved low-risk action");
            self.stats.write().auto_approved += 1;
        }
        action.status = ActionStatus::Approved;
        self.queue_now(action).await
    }

    /// Operator approval for a pending action
    pub async fn approve_action(&self, action_id: &str) -> Result<()> {
        let Some(mut action) = self.store.get_action(action_id).await? else {
            return Err(Error::NotFound(format!("action {}", action_id)));
        };
        if action.status != ActionStatus::PendingApproval {
            return Err(Error::InvalidInput(format!(
                "action {} is not pending approval",
                action_id
            )));
        }
        action.status = ActionStatus::Approved;
        action.log("approved by operator");
        self.queue_now(action).await
    }

    async fn queue_now(&self, mut action: Action) -> Result<()> {
        let now = Utc::now();
        action.status = ActionStatus::Queued;
        action.scheduled_for = Some(now);
        self.store.update_action(action.clone()).await?;
        self.enqueue(&action.action_id, now);
        self.publish_queued(&action);
        Ok(())
    }

    fn publish_queued(&self, action: &Action) {
        self.bus.publish(PipelineEvent::ActionQueued {
            action_id: action.action_id.clone(),
            incident_id: action.incident_id.clone().unwrap_or_default(),
        });
    }

    fn enqueue(&self, action_id: &str, not_before: DateTime<Utc>) {
        self.queue.lock().push_back(ScheduledAction {
            action_id: action_id.to_string(),
            not_before,
        });
    }

    /// Execute every due queued action, bounded by the concurrency limit
    pub async fn run_due_actions(self: Arc<Self>) {
        let now = Utc::now();
        let slots = self
            .config
            .mode
            .max_concurrent_actions()
            .saturating_sub(self.active.lock().len());
        if slots == 0 {
            return;
        }

        let due: Vec<String> = {
            let mut queue = self.queue.lock();
            let mut due = Vec::new();
            let mut rest = VecDeque::new();
            while let Some(entry) = queue.pop_front() {
                if entry.not_before <= now && due.len() < slots {
                    due.push(entry.action_id);
                } else {
                    rest.push_back(entry);
                }
            }
            *queue = rest;
            due
        };

        let mut handles = Vec::new();
        for action_id in due {
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = engine.execute_action(&action_id).await {
                    warn!(action_id = %action_id, "execution error: {}", e);
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Run one queued action through safety, execution, verification and
    /// rollback
    pub async fn execute_action(&self, action_id: &str) -> Result<()> {
        let Some(mut action) = self.store.get_action(action_id).await? else {
            warn!(action_id = %action_id, "queued action vanished");
            return Ok(());
        };
        if action.status.is_terminal() {
            return Ok(());
        }

        let device = self.store.get_device(&action.target_device).await?;

        // Safety gate and device claim happen under one lock so no two
        // executions ever target the same device
        let gate = {
            let mut active = self.active.lock();
            let another_active = active.contains(&action.target_device);
            let check = safety_check(
                &action,
                device.as_ref(),
                another_active,
                self.config.dry_run,
                Utc::now(),
            );
            if check.is_ok() {
                active.insert(action.target_device.clone());
            }
            check
        };
        if let Err(reason) = gate {
            self.stats.write().safety_check_failures += 1;
            warn!(action_id = %action.action_id, "safety check failed: {}", reason);
            action.status = ActionStatus::Failed;
            action.error_message = Some(reason.clone());
            action.log(format!("safety check failed: {}", reason));
            return self.finalize(action, false).await;
        }

        action.status = ActionStatus::Executing;
        action.started_at = Some(Utc::now());
        action.log("execution started");
        self.store.update_action(action.clone()).await?;

        let deadline = Duration::from_secs(self.config.execution_timeout_seconds);
        let timed_out = timeout(deadline, self.run_steps(&mut action)).await.is_err();
        self.active.lock().remove(&action.target_device);

        if timed_out {
            action.status = ActionStatus::Failed;
            action.error_message = Some(format!(
                "execution timeout after {}s",
                self.config.execution_timeout_seconds
            ));
            action.log("execution forcibly failed on timeout");
            self.stats.write().actions_failed += 1;
            return self.finalize(action, false).await;
        }

        let critical_ok = action
            .steps
            .iter()
            .filter(|s| s.critical)
            .all(|s| s.status == StepStatus::Completed);
        let verification_ok = action
            .steps
            .iter()
            .filter(|s| s.kind == StepKind::Verification)
            .all(|s| s.status == StepStatus::Completed);

        if !critical_ok {
            return self.handle_execution_failure(action).await;
        }

        if !verification_ok {
            action.verification_passed = Some(false);
            return self.handle_verification_failure(action).await;
        }

        action.verification_passed = Some(true);
        action.status = ActionStatus::Completed;
        action.log("all steps completed, verification passed");
        self.stats.write().actions_completed += 1;
        info!(action_id = %action.action_id, "action completed");
        self.finalize(action, true).await
    }

    async fn run_steps(&self, action: &mut Action) {
        let meta = action.clone();
        let total = action.steps.len();
        for index in 0..total {
            let step = {
                let step = &mut action.steps[index];
                step.status = StepStatus::Executing;
                step.started_at = Some(Utc::now());
                step.clone()
            };

            let outcome = self.executor.run(&meta, &step).await;

            let failed_critical = {
                let step = &mut action.steps[index];
                step.completed_at = Some(Utc::now());
                if outcome.success {
                    step.status = StepStatus::Completed;
                    step.output = outcome.output;
                    false
                } else {
                    step.status = StepStatus::Failed;
                    step.error = outcome.error;
                    step.critical
                }
            };
            action.log(format!(
                "step {} {}",
                action.steps[index].sequence,
                match action.steps[index].status {
                    StepStatus::Completed => "completed",
                    _ => "failed",
                }
            ));

            if failed_critical {
                for remaining in &mut action.steps[index + 1..] {
                    remaining.status = StepStatus::Skipped;
                }
                break;
            }
        }
    }

    /// Critical step failed: retry with delay or mark failed
    async fn handle_execution_failure(&self, mut action: Action) -> Result<()> {
        if action.retry_count < self.config.max_retries {
            action.retry_count += 1;
            let not_before = Utc::now() + ChronoDuration::seconds(self.config.retry_delay_seconds);
            action.status = ActionStatus::Queued;
            action.scheduled_for = Some(not_before);
            for step in &mut action.steps {
                step.status = StepStatus::Pending;
                step.output = None;
                step.error = None;
                step.started_at = None;
                step.completed_at = None;
            }
            action.log(format!(
                "retry {}/{} scheduled",
                action.retry_count, self.config.max_retries
            ));
            self.store.update_action(action.clone()).await?;
            self.stats.write().retries += 1;
            self.enqueue(&action.action_id, not_before);
            info!(
                action_id = %action.action_id,
                retry = action.retry_count,
                "execution failed, retry scheduled"
            );
            return Ok(());
        }

        action.status = ActionStatus::Failed;
        action.error_message = Some("critical step failed after exhausting retries".to_string());
        self.stats.write().actions_failed += 1;
        warn!(action_id = %action.action_id, "action failed");
        self.finalize(action, false).await
    }

    /// Verification failed: roll back when the plan allows it
    async fn handle_verification_failure(&self, mut action: Action) -> Result<()> {
        let automatic = action
            .rollback_plan
            .as_ref()
            .map(|p| p.automatic)
            .unwrap_or(false);

        if self.config.rollback_enabled && automatic {
            let rolled_back = self.run_rollback(&mut action).await;
            if rolled_back {
                action.status = ActionStatus::RolledBack;
                action.error_message = Some("verification failed, changes rolled back".to_string());
                self.stats.write().rollbacks += 1;
                info!(action_id = %action.action_id, "action rolled back");
            } else {
                action.status = ActionStatus::RollbackFailed;
                action.error_message = Some("verification failed and rollback failed".to_string());
                self.stats.write().rollback_failures += 1;
                error!(action_id = %action.action_id, "rollback failed");
            }
        } else {
            action.status = ActionStatus::Failed;
            action.error_message = Some("verification failed".to_string());
            self.stats.write().actions_failed += 1;
            warn!(action_id = %action.action_id, "verification failed, no automatic rollback");
        }
        self.finalize(action, false).await
    }

    /// Run the rollback command sequence; true when every command succeeded
    async fn run_rollback(&self, action: &mut Action) -> bool {
        let meta = action.clone();
        let commands = action
            .rollback_plan
            .as_ref()
            .map(|p| p.commands.clone())
            .unwrap_or_default();

        let mut ok = true;
        for (index, command) in commands.iter().enumerate() {
            let step = ActionStep::new(
                (index + 1) as u32,
                StepKind::Command,
                format!("rollback {}", index + 1),
                command.clone(),
                true,
                30,
            );
            let outcome = self.executor.run(&meta, &step).await;
            action.log(format!(
                "rollback '{}' {}",
                command,
                if outcome.success { "succeeded" } else { "failed" }
            ));
            if !outcome.success {
                ok = false;
                break;
            }
        }

        if let Some(plan) = action.rollback_plan.as_mut() {
            plan.executed = true;
            plan.success = Some(ok);
        }
        ok
    }

    /// Persist the terminal state, start the device cooldown and notify
    async fn finalize(&self, mut action: Action, success: bool) -> Result<()> {
        let now = Utc::now();
        action.completed_at = Some(now);
        action.updated_at = now;
        self.store.update_action(action.clone()).await?;
        self.set_cooldown(&action.target_device, now);

        if success {
            if let Some(incident_id) = &action.incident_id {
                self.resolve_incident_alerts(incident_id).await?;
            }
        }

        self.bus.publish(PipelineEvent::ActionCompleted {
            action_id: action.action_id.clone(),
            incident_id: action.incident_id.clone().unwrap_or_default(),
            status: action.status,
            success,
        });
        Ok(())
    }

    /// A successful heal resolves the incident's member alerts
    async fn resolve_incident_alerts(&self, incident_id: &str) -> Result<()> {
        let Some(incident) = self.store.get_incident(incident_id).await? else {
            return Ok(());
        };
        for alert_id in &incident.alerts {
            if let Some(mut alert) = self.store.get_alert(alert_id).await? {
                if alert.status != AlertStatus::Resolved {
                    alert.status = AlertStatus::Resolved;
                    self.store.update_alert(alert).await?;
                }
            }
        }
        Ok(())
    }

    fn set_cooldown(&self, device: &str, now: DateTime<Utc>) {
        let until = now + ChronoDuration::seconds(self.config.cooldown_seconds);
        self.cooldowns.lock().insert(device.to_string(), until);
    }

    fn cooldown_until(&self, device: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut cooldowns = self.cooldowns.lock();
        match cooldowns.get(device) {
            Some(until) if *until > now => Some(*until),
            Some(_) => {
                cooldowns.remove(device);
                None
            }
            None => None,
        }
    }

    /// Snapshot of remediation counters
    pub fn stats(&self) -> RemediationStats {
        self.stats.read().clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Devices currently under cooldown
    pub fn cooldown_devices(&self) -> Vec<String> {
        self.cooldowns.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SimulatedExecutor, StepOutcome};
    use async_trait::async_trait;
    use netheal_common::{
        ActionMethod, Alert, AlertCategory, ConditionOp, Criticality, Device, DeviceState,
        Incident, IncidentState, MaintenanceWindow, Policy, PolicyAction, PolicyCondition,
        PolicyStatus, Priority, RateLimit, Severity, SlaTimestamps, TimeConditions,
    };
    use netheal_store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails verification steps only; counts every invocation
    struct VerificationFailingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for VerificationFailingExecutor {
        async fn run(&self, _action: &Action, step: &ActionStep) -> StepOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if step.kind == StepKind::Verification {
                StepOutcome::failed("line protocol is down")
            } else {
                StepOutcome::ok("ok")
            }
        }
    }

    /// Counts invocations and always succeeds
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn run(&self, _action: &Action, _step: &ActionStep) -> StepOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StepOutcome::ok("ok")
        }
    }

    fn device(automation: bool) -> Device {
        Device {
            hostname: "r1".into(),
            mgmt_ip: "10.0.0.1".into(),
            vendor: "cisco".into(),
            model: "ASR".into(),
            os_version: "7.3".into(),
            device_type: "router".into(),
            site: "fra1".into(),
            status: DeviceState::Up,
            criticality: Criticality::Critical,
            automation_enabled: automation,
            netconf_enabled: true,
            ssh_enabled: true,
            snmp_enabled: true,
            maintenance_window: Some(MaintenanceWindow {
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
            }),
        }
    }

    fn seed_incident() -> (Incident, Alert) {
        let now = Utc::now();
        let alert = Alert {
            alert_id: "ALT-1".into(),
            device: "r1".into(),
            source_ip: "10.0.0.1".into(),
            alert_type: "interface_down".into(),
            category: AlertCategory::Network,
            severity: Severity::Major,
            status: AlertStatus::Open,
            message: "Interface GigabitEthernet0/1 is down".into(),
            first_occurrence: now,
            last_occurrence: now,
            occurrence_count: 1,
            parent_alert: None,
            incident_id: Some("INC-20260801-0001".into()),
            correlation_key: None,
            details: Default::default(),
            created_at: now,
        };
        let incident = Incident {
            incident_id: "INC-20260801-0001".into(),
            title: "interface cascade".into(),
            alerts: vec!["ALT-1".into()],
            primary_alert: "ALT-1".into(),
            affected_devices: vec!["r1".into()],
            affected_services: Vec::new(),
            severity: Severity::Major,
            priority: Priority::P2,
            state: IncidentState::Open,
            correlation_rule: Some("interface_cascade".into()),
            correlation_confidence: 0.9,
            first_alert_time: now,
            rca_results: Vec::new(),
            final_root_cause: Some("interface failure on r1".into()),
            root_cause_confidence: 0.8,
            sla: SlaTimestamps::default(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        (incident, alert)
    }

    fn interface_policy(template: &str, risk: RiskLevel, requires_approval: bool) -> Policy {
        Policy {
            policy_id: "POL-20260801-0001".into(),
            name: "Interface Down Recovery".into(),
            triggers: vec![
                PolicyCondition {
                    field: "alert.type".into(),
                    operator: ConditionOp::Equals,
                    value: json!("interface_down"),
                },
                PolicyCondition {
                    field: "device.criticality".into(),
                    operator: ConditionOp::Equals,
                    value: json!("critical"),
                },
            ],
            excludes: Vec::new(),
            time_conditions: TimeConditions::default(),
            actions: vec![PolicyAction {
                template: template.to_string(),
                parameters: Default::default(),
                risk_level: risk,
                requires_approval,
            }],
            rate_limit: RateLimit {
                max_executions: 10,
                window_seconds: 3600,
            },
            priority: 10,
            enabled: true,
            status: PolicyStatus::Active,
        }
    }

    async fn seeded_store(automation: bool, policy: Policy) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_device(device(automation)).await.unwrap();
        let (incident, alert) = seed_incident();
        store.insert_alert(alert).await.unwrap();
        store.insert_incident(incident).await.unwrap();
        store.upsert_policy(policy).await.unwrap();
        store
    }

    fn engine(
        config: RemediationConfig,
        store: Arc<MemoryStore>,
        executor: Arc<dyn Executor>,
    ) -> Arc<RemediationEngine> {
        RemediationEngine::new(
            config,
            store,
            EventBus::new(64),
            Arc::new(IdGenerator::new()),
            executor,
        )
    }

    #[tokio::test]
    async fn policy_match_generates_and_completes_action() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(true, policy).await;
        let engine = engine(
            RemediationConfig::default(),
            store.clone(),
            Arc::new(SimulatedExecutor::reliable()),
        );

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        assert_eq!(engine.stats().actions_generated, 1);

        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.status, ActionStatus::Completed);
        assert_eq!(action.action_type, "enable_interface");
        assert_eq!(action.risk_level, RiskLevel::Low);
        assert!(action
            .steps
            .iter()
            .filter(|s| s.critical)
            .all(|s| s.status == StepStatus::Completed));
        assert_eq!(action.verification_passed, Some(true));
        // Interface name extracted from the alert message
        assert!(action
            .steps
            .iter()
            .any(|s| s.command.contains("GigabitEthernet0/1")));

        // A successful heal resolves the member alerts
        let alert = store.get_alert("ALT-1").await.unwrap().unwrap();
        assert_eq!(alert.status, AlertStatus::Resolved);
    }

    #[tokio::test]
    async fn automation_disabled_fails_safety_without_touching_the_device() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(false, policy).await;
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
        });
        let engine = engine(RemediationConfig::default(), store.clone(), executor.clone());

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        assert_eq!(actions[0].status, ActionStatus::Failed);
        assert_eq!(
            actions[0].error_message.as_deref(),
            Some("Automation disabled for this device")
        );
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.stats().safety_check_failures, 1);
    }

    #[tokio::test]
    async fn failed_verification_rolls_back_automatically() {
        let policy = interface_policy("update_interface_config", RiskLevel::High, true);
        let store = seeded_store(true, policy).await;
        let executor = Arc::new(VerificationFailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let engine = engine(RemediationConfig::default(), store.clone(), executor);

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        let action = &actions[0];
        assert_eq!(action.status, ActionStatus::RolledBack);
        assert_eq!(action.verification_passed, Some(false));
        let rollback = action.rollback_plan.as_ref().unwrap();
        assert!(rollback.executed);
        assert_eq!(rollback.success, Some(true));
        assert_eq!(engine.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn critical_failure_schedules_a_retry() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(true, policy).await;
        let executor =
            Arc::new(SimulatedExecutor::reliable().with_success_rate(ActionMethod::Netconf, 0.0));
        let engine = engine(RemediationConfig::default(), store.clone(), executor);

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        let action = &actions[0];
        assert_eq!(action.status, ActionStatus::Queued);
        assert_eq!(action.retry_count, 1);
        assert!(action.scheduled_for.unwrap() > Utc::now());
        assert_eq!(engine.stats().retries, 1);
        // The retry is not due yet, so nothing executes
        engine.clone().run_due_actions().await;
        let action = store.get_action(&action.action_id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Queued);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_terminally() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(true, policy).await;
        let executor =
            Arc::new(SimulatedExecutor::reliable().with_success_rate(ActionMethod::Netconf, 0.0));
        let config = RemediationConfig {
            max_retries: 0,
            ..RemediationConfig::default()
        };
        let engine = engine(config, store.clone(), executor);

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        assert_eq!(actions[0].status, ActionStatus::Failed);
        assert_eq!(engine.stats().actions_failed, 1);
    }

    #[tokio::test]
    async fn approval_gate_holds_until_operator_approves() {
        let policy = interface_policy("restart_bgp_session", RiskLevel::Medium, true);
        let store = seeded_store(true, policy).await;
        let config = RemediationConfig {
            auto_approval_enabled: false,
            ..RemediationConfig::default()
        };
        let engine = engine(config, store.clone(), Arc::new(SimulatedExecutor::reliable()));

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        let action_id = actions[0].action_id.clone();
        assert_eq!(actions[0].status, ActionStatus::PendingApproval);
        assert_eq!(engine.stats().approvals_pending, 1);

        // Nothing runs while pending
        engine.clone().run_due_actions().await;
        let action = store.get_action(&action_id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::PendingApproval);

        engine.approve_action(&action_id).await.unwrap();
        engine.clone().run_due_actions().await;
        let action = store.get_action(&action_id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn cooldown_defers_the_next_action_on_the_device() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(true, policy).await;
        let engine = engine(
            RemediationConfig::default(),
            store.clone(),
            Arc::new(SimulatedExecutor::reliable()),
        );

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;
        assert_eq!(engine.stats().actions_completed, 1);
        assert_eq!(engine.cooldown_devices(), vec!["r1".to_string()]);

        // A second incident on the same device gets a deferred action
        let (mut incident, mut alert) = seed_incident();
        incident.incident_id = "INC-20260801-0002".into();
        alert.alert_id = "ALT-2".into();
        alert.incident_id = Some(incident.incident_id.clone());
        incident.alerts = vec!["ALT-2".into()];
        incident.primary_alert = "ALT-2".into();
        store.insert_alert(alert).await.unwrap();
        store.insert_incident(incident).await.unwrap();

        engine.remediate_incident("INC-20260801-0002").await.unwrap();
        let actions = store
            .list_actions_for_incident("INC-20260801-0002")
            .await
            .unwrap();
        assert_eq!(actions[0].status, ActionStatus::Queued);
        assert!(actions[0].scheduled_for.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn dry_run_blocks_execution_at_the_safety_gate() {
        let policy = interface_policy("enable_interface", RiskLevel::Low, false);
        let store = seeded_store(true, policy).await;
        let config = RemediationConfig {
            dry_run: true,
            ..RemediationConfig::default()
        };
        let engine = engine(config, store.clone(), Arc::new(SimulatedExecutor::reliable()));

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        engine.clone().run_due_actions().await;

        let actions = store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap();
        assert_eq!(actions[0].status, ActionStatus::Failed);
        assert_eq!(actions[0].error_message.as_deref(), Some("Dry-run mode active"));
    }

    #[tokio::test]
    async fn no_matching_policy_generates_nothing() {
        let mut policy = interface_policy("enable_interface", RiskLevel::Low, false);
        policy.triggers[0].value = json!("high_cpu");
        let store = seeded_store(true, policy).await;
        let engine = engine(
            RemediationConfig::default(),
            store.clone(),
            Arc::new(SimulatedExecutor::reliable()),
        );

        engine.remediate_incident("INC-20260801-0001").await.unwrap();
        assert_eq!(engine.stats().actions_generated, 0);
        assert_eq!(engine.stats().no_policy_matched, 1);
        assert!(store
            .list_actions_for_incident("INC-20260801-0001")
            .await
            .unwrap()
            .is_empty());
    }
}
