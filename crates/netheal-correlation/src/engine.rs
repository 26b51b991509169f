//! Alert correlation engine
//!
//! Consumes `alert_created` events into a queue and drains it in small
//! batches. Each alert passes a duplicate-suppression gate, then the rule
//! table: first as a trigger, then as a correlated member of an earlier
//! trigger alert, and finally a per-device fallback.

use crate::rules::{baseline_rules, CorrelationRule};
use chrono::{Duration as ChronoDuration, Utc};
use netheal_common::{
    Alert, CorrelationConfig, CorrelationStats, EventBus, IdGenerator, Incident, IncidentState,
    PipelineEvent, Priority, Result, Severity, SlaTimestamps, Topology,
};
use netheal_store::Store;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Correlation confidence for a rule match
///
/// `base + min(0.1·N, 0.3) + max(0, 1 − avgΔt/W)·0.2 + (sameDevice/N)·0.15`,
/// clamped to 1.0.
pub fn correlation_confidence(
    base: f64,
    candidates: usize,
    avg_delta_ms: f64,
    window_ms: f64,
    same_device: usize,
) -> f64 {
    if candidates == 0 {
        return 0.0;
    }
    let n = candidates as f64;
    let count_boost = (0.1 * n).min(0.3);
    let recency_boost = (1.0 - avg_delta_ms / window_ms).max(0.0) * 0.2;
    let locality_boost = (same_device as f64 / n) * 0.15;
    (base + count_boost + recency_boost + locality_boost).min(1.0)
}

/// Incident priority from severity, escalated by member count
pub fn priority_for(severity: Severity, member_count: usize) -> Priority {
    match severity {
        Severity::Critical => Priority::P1,
        Severity::Major => {
            if member_count >= 20 {
                Priority::P1
            } else {
                Priority::P2
            }
        }
        Severity::Minor => {
            if member_count >= 10 {
                Priority::P2
            } else {
                Priority::P3
            }
        }
        Severity::Warning | Severity::Info => Priority::P4,
    }
}

/// Devices reachable from `device` within `max_distance` link hops, plus up
/// to `max_co_site` devices sharing its site. Always includes `device`.
pub fn devices_in_scope(
    topology: &Topology,
    device: &str,
    max_distance: u32,
    max_co_site: usize,
) -> Vec<String> {
    let mut scope = vec![device.to_string()];
    let mut frontier = vec![device.to_string()];
    for _ in 0..max_distance {
        let mut next = Vec::new();
        for d in &frontier {
            for neighbor in topology.neighbors(d) {
                if !scope.contains(&neighbor) {
                    scope.push(neighbor.clone());
                    next.push(neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    for co in topology.co_site_devices(device).into_iter().take(max_co_site) {
        if !scope.contains(&co) {
            scope.push(co);
        }
    }
    scope
}

/// Rule-based alert-to-incident correlation
pub struct CorrelationEngine {
    config: CorrelationConfig,
    rules: Vec<CorrelationRule>,
    store: Arc<dyn Store>,
    bus: EventBus,
    ids: Arc<IdGenerator>,
    queue: Mutex<VecDeque<String>>,
    stats: RwLock<CorrelationStats>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CorrelationEngine {
    pub fn new(
        config: CorrelationConfig,
        store: Arc<dyn Store>,
        bus: EventBus,
        ids: Arc<IdGenerator>,
    ) -> Arc<Self> {
        Self::with_rules(config, baseline_rules(), store, bus, ids)
    }

    pub fn with_rules(
        config: CorrelationConfig,
        rules: Vec<CorrelationRule>,
        store: Arc<dyn Store>,
        bus: EventBus,
        ids: Arc<IdGenerator>,
    ) -> Arc<Self> {
        Arc::new(CorrelationEngine {
            config,
            rules,
            store,
            bus,
            ids,
            queue: Mutex::new(VecDeque::new()),
            stats: RwLock::new(CorrelationStats::default()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the event subscriber and the batch drain loop
    pub fn start(self: Arc<Self>) {
        info!("starting correlation engine");

        let subscriber = {
            let engine = self.clone();
            let mut rx = engine.bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(PipelineEvent::AlertCreated { alert_id, .. }) => {
                            engine.enqueue(alert_id);
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("correlation subscriber lagged by {} events", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let drainer = {
            let engine = self.clone();
            tokio::spawn(async move {
                let mut tick =
                    interval(Duration::from_secs(engine.config.batch_interval_seconds));
                loop {
                    tick.tick().await;
                    engine.process_batch().await;
                }
            })
        };

        self.tasks.lock().extend([subscriber, drainer]);
    }

    /// Stop the workers; the queue is cleared
    pub fn stop(&self) {
        info!("stopping correlation engine");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.queue.lock().clear();
    }

    pub fn enqueue(&self, alert_id: String) {
        self.queue.lock().push_back(alert_id);
    }

    /// Drain one batch from the queue, isolating per-alert failures
    pub async fn process_batch(&self) {
        let batch: Vec<String> = {
            let mut queue = self.queue.lock();
            let n = self.config.batch_size.min(queue.len());
            queue.drain(..n).collect()
        };
        for alert_id in batch {
            if let Err(e) = self.process_alert(&alert_id).await {
                self.stats.write().correlation_errors += 1;
                warn!(alert_id = %alert_id, "correlation failed: {}", e);
            }
        }
    }

    /// Correlate a single alert
    pub async fn process_alert(&self, alert_id: &str) -> Result<()> {
        let Some(alert) = self.store.get_alert(alert_id).await? else {
            warn!(alert_id = %alert_id, "alert vanished before correlation");
            return Ok(());
        };
        self.stats.write().alerts_processed += 1;

        // Already correlated; membership is monotonic
        if alert.incident_id.is_some() {
            return Ok(());
        }

        if self.suppress_duplicate(&alert).await? {
            return Ok(());
        }

        let topology = self.store.get_topology().await?;

        // Trigger pass: rules anchored on this alert's type
        for rule in self.rules.iter().filter(|r| r.triggers_on(&alert.alert_type)) {
            if self.correlate_anchor(&alert, rule, topology.as_ref()).await? {
                return Ok(());
            }
        }

        // Reverse pass: this alert may be a correlated member of an earlier
        // trigger alert still inside the rule window
        for rule in self.rules.iter().filter(|r| r.correlates(&alert.alert_type)) {
            if let Some(anchor) = self.find_anchor(&alert, rule, topology.as_ref()).await? {
                if self.correlate_anchor(&anchor, rule, topology.as_ref()).await? {
                    return Ok(());
                }
            }
        }

        self.attach_fallback(&alert).await
    }

    /// Duplicate-suppression gate across (device, type)
    async fn suppress_duplicate(&self, alert: &Alert) -> Result<bool> {
        let since = alert.created_at - ChronoDuration::seconds(self.config.dedup_window_seconds);
        let Some(mut parent) = self
            .store
            .find_active_alert(&alert.device, &alert.alert_type, since, Some(&alert.alert_id))
            .await?
        else {
            return Ok(false);
        };
        if parent.created_at > alert.created_at {
            return Ok(false);
        }

        let mut suppressed = alert.clone();
        suppressed.status = netheal_common::AlertStatus::Suppressed;
        suppressed.parent_alert = Some(parent.alert_id.clone());
        parent.coalesce(alert.last_occurrence);

        let parent_id = parent.alert_id.clone();
        self.store.update_alert(parent).await?;
        self.store.update_alert(suppressed).await?;
        self.stats.write().alerts_suppressed += 1;

        debug!(alert_id = %alert.alert_id, parent = %parent_id, "alert suppressed as duplicate");
        self.bus.publish(PipelineEvent::AlertSuppressed {
            alert_id: alert.alert_id.to_string(),
            parent_alert: parent_id,
        });
        Ok(true)
    }

    fn scope_for(&self, rule: &CorrelationRule, topology: Option<&Topology>, device: &str) -> Vec<String> {
        if rule.topology_dependent && self.config.topology_aware {
            if let Some(topology) = topology {
                return devices_in_scope(
                    topology,
                    device,
                    self.config.max_correlation_distance,
                    self.config.max_co_site_devices,
                );
            }
        }
        vec![device.to_string()]
    }

    /// Find an earlier trigger alert this one could be correlated under
    async fn find_anchor(
        &self,
        alert: &Alert,
        rule: &CorrelationRule,
        topology: Option<&Topology>,
    ) -> Result<Option<Alert>> {
        let window = ChronoDuration::seconds(rule.window_seconds);
        let scope = self.scope_for(rule, topology, &alert.device);
        let candidates = self
            .store
            .alerts_in_window(alert.created_at - window, alert.created_at + window)
            .await?;
        Ok(candidates.into_iter().find(|a| {
            a.alert_id != alert.alert_id
                && rule.triggers_on(&a.alert_type)
                && (a.status.is_active() || a.incident_id.is_some())
                && scope.contains(&a.device)
        }))
    }

    /// Evaluate one rule anchored on `anchor`; returns true when an incident
    /// was created or joined
    async fn correlate_anchor(
        &self,
        anchor: &Alert,
        rule: &CorrelationRule,
        topology: Option<&Topology>,
    ) -> Result<bool> {
        let window = ChronoDuration::seconds(rule.window_seconds);
        let scope = self.scope_for(rule, topology, &anchor.device);

        let in_window = self
            .store
            .alerts_in_window(anchor.created_at - window, anchor.created_at + window)
            .await?;
        let candidates: Vec<Alert> = in_window
            .into_iter()
            .filter(|a| {
                a.alert_id != anchor.alert_id
                    && rule.correlates(&a.alert_type)
                    && (a.status.is_active() || a.incident_id.is_some())
                    && scope.contains(&a.device)
            })
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        let n = candidates.len();
        let avg_delta_ms = candidates
            .iter()
            .map(|a| {
                (a.created_at - anchor.created_at)
                    .num_milliseconds()
                    .unsigned_abs() as f64
            })
            .sum::<f64>()
            / n as f64;
        let same_device = candidates.iter().filter(|a| a.device == anchor.device).count();
        let confidence = correlation_confidence(
            rule.confidence_base,
            n,
            avg_delta_ms,
            (rule.window_seconds * 1000) as f64,
            same_device,
        );
        if confidence < self.config.min_correlation_confidence {
            debug!(
                rule = %rule.name,
                confidence,
                "correlation below confidence threshold"
            );
            return Ok(false);
        }

        // Join an incident some member already belongs to, otherwise create
        let existing = anchor
            .incident_id
            .clone()
            .or_else(|| candidates.iter().find_map(|a| a.incident_id.clone()));

        match existing {
            Some(incident_id) => {
                self.join_incident(&incident_id, anchor, &candidates, rule, confidence)
                    .await?;
            }
            None => {
                self.create_incident(anchor, &candidates, rule, confidence)
                    .await?;
            }
        }
        Ok(true)
    }

    async fn create_incident(
        &self,
        anchor: &Alert,
        candidates: &[Alert],
        rule: &CorrelationRule,
        confidence: f64,
    ) -> Result<()> {
        let incident_id = self.ids.next_incident_id();
        let mut members: Vec<&Alert> = vec![anchor];
        members.extend(candidates.iter().filter(|a| a.incident_id.is_none()));

        let severity = members
            .iter()
            .fold(Severity::Info, |acc, a| acc.max(a.severity));
        let first_alert_time = members
            .iter()
            .map(|a| a.first_occurrence)
            .min()
            .unwrap_or(anchor.first_occurrence);

        let mut incident = Incident {
            incident_id: incident_id.clone(),
            title: format!("{} affecting {}", rule.name, anchor.device),
            alerts: Vec::new(),
            primary_alert: anchor.alert_id.clone(),
            affected_devices: Vec::new(),
            affected_services: Vec::new(),
            severity,
            priority: priority_for(severity, members.len()),
            state: IncidentState::Open,
            correlation_rule: Some(rule.name.clone()),
            correlation_confidence: confidence,
            first_alert_time,
            rca_results: Vec::new(),
            final_root_cause: None,
            root_cause_confidence: 0.0,
            sla: SlaTimestamps::default(),
            notes: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        for member in &members {
            incident.add_alert(&member.alert_id);
            incident.add_device(&member.device);
        }
        self.merge_affected_services(&mut incident).await?;
        incident.add_note(format!(
            "opened by rule {} with confidence {:.2}",
            rule.name, confidence
        ));

        self.store.insert_incident(incident).await?;
        for member in members {
            let mut updated = member.clone();
            updated.incident_id = Some(incident_id.clone());
            self.store.update_alert(updated).await?;
        }
        self.stats.write().incidents_created += 1;

        info!(
            incident_id = %incident_id,
            rule = %rule.name,
            confidence,
            "incident created"
        );
        self.bus.publish(PipelineEvent::IncidentCreated {
            incident_id,
            primary_alert: anchor.alert_id.clone(),
        });
        Ok(())
    }

    async fn join_incident(
        &self,
        incident_id: &str,
        anchor: &Alert,
        candidates: &[Alert],
        rule: &CorrelationRule,
        confidence: f64,
    ) -> Result<()> {
        let Some(mut incident) = self.store.get_incident(incident_id).await? else {
            warn!(incident_id = %incident_id, "member references a missing incident");
            return Ok(());
        };

        let mut joiners: Vec<&Alert> = Vec::new();
        for alert in std::iter::once(anchor).chain(candidates.iter()) {
            match &alert.incident_id {
                Some(existing) if existing != incident_id => continue,
                _ => {}
            }
            if incident.add_alert(&alert.alert_id) {
                joiners.push(alert);
            }
            incident.add_device(&alert.device);
        }
        if joiners.is_empty() {
            return Ok(());
        }

        for alert in &joiners {
            incident.severity = incident.severity.max(alert.severity);
        }
        incident.priority = priority_for(incident.severity, incident.alerts.len());
        self.merge_affected_services(&mut incident).await?;
        incident.add_note(format!(
            "{} alert(s) joined by rule {} with confidence {:.2}",
            joiners.len(),
            rule.name,
            confidence
        ));
        incident.updated_at = Utc::now();

        self.store.update_incident(incident).await?;
        for alert in joiners {
            if alert.incident_id.is_none() {
                let mut updated = alert.clone();
                updated.incident_id = Some(incident_id.to_string());
                self.store.update_alert(updated).await?;
            }
        }
        self.stats.write().incidents_joined += 1;

        debug!(incident_id = %incident_id, rule = %rule.name, "incident joined");
        self.bus.publish(PipelineEvent::IncidentUpdated {
            incident_id: incident_id.to_string(),
        });
        Ok(())
    }

    /// No rule fired: attach to a recent open incident on the same device
    async fn attach_fallback(&self, alert: &Alert) -> Result<()> {
        let since = Utc::now() - ChronoDuration::seconds(self.config.fallback_window_seconds);
        let Some(mut incident) = self
            .store
            .find_open_incident_for_device(&alert.device, since)
            .await?
        else {
            return Ok(());
        };

        if !incident.add_alert(&alert.alert_id) {
            return Ok(());
        }
        incident.add_device(&alert.device);
        incident.severity = incident.severity.max(alert.severity);
        incident.priority = priority_for(incident.severity, incident.alerts.len());
        incident.add_note(format!(
            "alert {} attached by device fallback",
            alert.alert_id
        ));
        incident.updated_at = Utc::now();
        let incident_id = incident.incident_id.clone();

        self.store.update_incident(incident).await?;
        let mut updated = alert.clone();
        updated.incident_id = Some(incident_id.clone());
        self.store.update_alert(updated).await?;
        self.stats.write().fallback_attachments += 1;

        debug!(incident_id = %incident_id, alert_id = %alert.alert_id, "fallback attachment");
        self.bus
            .publish(PipelineEvent::IncidentUpdated { incident_id });
        Ok(())
    }

    /// Affected services are those whose dependent devices intersect the
    /// incident's device set
    async fn merge_affected_services(&self, incident: &mut Incident) -> Result<()> {
        if let Some(topology) = self.store.get_topology().await? {
            for service in &topology.services {
                if service
                    .dependent_devices
                    .iter()
                    .any(|d| incident.affected_devices.contains(d))
                {
                    incident.add_service(&service.name);
                }
            }
        }
        Ok(())
    }

    /// Snapshot of correlation counters
    pub fn stats(&self) -> CorrelationStats {
        self.stats.read().clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }
}
