//! Root-cause analysis engine
//!
//! Incidents queue up as they are created or updated; one analysis runs per
//! tick, bounded by a per-analysis timeout. Results are deduped on the
//! suspected cause, ranked by confidence and persisted onto the incident.

use crate::graph::DependencyGraph;
use crate::rules::{analyze_rules, AnalysisContext};
use crate::temporal;
use netheal_common::{
    ids, Alert, EventBus, Incident, PipelineEvent, RcaConfig, RcaResult, RcaStats, Result,
};
use netheal_store::Store;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, info, warn};

/// Queued root-cause analysis over incidents
pub struct RcaEngine {
    config: RcaConfig,
    store: Arc<dyn Store>,
    bus: EventBus,
    queue: Mutex<VecDeque<String>>,
    graph_cache: Mutex<Option<DependencyGraph>>,
    stats: RwLock<RcaStats>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RcaEngine {
    pub fn new(config: RcaConfig, store: Arc<dyn Store>, bus: EventBus) -> Arc<Self> {
        Arc::new(RcaEngine {
            config,
            store,
            bus,
            queue: Mutex::new(VecDeque::new()),
            graph_cache: Mutex::new(None),
            stats: RwLock::new(RcaStats::default()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the event subscriber and the analysis tick
    pub fn start(self: Arc<Self>) {
        info!("starting rca engine");

        let subscriber = {
            let engine = self.clone();
            let mut rx = engine.bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(PipelineEvent::IncidentCreated { incident_id, .. })
                        | Ok(PipelineEvent::IncidentUpdated { incident_id }) => {
                            engine.enqueue(incident_id);
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("rca subscriber lagged by {} events", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let ticker = {
            let engine = self.clone();
            tokio::spawn(async move {
                let mut tick = interval(Duration::from_secs(engine.config.tick_interval_seconds));
                loop {
                    tick.tick().await;
                    engine.run_next().await;
                }
            })
        };

        self.tasks.lock().extend([subscriber, ticker]);
    }

    /// Stop the workers; the queue is cleared
    pub fn stop(&self) {
        info!("stopping rca engine");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.queue.lock().clear();
    }

    /// Queue an incident for (re)analysis, collapsing duplicates
    pub fn enqueue(&self, incident_id: String) {
        let mut queue = self.queue.lock();
        if !queue.contains(&incident_id) {
            queue.push_back(incident_id);
        }
    }

    /// Pop one incident and analyze it under the configured timeout
    pub async fn run_next(&self) {
        let Some(incident_id) = self.queue.lock().pop_front() else {
            return;
        };
        let deadline = Duration::from_secs(self.config.analysis_timeout_seconds);
        match timeout(deadline, self.analyze_incident(&incident_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stats.write().analyses_failed += 1;
                warn!(incident_id = %incident_id, "rca failed: {}", e);
            }
            Err(_) => {
                let mut stats = self.stats.write();
                stats.analyses_timed_out += 1;
                stats.analyses_failed += 1;
                warn!(
                    incident_id = %incident_id,
                    "rca abandoned after {}s",
                    self.config.analysis_timeout_seconds
                );
            }
        }
    }

    async fn dependency_graph(&self) -> Result<DependencyGraph> {
        if let Some(graph) = self.graph_cache.lock().as_ref() {
            return Ok(graph.clone());
        }
        let graph = match self.store.get_topology().await? {
            Some(topology) => DependencyGraph::build(&topology),
            None => DependencyGraph::default(),
        };
        *self.graph_cache.lock() = Some(graph.clone());
        Ok(graph)
    }

    /// Run all analyzers for one incident and persist the ranked causes
    pub async fn analyze_incident(&self, incident_id: &str) -> Result<()> {
        let Some(mut incident) = self.store.get_incident(incident_id).await? else {
            warn!(incident_id = %incident_id, "incident vanished before analysis");
            return Ok(());
        };

        let mut alerts: Vec<Alert> = Vec::with_capacity(incident.alerts.len());
        for alert_id in &incident.alerts {
            if let Some(alert) = self.store.get_alert(alert_id).await? {
                alerts.push(alert);
            }
        }
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let ctx = AnalysisContext {
            incident: &incident,
            alerts: &alerts,
        };

        let mut results = analyze_rules(&ctx);
        let graph = self.dependency_graph().await?;
        if let Some(topo) = analyze_topology(&incident, &graph) {
            results.push(topo);
        }
        if let Some(escalation) = temporal::detect_escalation(&alerts) {
            results.push(escalation);
        }
        if let Some(burst) = temporal::detect_burst(&alerts) {
            results.push(burst);
        }

        let ranked = rank_results(
            results,
            self.config.min_confidence_threshold,
            self.config.max_root_causes,
        );

        let (root_cause, confidence) = match ranked.first() {
            Some(top) => (Some(top.suspected_cause.clone()), top.confidence),
            None => (None, 0.0),
        };

        incident.rca_results = ranked;
        incident.final_root_cause = root_cause.clone();
        incident.root_cause_confidence = confidence;
        incident.add_note(match &root_cause {
            Some(cause) => format!("rca: {} (confidence {:.2})", cause, confidence),
            None => "rca produced no cause above threshold".to_string(),
        });
        incident.updated_at = chrono::Utc::now();
        let produced = incident.rca_results.len() as u64;
        self.store.update_incident(incident).await?;

        {
            let mut stats = self.stats.write();
            stats.analyses_completed += 1;
            stats.causes_produced += produced;
        }
        debug!(
            incident_id = %incident_id,
            causes = produced,
            "analysis completed"
        );
        self.bus.publish(PipelineEvent::AnalysisCompleted {
            incident_id: incident_id.to_string(),
            root_cause,
            confidence,
        });
        Ok(())
    }

    /// Snapshot of RCA counters
    pub fn stats(&self) -> RcaStats {
        self.stats.read().clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Topology dependency analysis: the device most depended on by the other
/// affected devices is the suspected root
pub fn analyze_topology(incident: &Incident, graph: &DependencyGraph) -> Option<RcaResult> {
    if graph.is_empty() {
        return None;
    }
    let mut best: Option<(&str, usize)> = None;
    for device in &incident.affected_devices {
        let dependents = graph.dependent_count(device, &incident.affected_devices);
        if dependents == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, n)) => dependents > n,
        };
        if better {
            best = Some((device, dependents));
        }
    }
    let (device, dependents) = best?;
    Some(RcaResult {
        rca_id: ids::rca_id(),
        analyzer: "topology".to_string(),
        suspected_cause: format!("dependency root {} in the failure domain", device),
        confidence: (0.6 + 0.1 * dependents as f64).min(0.9),
        contributing_factors: vec![format!(
            "{} affected device(s) depend on {}",
            dependents, device
        )],
        evidence: incident
            .affected_devices
            .iter()
            .filter(|d| graph.depends_on(d, device))
            .map(|d| format!("{} depends on {}", d, device))
            .collect(),
        timeline: Vec::new(),
    })
}

/// Dedup on suspected cause (best confidence wins), rank descending and cap
pub fn rank_results(
    results: Vec<RcaResult>,
    min_confidence: f64,
    max_causes: usize,
) -> Vec<RcaResult> {
    let mut deduped: Vec<RcaResult> = Vec::new();
    for result in results {
        match deduped
            .iter_mut()
            .find(|r| r.suspected_cause == result.suspected_cause)
        {
            Some(existing) => {
                if result.confidence > existing.confidence {
                    *existing = result;
                }
            }
            None => deduped.push(result),
        }
    }
    deduped.retain(|r| r.confidence >= min_confidence);
    deduped.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    deduped.truncate(max_causes);
    deduped
}
