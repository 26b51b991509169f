//! Service wiring for the autonomous healing pipeline
//!
//! `HealingService` constructs the whole component graph explicitly (store,
//! event bus, four stages and the orchestrator) with no hidden global
//! state, starts the workers, and drives the per-incident pipeline state
//! machine from the event stream.

use crate::pipeline::{HealingPipeline, PipelineSnapshot, PipelineStage};
use chrono::Utc;
use netheal_common::{
    Config, CorrelationStats, EventBus, IdGenerator, IncidentState, PipelineEvent, RcaStats,
    RemediationStats, Result, TelemetryStats,
};
use netheal_correlation::CorrelationEngine;
use netheal_rca::RcaEngine;
use netheal_remediation::{Executor, RemediationEngine};
use netheal_store::Store;
use netheal_telemetry::TelemetryCollector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

/// Aggregated status snapshot across all components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub telemetry: TelemetryStats,
    pub correlation: CorrelationStats,
    pub rca: RcaStats,
    pub remediation: RemediationStats,
    pub pipeline: PipelineSnapshot,
}

/// The constructed healing pipeline graph
pub struct HealingService {
    config: Config,
    store: Arc<dyn Store>,
    bus: EventBus,
    collector: Arc<TelemetryCollector>,
    correlator: Arc<CorrelationEngine>,
    rca: Arc<RcaEngine>,
    remediation: Arc<RemediationEngine>,
    pipeline: Arc<HealingPipeline>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HealingService {
    /// Build the component graph over a store and an executor
    pub fn new(config: Config, store: Arc<dyn Store>, executor: Arc<dyn Executor>) -> Arc<Self> {
        let bus = EventBus::default();
        let ids = Arc::new(IdGenerator::new());

        let collector =
            TelemetryCollector::new(config.telemetry.clone(), store.clone(), bus.clone());
        let correlator = CorrelationEngine::new(
            config.correlation.clone(),
            store.clone(),
            bus.clone(),
            ids.clone(),
        );
        let rca = RcaEngine::new(config.rca.clone(), store.clone(), bus.clone());
        let remediation = RemediationEngine::new(
            config.remediation.clone(),
            store.clone(),
            bus.clone(),
            ids,
            executor,
        );
        let pipeline = Arc::new(HealingPipeline::new(config.orchestrator.clone()));

        Arc::new(HealingService {
            config,
            store,
            bus,
            collector,
            correlator,
            rca,
            remediation,
            pipeline,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start every stage worker plus the orchestrator loops
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!("starting healing service");

        self.collector.clone().start().await?;
        self.correlator.clone().start();
        self.rca.clone().start();
        self.remediation.clone().start();

        let subscriber = {
            let service = self.clone();
            let mut rx = service.bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => service.handle_event(event).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("orchestrator lagged by {} events", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let sweeper = {
            let service = self.clone();
            tokio::spawn(async move {
                let mut tick = interval(Duration::from_secs(
                    service.config.orchestrator.sweep_interval_seconds,
                ));
                loop {
                    tick.tick().await;
                    let timed_out = service.pipeline.sweep(Utc::now());
                    for incident_id in timed_out {
                        warn!(incident_id = %incident_id, "pipeline forcibly failed on timeout");
                    }
                }
            })
        };

        self.tasks.lock().extend([subscriber, sweeper]);
        info!("healing service started");
        Ok(())
    }

    /// Graceful stop: no new work is accepted, queues are cleared and all
    /// worker timers are cancelled
    pub fn stop(&self) {
        info!("stopping healing service");
        self.collector.stop();
        self.correlator.stop();
        self.rca.stop();
        self.remediation.stop();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("healing service stopped");
    }

    /// Drive the pipeline state machine from one event
    pub async fn handle_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::AlertCreated { .. } | PipelineEvent::AlertSuppressed { .. } => {}
            PipelineEvent::IncidentCreated { incident_id, .. } => {
                self.pipeline.track(&incident_id);
                self.pipeline
                    .advance(&incident_id, PipelineStage::Rca, "queued for analysis");
            }
            PipelineEvent::IncidentUpdated { incident_id } => {
                // Updates re-queue analysis but do not regress the stage
                self.pipeline.track(&incident_id);
            }
            PipelineEvent::AnalysisCompleted { incident_id, .. } => {
                self.pipeline.advance(
                    &incident_id,
                    PipelineStage::RcaCompleted,
                    "analysis completed",
                );
                self.pipeline.advance(
                    &incident_id,
                    PipelineStage::Remediation,
                    "selecting remediation policy",
                );
            }
            PipelineEvent::ActionGenerated {
                incident_id,
                action_id,
                ..
            } => {
                self.pipeline.set_current_action(&incident_id, &action_id);
                self.pipeline.advance(
                    &incident_id,
                    PipelineStage::ActionGenerated,
                    "action generated",
                );
            }
            PipelineEvent::ActionQueued { incident_id, .. } => {
                self.pipeline
                    .advance(&incident_id, PipelineStage::ActionQueued, "action queued");
            }
            PipelineEvent::ApprovalRequired { incident_id, .. } => {
                self.pipeline.advance(
                    &incident_id,
                    PipelineStage::ApprovalRequired,
                    "waiting for approval",
                );
            }
            PipelineEvent::ActionCompleted {
                incident_id,
                status,
                success,
                ..
            } => {
                if success {
                    if let Err(e) = self.close_incident(&incident_id).await {
                        warn!(incident_id = %incident_id, "failed to close incident: {}", e);
                    }
                    self.pipeline.complete(&incident_id, true, None);
                } else {
                    self.pipeline.complete(
                        &incident_id,
                        false,
                        Some(format!("action ended as {:?}", status)),
                    );
                }
            }
        }
    }

    /// Close a healed incident in the store
    async fn close_incident(&self, incident_id: &str) -> Result<()> {
        let Some(mut incident) = self.store.get_incident(incident_id).await? else {
            return Ok(());
        };
        if !incident.state.is_open() {
            return Ok(());
        }
        incident.state = IncidentState::Resolved;
        incident.sla.resolved_at = Some(Utc::now());
        incident.add_note("closed by orchestrator after successful remediation");
        incident.updated_at = Utc::now();
        self.store.update_incident(incident).await?;
        info!(incident_id = %incident_id, "incident resolved");
        Ok(())
    }

    /// Aggregated component status
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            telemetry: self.collector.stats(),
            correlation: self.correlator.stats(),
            rca: self.rca.stats(),
            remediation: self.remediation.stats(),
            pipeline: self.pipeline.snapshot(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn collector(&self) -> &Arc<TelemetryCollector> {
        &self.collector
    }

    pub fn correlator(&self) -> &Arc<CorrelationEngine> {
        &self.correlator
    }

    pub fn rca(&self) -> &Arc<RcaEngine> {
        &self.rca
    }

    pub fn remediation(&self) -> &Arc<RemediationEngine> {
        &self.remediation
    }

    pub fn pipeline(&self) -> &Arc<HealingPipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
