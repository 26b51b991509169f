//! Telemetry collector
//!
//! Dedicated UDP reader tasks hand datagrams into a bounded buffer; a
//! processing tick drains the buffer in batches, normalizes events, and
//! creates or coalesces alerts. The readers never block on downstream work.

use crate::rate_limit::{EventBuffer, RateLimiter};
use crate::{classify, snmp, syslog};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use netheal_common::{
    ids, Alert, AlertStatus, Error, EventBus, PipelineEvent, Result, Severity, TelemetryConfig,
    TelemetrySource, TelemetryStats,
};
use netheal_store::Store;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// A datagram as received from the wire
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub source: TelemetrySource,
    pub peer_ip: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// Common event shape after protocol-specific decoding
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub source: TelemetrySource,
    pub device_ip: String,
    pub event_type: String,
    pub severity: Severity,
    pub message: String,
    pub facility: Option<u8>,
    pub parse_error: bool,
    pub timestamp: DateTime<Utc>,
}

/// UDP telemetry collector feeding the correlation stage
pub struct TelemetryCollector {
    config: TelemetryConfig,
    store: Arc<dyn Store>,
    bus: EventBus,
    buffer: Arc<Mutex<EventBuffer<RawEvent>>>,
    limiter: Arc<Mutex<RateLimiter>>,
    stats: Arc<RwLock<TelemetryStats>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TelemetryCollector {
    pub fn new(config: TelemetryConfig, store: Arc<dyn Store>, bus: EventBus) -> Arc<Self> {
        let buffer = Arc::new(Mutex::new(EventBuffer::new(config.buffer_size)));
        let limiter = Arc::new(Mutex::new(RateLimiter::new(config.max_events_per_second)));
        Arc::new(TelemetryCollector {
            config,
            store,
            bus,
            buffer,
            limiter,
            stats: Arc::new(RwLock::new(TelemetryStats::default())),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Bind the configured listeners and start the processing loop
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!("starting telemetry collector");

        let mut handles = Vec::new();

        if self.config.enabled_sources.contains(&TelemetrySource::Syslog) {
            let socket = bind_with_fallback(
                &self.config.bind_address,
                self.config.syslog_port,
                self.config.syslog_fallback_port,
                "syslog",
            )
            .await?;
            handles.push(self.clone().spawn_reader(socket, TelemetrySource::Syslog));
        }

        if self.config.enabled_sources.contains(&TelemetrySource::Snmp) {
            let socket = bind_with_fallback(
                &self.config.bind_address,
                self.config.snmp_port,
                self.config.snmp_fallback_port,
                "snmp",
            )
            .await?;
            handles.push(self.clone().spawn_reader(socket, TelemetrySource::Snmp));
        }

        let processor = {
            let collector = self.clone();
            tokio::spawn(async move {
                let mut tick = interval(Duration::from_millis(collector.config.tick_interval_ms));
                loop {
                    tick.tick().await;
                    collector.drain_once().await;
                }
            })
        };
        handles.push(processor);

        self.tasks.lock().extend(handles);
        info!("telemetry collector started");
        Ok(())
    }

    /// Stop listeners and processing; the buffer is cleared
    pub fn stop(&self) {
        info!("stopping telemetry collector");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.buffer.lock().clear();
    }

    fn spawn_reader(self: Arc<Self>, socket: UdpSocket, source: TelemetrySource) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        self.accept_datagram(RawEvent {
                            source,
                            peer_ip: addr.ip().to_string(),
                            payload: buf[..len].to_vec(),
                            received_at: Utc::now(),
                        });
                    }
                    Err(e) => {
                        error!("udp receive error on {:?} listener: {}", source, e);
                    }
                }
            }
        })
    }

    /// Admit a datagram into the buffer, applying the ingest rate limit
    pub fn accept_datagram(&self, event: RawEvent) {
        self.stats.write().events_received += 1;
        if !self.limiter.lock().allow() {
            self.stats.write().events_dropped += 1;
            return;
        }
        if self.buffer.lock().push(event) {
            self.stats.write().buffer_overflows += 1;
        }
    }

    /// Drain one batch from the buffer and process it
    pub async fn drain_once(&self) {
        let batch = self.buffer.lock().drain(self.config.batch_size);
        for event in batch {
            if let Err(e) = self.process_event(event).await {
                self.stats.write().normalization_errors += 1;
                warn!("telemetry event dropped: {}", e);
            }
        }
    }

    /// Decode a raw datagram into the common event shape
    pub fn normalize(&self, event: &RawEvent) -> NormalizedEvent {
        match event.source {
            TelemetrySource::Syslog => {
                let text = String::from_utf8_lossy(&event.payload);
                let parsed = syslog::parse(&text);
                let event_type = classify::classify(&parsed.message).to_string();
                NormalizedEvent {
                    source: TelemetrySource::Syslog,
                    device_ip: event.peer_ip.clone(),
                    event_type,
                    severity: classify::syslog_severity(parsed.severity),
                    message: parsed.message,
                    facility: Some(parsed.facility),
                    parse_error: parsed.parse_error,
                    timestamp: event.received_at,
                }
            }
            TelemetrySource::Snmp => {
                let message = snmp::trap_summary(&event.peer_ip, &event.payload);
                debug!("{}", message);
                NormalizedEvent {
                    source: TelemetrySource::Snmp,
                    device_ip: event.peer_ip.clone(),
                    event_type: "snmp_trap".to_string(),
                    severity: Severity::Warning,
                    message,
                    facility: None,
                    parse_error: false,
                    timestamp: event.received_at,
                }
            }
        }
    }

    async fn process_event(&self, raw: RawEvent) -> Result<()> {
        let event = self.normalize(&raw);
        if event.parse_error {
            self.stats.write().parse_errors += 1;
        }

        if !classify::should_alert(&event.event_type, event.severity) {
            debug!(
                event_type = %event.event_type,
                severity = %event.severity.as_str(),
                "event below alerting threshold"
            );
            return Ok(());
        }

        self.create_or_coalesce(event).await
    }

    async fn create_or_coalesce(&self, event: NormalizedEvent) -> Result<()> {
        // Enrich from the device inventory; unknown devices keep the raw IP
        let device = self
            .store
            .get_device_by_ip(&event.device_ip)
            .await
            .map_err(|e| Error::Store(format!("device lookup failed: {}", e)))?;
        let device_name = device
            .as_ref()
            .map(|d| d.hostname.clone())
            .unwrap_or_else(|| event.device_ip.clone());

        // Coalesce with a recent open alert on the same (device, type)
        let window_start =
            Utc::now() - ChronoDuration::seconds(self.config.coalesce_window_seconds);
        if let Some(mut existing) = self
            .store
            .find_active_alert(&device_name, &event.event_type, window_start, None)
            .await?
        {
            existing.coalesce(event.timestamp);
            self.store.update_alert(existing).await?;
            self.stats.write().alerts_coalesced += 1;
            return Ok(());
        }

        let mut details = std::collections::HashMap::new();
        details.insert("source".to_string(), serde_json::json!(event.source));
        if let Some(facility) = event.facility {
            details.insert("facility".to_string(), serde_json::json!(facility));
        }
        if event.parse_error {
            details.insert("parse_error".to_string(), serde_json::json!(true));
        }
        if let Some(d) = &device {
            details.insert("vendor".to_string(), serde_json::json!(d.vendor));
            details.insert("model".to_string(), serde_json::json!(d.model));
            details.insert("site".to_string(), serde_json::json!(d.site));
            details.insert("device_type".to_string(), serde_json::json!(d.device_type));
        }

        let alert = Alert {
            alert_id: ids::alert_id(),
            device: device_name.clone(),
            source_ip: event.device_ip.clone(),
            alert_type: event.event_type.clone(),
            category: classify::category_for(&event.event_type),
            severity: event.severity,
            status: AlertStatus::Open,
            message: event.message,
            first_occurrence: event.timestamp,
            last_occurrence: event.timestamp,
            occurrence_count: 1,
            parent_alert: None,
            incident_id: None,
            correlation_key: Some(format!("{}:{}", device_name, event.event_type)),
            details,
            created_at: Utc::now(),
        };

        let alert_id = alert.alert_id.clone();
        let severity = alert.severity;
        let alert_type = alert.alert_type.clone();
        self.store.insert_alert(alert).await?;
        self.stats.write().alerts_created += 1;

        info!(
            alert_id = %alert_id,
            device = %device_name,
            alert_type = %alert_type,
            "alert created"
        );
        self.bus.publish(PipelineEvent::AlertCreated {
            alert_id,
            device: device_name,
            alert_type,
            severity,
        });
        Ok(())
    }

    /// Snapshot of collector counters
    pub fn stats(&self) -> TelemetryStats {
        let mut stats = self.stats.read().clone();
        stats.buffer_depth = self.buffer.lock().len();
        stats.buffer_overflows = stats.buffer_overflows.max(self.buffer.lock().overflows());
        stats
    }
}

async fn bind_with_fallback(
    bind_address: &str,
    port: u16,
    fallback: u16,
    label: &str,
) -> Result<UdpSocket> {
    match UdpSocket::bind((bind_address, port)).await {
        Ok(socket) => {
            info!("{} listener bound to {}:{}", label, bind_address, port);
            Ok(socket)
        }
        Err(e) => {
            warn!(
                "{} listener cannot bind port {} ({}), falling back to {}",
                label, port, e, fallback
            );
            let socket = UdpSocket::bind((bind_address, fallback))
                .await
                .map_err(|e| {
                    Error::Network(format!(
                        "{} listener failed to bind {}:{}: {}",
                        label, bind_address, fallback, e
                    ))
                })?;
            info!("{} listener bound to {}:{}", label, bind_address, fallback);
            Ok(socket)
        }
    }
}
