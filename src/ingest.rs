use crate::config::IngestConfig;
use crate::error::AppError;
use crate::models::{round_temperature, Measurement};
use crate::mqtt::topic_matches;
use crate::repositories::MeasurementStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureKind {
    Air,
    Water,
}

impl TemperatureKind {
    pub fn is_water(self) -> bool {
        matches!(self, TemperatureKind::Water)
    }
}

impl fmt::Display for TemperatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureKind::Air => f.write_str("air"),
            TemperatureKind::Water => f.write_str("water"),
        }
    }
}

/// Telemetry arrives from devices; commands are our own retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Telemetry,
    Command,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Telemetry => f.write_str("telemetry"),
            Channel::Command => f.write_str("command"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub topic: String,
    pub kind: TemperatureKind,
    pub channel: Channel,
}

pub fn routes(cfg: &IngestConfig) -> Vec<Route> {
    let route = |topic: &str, kind, channel| Route {
        topic: topic.to_string(),
        kind,
        channel,
    };
    vec![
        route(&cfg.temperature_topic, TemperatureKind::Air, Channel::Telemetry),
        route(&cfg.water_temperature_topic, TemperatureKind::Water, Channel::Telemetry),
        route(&cfg.temperature_command_topic, TemperatureKind::Air, Channel::Command),
        route(&cfg.water_temperature_command_topic, TemperatureKind::Water, Channel::Command),
    ]
}

pub fn route_for<'a>(routes: &'a [Route], topic: &str) -> Option<&'a Route> {
    routes.iter().find(|r| topic_matches(&r.topic, topic))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Origin {
    #[serde(default)]
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Payload shared by all four inbound message shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemperatureMessage {
    pub origin: Origin,
    pub temp: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(Measurement),
    Duplicate,
    Malformed,
    MissingTimestamp,
    Invalid,
    Failed,
}

/// Counters per ingestion outcome. Dropped messages are otherwise only
/// visible in the logs.
#[derive(Debug, Default)]
pub struct IngestStats {
    stored: AtomicU64,
    duplicates: AtomicU64,
    malformed: AtomicU64,
    missing_timestamp: AtomicU64,
    invalid: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatsSnapshot {
    pub stored: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub missing_timestamp: u64,
    pub invalid: u64,
    pub failed: u64,
}

impl IngestStats {
    fn record(&self, outcome: &IngestOutcome) {
        let counter = match outcome {
            IngestOutcome::Stored(_) => &self.stored,
            IngestOutcome::Duplicate => &self.duplicates,
            IngestOutcome::Malformed => &self.malformed,
            IngestOutcome::MissingTimestamp => &self.missing_timestamp,
            IngestOutcome::Invalid => &self.invalid,
            IngestOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            stored: self.stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            missing_timestamp: self.missing_timestamp.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Turns inbound messages into stored measurements. Never fails: every
/// problem is logged, counted and the message dropped.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MeasurementStore>,
    stats: Arc<IngestStats>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self {
            store,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Dispatches by topic. Returns `None` if no route matches.
    pub async fn handle_message(
        &self,
        routes: &[Route],
        topic: &str,
        payload: &[u8],
    ) -> Option<IngestOutcome> {
        let Some(route) = route_for(routes, topic) else {
            debug!(topic = %topic, "no route for topic; ignoring message");
            return None;
        };
        Some(self.ingest(route.kind, route.channel, payload).await)
    }

    pub async fn handle_temperature_telemetry(&self, payload: &[u8]) -> IngestOutcome {
        self.ingest(TemperatureKind::Air, Channel::Telemetry, payload)
            .await
    }

    pub async fn handle_water_temperature_telemetry(&self, payload: &[u8]) -> IngestOutcome {
        self.ingest(TemperatureKind::Water, Channel::Telemetry, payload)
            .await
    }

    pub async fn handle_store_temperature_command(&self, payload: &[u8]) -> IngestOutcome {
        self.ingest(TemperatureKind::Air, Channel::Command, payload)
            .await
    }

    pub async fn handle_store_water_temperature_command(&self, payload: &[u8]) -> IngestOutcome {
        self.ingest(TemperatureKind::Water, Channel::Command, payload)
            .await
    }

    async fn ingest(&self, kind: TemperatureKind, channel: Channel, payload: &[u8]) -> IngestOutcome {
        let outcome = self.store_message(kind, channel, payload).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn store_message(
        &self,
        kind: TemperatureKind,
        channel: Channel,
        payload: &[u8],
    ) -> IngestOutcome {
        debug!(%channel, %kind, body = %String::from_utf8_lossy(payload), "message received");

        let msg: TemperatureMessage = match serde_json::from_slice(payload) {
            Ok(msg) => msg,
            Err(e) => {
                error!(%channel, %kind, error = %e, "failed to unmarshal message");
                return IngestOutcome::Malformed;
            }
        };

        if msg.timestamp.trim().is_empty() {
            warn!(%channel, %kind, device = %msg.origin.device, "ignored temperature message with an empty timestamp");
            return IngestOutcome::MissingTimestamp;
        }

        let result = self
            .store
            .add_measurement(
                &msg.origin.device,
                msg.origin.latitude,
                msg.origin.longitude,
                round_temperature(msg.temp),
                kind.is_water(),
                &msg.timestamp,
            )
            .await;

        match result {
            Ok(stored) => {
                debug!(%channel, %kind, device = %stored.device, id = stored.id, "measurement stored");
                IngestOutcome::Stored(stored)
            }
            Err(AppError::Conflict { device, observed_at }) => {
                info!(%channel, %kind, device = %device, %observed_at, "duplicate measurement ignored");
                IngestOutcome::Duplicate
            }
            Err(AppError::Validation(reason)) => {
                warn!(%channel, %kind, device = %msg.origin.device, %reason, "invalid temperature message dropped");
                IngestOutcome::Invalid
            }
            Err(e) => {
                error!(%channel, %kind, device = %msg.origin.device, error = %e, "failed to store measurement");
                IngestOutcome::Failed
            }
        }
    }
}
