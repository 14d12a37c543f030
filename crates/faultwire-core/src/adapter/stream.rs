// ── Streaming alarm source ──
//
// Persistence pipeline on top of `faultwire_api::stream::StreamClient`.
// The client's connection task feeds one bounded channel; a single
// consumer task drains it, so frames are reconciled strictly in arrival
// order. Each alarm frame is first upserted as a raw record keyed by its
// serial, then reconciled into the canonical store by site + description.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use faultwire_api::stream::probe::PROBE_TIMEOUT;
use faultwire_api::stream::{FieldMap, StreamClient, StreamEvent, StreamState, probe};

use super::AdapterContext;
use super::reconcile::{Outcome, SyncCounters};
use super::vendor::word_severity;
use crate::config::StreamConfig;
use crate::error::CoreError;
use crate::model::{
    AlarmDraft, AlarmStatus, CanonicalAlarm, Severity, StreamRecordInsert, StreamRecordUpdate,
    SyncResult,
};
use crate::store::{AlarmFilter, AlarmStore};

/// Adapter name, also the canonical `source` of stream alarms.
pub const STREAM_SOURCE: &str = "stream";

const EVENT_CHANNEL_SIZE: usize = 1024;

/// Fields every alarm frame must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "Sn",
    "NeSn",
    "NeName",
    "NeType",
    "AlarmID",
    "AlarmName",
    "Severity",
    "State",
    "Occurtime",
];

pub struct StreamAdapter {
    config: StreamConfig,
    client: StreamClient,
    pipeline: Arc<StreamPipeline>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl StreamAdapter {
    pub fn new(config: StreamConfig, ctx: &AdapterContext) -> Self {
        let client = StreamClient::new(config.settings.clone());
        Self {
            config,
            client,
            pipeline: Arc::new(StreamPipeline {
                source: STREAM_SOURCE.to_owned(),
                store: Arc::clone(&ctx.store),
                counters: SyncCounters::default(),
            }),
            consumer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.pipeline.source
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// `host:port` of the stream server.
    pub fn target(&self) -> String {
        format!("{}:{}", self.config.settings.host, self.config.settings.port)
    }

    pub fn state(&self) -> StreamState {
        self.client.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.client.subscribe_state()
    }

    pub fn is_running(&self) -> bool {
        self.client.is_running()
    }

    /// Start the connection and consumer tasks. No-op while running.
    pub fn start(&self) {
        if !self.config.enabled {
            debug!(adapter = %self.name(), "adapter disabled, not starting");
            return;
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        if !self.client.start(tx) {
            return;
        }

        info!(adapter = %self.name(), target = %self.target(), "stream adapter started");
        let handle = tokio::spawn(consume(Arc::clone(&self.pipeline), rx));
        // A previous consumer exits by itself once its channel drains.
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
    }

    /// Drop the connection, then let the consumer finish queued frames.
    pub async fn stop(&self) {
        self.client.stop().await;
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = consumer {
            if let Err(e) = handle.await {
                warn!(adapter = %self.name(), error = %e, "stream consumer ended abnormally");
            }
        }
    }

    /// Short-lived reachability probe; never touches the main connection.
    pub async fn test_connection(&self) -> Result<(), CoreError> {
        let settings = &self.config.settings;
        probe(&settings.host, settings.port, self.config.tls_probe, PROBE_TIMEOUT)
            .await
            .map_err(|e| CoreError::Connection {
                target: self.target(),
                reason: e.to_string(),
            })
    }

    /// Make sure the stream is running and report counters since the last
    /// sync. `success` reflects whether the connection is up right now.
    pub fn sync(&self) -> SyncResult {
        if !self.config.enabled {
            return SyncResult::ok();
        }

        if !self.client.is_running() {
            info!(adapter = %self.name(), "stream task not running, restarting");
            self.start();
        }

        let state = self.client.state();
        let mut result = SyncResult {
            success: state.is_up(),
            ..SyncResult::default()
        };
        if !result.success {
            result.error = Some(format!("stream not connected ({state:?})"));
        }
        self.pipeline.counters.drain_into(&mut result);
        result
    }

    /// Persist and reconcile one alarm frame, as if it had arrived on the wire.
    pub async fn ingest_frame(&self, fields: &FieldMap) -> Result<Outcome, CoreError> {
        self.pipeline.handle(fields).await
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

struct StreamPipeline {
    source: String,
    store: Arc<dyn AlarmStore>,
    counters: SyncCounters,
}

async fn consume(pipeline: Arc<StreamPipeline>, mut rx: mpsc::Receiver<StreamEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Alarm(fields) => {
                // Errors are already logged and counted.
                let _ = pipeline.handle(&fields).await;
            }
            StreamEvent::Connected => info!(adapter = %pipeline.source, "stream connected"),
            StreamEvent::Disconnected { reason } => {
                warn!(adapter = %pipeline.source, %reason, "stream disconnected");
            }
            StreamEvent::Handshake(value) => {
                debug!(adapter = %pipeline.source, %value, "handshake");
            }
        }
    }
    debug!(adapter = %pipeline.source, "stream consumer exiting");
}

impl StreamPipeline {
    async fn handle(&self, fields: &FieldMap) -> Result<Outcome, CoreError> {
        let outcome = self.apply(fields).await;
        self.counters.record(&outcome);
        match &outcome {
            Ok(kind) => debug!(adapter = %self.source, serial = field(fields, "Sn"), ?kind, "frame reconciled"),
            Err(e) => warn!(adapter = %self.source, serial = field(fields, "Sn"), error = %e, "frame dropped"),
        }
        outcome
    }

    async fn apply(&self, fields: &FieldMap) -> Result<Outcome, CoreError> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|key| field(fields, key).is_empty())
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::validation(format!(
                "frame missing required fields: {}",
                missing.join(", ")
            )));
        }

        let occurtime = field(fields, "Occurtime");
        let occurred = parse_occur_time(occurtime).ok_or_else(|| CoreError::Parse {
            message: format!("Occurtime '{occurtime}' is not YYYY-MM-DD HH:MM:SS"),
        })?;

        let now = Utc::now();
        let serial = field(fields, "Sn");
        let severity = stream_severity(field(fields, "Severity"));
        let status = stream_status(field(fields, "State"));

        self.store
            .upsert_stream_record(
                serial,
                StreamRecordUpdate {
                    fields: fields.clone(),
                    mapped_severity: severity,
                    mapped_status: status,
                    received_at: now,
                },
                StreamRecordInsert {
                    first_received_at: now,
                },
            )
            .await?;

        let filter = AlarmFilter::OpenAtSite {
            site_id: field(fields, "NeSn").to_owned(),
            site_name: field(fields, "NeName").to_owned(),
            description: field(fields, "AlarmName").to_owned(),
        };
        let open = self.store.find_one(&filter).await?;

        let outcome = match (status, open) {
            (AlarmStatus::Resolved, Some(mut alarm)) => {
                let cleared_at = fields
                    .get("ClearTime")
                    .and_then(|v| parse_occur_time(v))
                    .unwrap_or(now);
                alarm.resolve(cleared_at, now);
                self.store.save(&alarm).await?;
                Outcome::Resolved
            }
            (AlarmStatus::Resolved, None) => Outcome::Unmatched,
            (_, Some(mut alarm)) => {
                alarm.refresh(severity, status, occurred, now);
                self.store.save(&alarm).await?;
                Outcome::Updated
            }
            (_, None) => {
                let draft = AlarmDraft {
                    external_id: serial.to_owned(),
                    site_id: field(fields, "NeSn").to_owned(),
                    site_name: field(fields, "NeName").to_owned(),
                    severity,
                    status,
                    alarm_type: field(fields, "AlarmID").to_owned(),
                    description: field(fields, "AlarmName").to_owned(),
                    timestamp: occurred,
                };
                let alarm = CanonicalAlarm::from_draft(&self.source, draft, now);
                self.store.save(&alarm).await?;
                Outcome::Created
            }
        };
        Ok(outcome)
    }
}

// ── Field mapping ────────────────────────────────────────────────────

fn field<'a>(fields: &'a FieldMap, key: &str) -> &'a str {
    fields.get(key).map_or("", |v| v.trim())
}

/// `Critical`, `Major`, `Minor`; `Warning` and anything else is minor.
pub fn stream_severity(value: &str) -> Severity {
    word_severity(value)
}

/// `Cleared` wins over `Acknowledged`; anything else is active.
pub fn stream_status(state: &str) -> AlarmStatus {
    if state.contains("Cleared") {
        AlarmStatus::Resolved
    } else if state.contains("Acknowledged") {
        AlarmStatus::Acknowledged
    } else {
        AlarmStatus::Active
    }
}

/// Exactly `YYYY-MM-DD HH:MM:SS`, taken as UTC.
pub fn parse_occur_time(value: &str) -> Option<DateTime<Utc>> {
    let bytes = value.as_bytes();
    if bytes.len() != 19 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b' ',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
