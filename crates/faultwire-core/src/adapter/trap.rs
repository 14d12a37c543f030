// ── SNMP trap source ──
//
// Decoded traps are flattened through a static OID table into named
// fields, turned into a draft, and upserted by `(trap, alarmId)`. A trap
// that cannot be mapped is logged and dropped; the listener keeps going.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use faultwire_api::trap::{
    SNMP_TRAP_OID, SYS_UPTIME_OID, TrapListener, TrapMessage, TrapPdu, check_bind,
};

use super::AdapterContext;
use super::reconcile::{Outcome, SyncCounters, upsert_by_source};
use super::vendor::{code_severity, parse_time_text};
use crate::config::TrapConfig;
use crate::error::CoreError;
use crate::model::{AlarmDraft, AlarmStatus, SyncResult};
use crate::store::AlarmStore;

/// Adapter name, also the canonical `source` of trap alarms.
pub const TRAP_SOURCE: &str = "trap";

const EVENT_CHANNEL_SIZE: usize = 1024;

/// Varbind OID → field name.
pub const OID_FIELDS: [(&str, &str); 11] = [
    ("1.3.6.1.4.1.56789.1.1.1", "alarmId"),
    ("1.3.6.1.4.1.56789.1.1.2", "siteId"),
    ("1.3.6.1.4.1.56789.1.1.3", "siteName"),
    ("1.3.6.1.4.1.56789.1.1.4", "severity"),
    ("1.3.6.1.4.1.56789.1.1.5", "alarmType"),
    ("1.3.6.1.4.1.56789.1.1.6", "description"),
    ("1.3.6.1.4.1.56789.1.1.7", "cleared"),
    ("1.3.6.1.4.1.56789.1.1.8", "acknowledged"),
    ("1.3.6.1.4.1.56789.1.1.9", "eventTime"),
    (SNMP_TRAP_OID, "trapOid"),
    (SYS_UPTIME_OID, "uptime"),
];

pub type TrapFields = BTreeMap<String, String>;

pub struct TrapAdapter {
    config: TrapConfig,
    listener: TrapListener,
    pipeline: Arc<TrapPipeline>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl TrapAdapter {
    pub fn new(config: TrapConfig, ctx: &AdapterContext) -> Self {
        let listener = TrapListener::new(config.settings.clone());
        Self {
            config,
            listener,
            pipeline: Arc::new(TrapPipeline {
                source: TRAP_SOURCE.to_owned(),
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

    /// Configured bind address.
    pub fn target(&self) -> String {
        self.config.settings.bind.to_string()
    }

    pub async fn is_running(&self) -> bool {
        self.listener.is_running().await
    }

    /// Address the socket is actually bound to, while running.
    pub async fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.local_addr().await
    }

    /// Bind and start consuming traps. No-op while running.
    pub async fn start(&self) -> Result<(), CoreError> {
        if !self.config.enabled {
            debug!(adapter = %self.name(), "adapter disabled, not starting");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (addr, spawned) = self.listener.start(tx).await.map_err(|e| CoreError::Connection {
            target: self.target(),
            reason: e.to_string(),
        })?;
        // Another caller already owns the consumer.
        if !spawned {
            return Ok(());
        }

        info!(adapter = %self.name(), %addr, "trap adapter started");
        let handle = tokio::spawn(consume(Arc::clone(&self.pipeline), rx));
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        self.listener.stop().await;
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = consumer {
            if let Err(e) = handle.await {
                warn!(adapter = %self.name(), error = %e, "trap consumer ended abnormally");
            }
        }
    }

    /// The socket is bound, or the address can be bound right now.
    pub async fn test_connection(&self) -> Result<(), CoreError> {
        if self.listener.local_addr().await.is_some() {
            return Ok(());
        }
        check_bind(self.config.settings.bind)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::Connection {
                target: self.target(),
                reason: e.to_string(),
            })
    }

    /// Make sure the listener is running and report counters since the
    /// last sync.
    pub async fn sync(&self) -> SyncResult {
        if !self.config.enabled {
            return SyncResult::ok();
        }
        if let Err(e) = self.start().await {
            warn!(adapter = %self.name(), error = %e, "trap listener could not start");
            return SyncResult::failed(e);
        }

        let mut result = SyncResult::ok();
        self.pipeline.counters.drain_into(&mut result);
        result
    }

    /// Map and persist one decoded trap, as if it had arrived on the socket.
    pub async fn ingest_trap(&self, pdu: &TrapPdu) -> Result<Outcome, CoreError> {
        self.pipeline.handle(pdu).await
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

struct TrapPipeline {
    source: String,
    store: Arc<dyn AlarmStore>,
    counters: SyncCounters,
}

async fn consume(pipeline: Arc<TrapPipeline>, mut rx: mpsc::Receiver<TrapMessage>) {
    while let Some(TrapMessage { peer, pdu }) = rx.recv().await {
        debug!(adapter = %pipeline.source, %peer, "trap dequeued");
        // Errors are already logged and counted.
        let _ = pipeline.handle(&pdu).await;
    }
    debug!(adapter = %pipeline.source, "trap consumer exiting");
}

impl TrapPipeline {
    async fn handle(&self, pdu: &TrapPdu) -> Result<Outcome, CoreError> {
        let outcome = self.apply(pdu).await;
        self.counters.record(&outcome);
        if let Err(e) = &outcome {
            warn!(adapter = %self.source, error = %e, "trap dropped");
        }
        outcome
    }

    async fn apply(&self, pdu: &TrapPdu) -> Result<Outcome, CoreError> {
        let now = Utc::now();
        let fields = trap_fields(pdu);
        let draft = trap_draft(&fields, now)?;
        let serial = draft.external_id.clone();
        let (outcome, _) = upsert_by_source(self.store.as_ref(), &self.source, draft, now).await?;
        debug!(adapter = %self.source, %serial, ?outcome, "trap reconciled");
        Ok(outcome)
    }
}

// ── Mapping ──────────────────────────────────────────────────────────

/// Field name for a varbind OID, with or without a trailing `.0` instance.
pub fn field_for_oid(oid: &str) -> Option<&'static str> {
    OID_FIELDS.iter().find_map(|(prefix, name)| {
        let matches = oid == *prefix || oid.strip_prefix(prefix) == Some(".0");
        matches.then_some(*name)
    })
}

/// Flatten the varbinds we know about into named fields.
pub fn trap_fields(pdu: &TrapPdu) -> TrapFields {
    let mut fields: TrapFields = pdu
        .varbinds
        .iter()
        .filter_map(|vb| Some((field_for_oid(&vb.oid)?.to_owned(), vb.value.to_string())))
        .collect();
    if !fields.contains_key("trapOid") {
        if let Some(oid) = pdu.trap_oid() {
            fields.insert("trapOid".to_owned(), oid);
        }
    }
    fields
}

/// Build a draft from mapped trap fields. `alarmId` is required.
pub fn trap_draft(fields: &TrapFields, now: DateTime<Utc>) -> Result<AlarmDraft, CoreError> {
    let get = |key: &str| fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let external_id = get("alarmId")
        .ok_or_else(|| CoreError::validation("trap carries no alarmId varbind"))?
        .to_owned();

    let status = if get("cleared").is_some_and(flag) {
        AlarmStatus::Resolved
    } else if get("acknowledged").is_some_and(flag) {
        AlarmStatus::Acknowledged
    } else {
        AlarmStatus::Active
    };

    Ok(AlarmDraft {
        external_id,
        site_id: get("siteId").unwrap_or_default().to_owned(),
        site_name: get("siteName").unwrap_or_default().to_owned(),
        severity: get("severity")
            .and_then(|v| v.parse::<i64>().ok())
            .map_or_else(Default::default, code_severity),
        status,
        alarm_type: get("alarmType")
            .or_else(|| get("trapOid"))
            .unwrap_or_default()
            .to_owned(),
        description: get("description").unwrap_or_default().to_owned(),
        timestamp: get("eventTime").and_then(parse_time_text).unwrap_or(now),
    })
}

/// `1`, `true`, `yes` (any case).
fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}
