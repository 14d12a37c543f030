// ── Stream raw alarm record ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alarm::{AlarmStatus, Severity};

/// Every field of the latest frame for one stream serial (`Sn`).
///
/// Kept regardless of lifecycle state so the raw feed can be audited
/// independently of canonical reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRawAlarm {
    pub serial: String,
    pub fields: BTreeMap<String, String>,
    pub mapped_severity: Severity,
    pub mapped_status: AlarmStatus,
    pub first_received_at: DateTime<Utc>,
    pub last_received_at: DateTime<Utc>,
}

/// Values overwritten on every upsert.
#[derive(Debug, Clone)]
pub struct StreamRecordUpdate {
    pub fields: BTreeMap<String, String>,
    pub mapped_severity: Severity,
    pub mapped_status: AlarmStatus,
    pub received_at: DateTime<Utc>,
}

/// Values written only when the serial is new.
#[derive(Debug, Clone, Copy)]
pub struct StreamRecordInsert {
    pub first_received_at: DateTime<Utc>,
}

impl StreamRawAlarm {
    pub fn insert(serial: &str, set: StreamRecordUpdate, on_insert: StreamRecordInsert) -> Self {
        Self {
            serial: serial.to_owned(),
            fields: set.fields,
            mapped_severity: set.mapped_severity,
            mapped_status: set.mapped_status,
            first_received_at: on_insert.first_received_at,
            last_received_at: set.received_at,
        }
    }

    pub fn apply(&mut self, set: StreamRecordUpdate) {
        self.fields = set.fields;
        self.mapped_severity = set.mapped_severity;
        self.mapped_status = set.mapped_status;
        self.last_received_at = set.received_at;
    }
}
