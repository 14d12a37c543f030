// ── Canonical alarm record and lifecycle ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalized severity. Every source scale folds into these three.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    #[default]
    Minor,
}

/// Lifecycle state. `Resolved` is terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlarmStatus {
    #[default]
    Active,
    Acknowledged,
    Resolved,
}

impl AlarmStatus {
    pub fn is_resolved(self) -> bool {
        self == Self::Resolved
    }
}

/// Output of a source's normalization step, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDraft {
    pub external_id: String,
    pub site_id: String,
    pub site_name: String,
    pub severity: Severity,
    pub status: AlarmStatus,
    pub alarm_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Deduplicated cross-source alarm record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAlarm {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub site_id: String,
    pub site_name: String,
    pub severity: Severity,
    pub status: AlarmStatus,
    pub alarm_type: String,
    pub description: String,
    /// Occurrence time. Only ever moves forward.
    pub timestamp: DateTime<Utc>,
    /// Set once, on the transition into `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Owned by the outage-report collaborator; always created `false`.
    pub outage_report_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalAlarm {
    /// New record for an identity seen for the first time.
    pub fn from_draft(source: &str, draft: AlarmDraft, now: DateTime<Utc>) -> Self {
        let resolved_at = draft.status.is_resolved().then_some(now);
        Self {
            id: Uuid::new_v4(),
            source: source.to_owned(),
            external_id: draft.external_id,
            site_id: draft.site_id,
            site_name: draft.site_name,
            severity: draft.severity,
            status: draft.status,
            alarm_type: draft.alarm_type,
            description: draft.description,
            timestamp: draft.timestamp,
            resolved_at,
            outage_report_generated: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a later report of the same identity into this record.
    ///
    /// Descriptive fields take the draft's non-empty values, the timestamp
    /// advances only, and a resolved record stays resolved.
    pub fn merge(&mut self, draft: &AlarmDraft, now: DateTime<Utc>) {
        overwrite_if_present(&mut self.site_id, &draft.site_id);
        overwrite_if_present(&mut self.site_name, &draft.site_name);
        overwrite_if_present(&mut self.alarm_type, &draft.alarm_type);
        overwrite_if_present(&mut self.description, &draft.description);
        self.severity = draft.severity;
        self.advance_timestamp(draft.timestamp);
        self.set_status(draft.status, now);
        self.updated_at = now;
    }

    /// Refresh severity and status from a stream report on an open alarm.
    pub fn refresh(
        &mut self,
        severity: Severity,
        status: AlarmStatus,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.severity = severity;
        self.advance_timestamp(timestamp);
        self.set_status(status, now);
        self.updated_at = now;
    }

    /// Mark resolved. `resolved_at` keeps its first value.
    pub fn resolve(&mut self, cleared_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.set_status(AlarmStatus::Resolved, cleared_at);
        self.updated_at = now;
    }

    fn advance_timestamp(&mut self, timestamp: DateTime<Utc>) {
        if timestamp > self.timestamp {
            self.timestamp = timestamp;
        }
    }

    fn set_status(&mut self, status: AlarmStatus, resolved_at: DateTime<Utc>) {
        if self.status.is_resolved() {
            return;
        }
        self.status = status;
        if status.is_resolved() && self.resolved_at.is_none() {
            self.resolved_at = Some(resolved_at);
        }
    }
}

fn overwrite_if_present(target: &mut String, value: &str) {
    if !value.is_empty() && target != value {
        value.clone_into(target);
    }
}
