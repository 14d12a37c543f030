// ── Sync outcome ──

use serde::{Deserialize, Serialize};

/// Outcome of one adapter sync. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    /// Records that created a new canonical alarm.
    pub alarms_processed: usize,
    /// Records merged into (or resolving) an existing alarm.
    pub alarms_updated: usize,
    /// Records dropped because of a record-level failure.
    pub errors: usize,
    /// Adapter-level failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Add another result's counters into this one.
    ///
    /// `success` stays true only while every absorbed result succeeded.
    pub fn absorb(&mut self, other: &SyncResult) {
        self.success &= other.success;
        self.alarms_processed += other.alarms_processed;
        self.alarms_updated += other.alarms_updated;
        self.errors += other.errors;
    }
}
