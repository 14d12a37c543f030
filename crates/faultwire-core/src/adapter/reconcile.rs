// ── Identity resolution shared by the adapters ──

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{AlarmDraft, CanonicalAlarm, SyncResult};
use crate::store::{AlarmFilter, AlarmStore};

/// What one incoming record did to the canonical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Resolved,
    /// A clear for an alarm that is not open; nothing written.
    Unmatched,
}

/// Create or merge by `(source, external_id)`.
pub(crate) async fn upsert_by_source(
    store: &dyn AlarmStore,
    source: &str,
    draft: AlarmDraft,
    now: DateTime<Utc>,
) -> Result<(Outcome, CanonicalAlarm), CoreError> {
    let filter = AlarmFilter::by_source(source, &draft.external_id);
    match store.find_one(&filter).await? {
        Some(mut alarm) => {
            alarm.merge(&draft, now);
            store.save(&alarm).await?;
            Ok((Outcome::Updated, alarm))
        }
        None => {
            let alarm = CanonicalAlarm::from_draft(source, draft, now);
            store.save(&alarm).await?;
            Ok((Outcome::Created, alarm))
        }
    }
}

/// Counters accumulated by long-lived adapters between syncs.
#[derive(Debug, Default)]
pub(crate) struct SyncCounters {
    processed: AtomicUsize,
    updated: AtomicUsize,
    errors: AtomicUsize,
}

impl SyncCounters {
    pub(crate) fn record(&self, outcome: &Result<Outcome, CoreError>) {
        let counter = match outcome {
            Ok(Outcome::Created) => &self.processed,
            Ok(Outcome::Updated | Outcome::Resolved) => &self.updated,
            Ok(Outcome::Unmatched) => return,
            Err(_) => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Move the counters into `result`, resetting them to zero.
    pub(crate) fn drain_into(&self, result: &mut SyncResult) {
        result.alarms_processed += self.processed.swap(0, Ordering::Relaxed);
        result.alarms_updated += self.updated.swap(0, Ordering::Relaxed);
        result.errors += self.errors.swap(0, Ordering::Relaxed);
    }
}
