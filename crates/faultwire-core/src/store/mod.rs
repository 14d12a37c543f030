// ── Canonical alarm store ──
//
// The persistence engine is an external collaborator; the core only needs
// find-by-key, save, and an idempotent upsert for raw stream records.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{CanonicalAlarm, StreamRawAlarm, StreamRecordInsert, StreamRecordUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Lookup keys understood by [`AlarmStore::find_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmFilter {
    /// Source-scoped identity.
    BySource { source: String, external_id: String },
    /// A non-resolved alarm at a site with a given description.
    OpenAtSite {
        site_id: String,
        site_name: String,
        description: String,
    },
}

impl AlarmFilter {
    pub fn by_source(source: &str, external_id: &str) -> Self {
        Self::BySource {
            source: source.to_owned(),
            external_id: external_id.to_owned(),
        }
    }

    pub fn matches(&self, alarm: &CanonicalAlarm) -> bool {
        match self {
            Self::BySource {
                source,
                external_id,
            } => alarm.source == *source && alarm.external_id == *external_id,
            Self::OpenAtSite {
                site_id,
                site_name,
                description,
            } => {
                !alarm.status.is_resolved()
                    && alarm.site_id == *site_id
                    && alarm.site_name == *site_name
                    && alarm.description == *description
            }
        }
    }
}

#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// First matching alarm, oldest first when several match.
    async fn find_one(&self, filter: &AlarmFilter) -> Result<Option<CanonicalAlarm>, StoreError>;

    /// Insert or replace by `alarm.id`.
    async fn save(&self, alarm: &CanonicalAlarm) -> Result<(), StoreError>;

    /// Upsert the raw record for `serial`: `set` is always applied,
    /// `set_on_insert` only when the serial is new.
    async fn upsert_stream_record(
        &self,
        serial: &str,
        set: StreamRecordUpdate,
        set_on_insert: StreamRecordInsert,
    ) -> Result<StreamRawAlarm, StoreError>;
}
