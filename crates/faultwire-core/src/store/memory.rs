// ── In-memory reference store ──

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{AlarmFilter, AlarmStore, StoreError};
use crate::model::{CanonicalAlarm, StreamRawAlarm, StreamRecordInsert, StreamRecordUpdate};

/// `DashMap`-backed store used by the binary and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    alarms: DashMap<Uuid, CanonicalAlarm>,
    stream_records: DashMap<String, StreamRawAlarm>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All canonical alarms, oldest first.
    pub fn alarms(&self) -> Vec<CanonicalAlarm> {
        let mut alarms: Vec<CanonicalAlarm> =
            self.alarms.iter().map(|entry| entry.value().clone()).collect();
        alarms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        alarms
    }

    pub fn alarm_count(&self) -> usize {
        self.alarms.len()
    }

    pub fn stream_record(&self, serial: &str) -> Option<StreamRawAlarm> {
        self.stream_records.get(serial).map(|r| r.value().clone())
    }

    pub fn stream_record_count(&self) -> usize {
        self.stream_records.len()
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn find_one(&self, filter: &AlarmFilter) -> Result<Option<CanonicalAlarm>, StoreError> {
        Ok(self
            .alarms
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, alarm: &CanonicalAlarm) -> Result<(), StoreError> {
        self.alarms.insert(alarm.id, alarm.clone());
        Ok(())
    }

    async fn upsert_stream_record(
        &self,
        serial: &str,
        set: StreamRecordUpdate,
        set_on_insert: StreamRecordInsert,
    ) -> Result<StreamRawAlarm, StoreError> {
        let record = match self.stream_records.entry(serial.to_owned()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply(set);
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry
                .insert(StreamRawAlarm::insert(serial, set, set_on_insert))
                .clone(),
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AlarmDraft, AlarmStatus, Severity};

    fn update(value: &str, minute: u32) -> StreamRecordUpdate {
        StreamRecordUpdate {
            fields: BTreeMap::from([("State".to_owned(), value.to_owned())]),
            mapped_severity: Severity::Major,
            mapped_status: AlarmStatus::Active,
            received_at: Utc.with_ymd_and_hms(2025, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn stream_upsert_keeps_first_received() {
        let store = MemoryStore::new();
        let first = StreamRecordInsert {
            first_received_at: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
        };
        let second = StreamRecordInsert {
            first_received_at: Utc.with_ymd_and_hms(2025, 1, 1, 10, 5, 0).unwrap(),
        };

        store.upsert_stream_record("7", update("Active", 0), first).await.unwrap();
        let record = store
            .upsert_stream_record("7", update("Cleared", 5), second)
            .await
            .unwrap();

        assert_eq!(store.stream_record_count(), 1);
        assert_eq!(record.fields["State"], "Cleared");
        assert_eq!(record.first_received_at, first.first_received_at);
        assert_eq!(record.last_received_at, second.first_received_at);
    }

    #[tokio::test]
    async fn open_at_site_skips_resolved() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let draft = AlarmDraft {
            external_id: "1".into(),
            site_id: "NE1".into(),
            site_name: "Router-A".into(),
            severity: Severity::Critical,
            status: AlarmStatus::Resolved,
            alarm_type: "LINK".into(),
            description: "Link Down".into(),
            timestamp: now,
        };
        store
            .save(&CanonicalAlarm::from_draft("stream", draft, now))
            .await
            .unwrap();

        let filter = AlarmFilter::OpenAtSite {
            site_id: "NE1".into(),
            site_name: "Router-A".into(),
            description: "Link Down".into(),
        };
        assert_eq!(store.find_one(&filter).await.unwrap(), None);
        assert!(
            store
                .find_one(&AlarmFilter::by_source("stream", "1"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
