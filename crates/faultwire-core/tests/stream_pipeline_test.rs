// Stream adapter: frame reconciliation through `ingest_frame`, and the
// full path from a TCP stream server into the canonical store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use faultwire_api::stream::{BlockMessage, FieldMap, parse_block};
use faultwire_core::{
    AdapterContext, AlarmStatus, CoreError, LogNotifier, MemoryStore, Outcome, Severity,
    StreamAdapter, StreamConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn adapter_on(port: u16) -> (StreamAdapter, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = AdapterContext::new(store.clone(), Arc::new(LogNotifier), Vec::new());
    (StreamAdapter::new(StreamConfig::new("127.0.0.1", port), &ctx), store)
}

fn frame(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn active_frame(serial: &str, occurtime: &str) -> FieldMap {
    frame(&[
        ("Sn", serial),
        ("NeSn", "NE1"),
        ("NeName", "Router-A"),
        ("NeType", "Router"),
        ("AlarmID", "1001"),
        ("AlarmName", "Link Down"),
        ("Severity", "Critical"),
        ("State", "Active"),
        ("Occurtime", occurtime),
    ])
}

fn cleared_frame(serial: &str, clear_time: &str) -> FieldMap {
    let mut fields = active_frame(serial, "2025-01-01 10:00:00");
    fields.insert("State".into(), "Cleared".into());
    fields.insert("ClearTime".into(), clear_time.into());
    fields
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn scenario_frame_creates_then_clear_resolves() {
    let block = "Sn=123\nNeSn=NE1\nNeName=Router-A\nNeType=Router\nAlarmID=1001\n\
                 AlarmName=Link Down\nSeverity=Critical\nState=Active\n\
                 Occurtime=2025-01-01 10:00:00";
    let BlockMessage::Alarm(fields) = parse_block(block) else {
        panic!("block did not parse as an alarm");
    };

    let (adapter, store) = adapter_on(1);
    assert_eq!(adapter.ingest_frame(&fields).await.unwrap(), Outcome::Created);

    let alarm = &store.alarms()[0];
    assert_eq!(alarm.source, "stream");
    assert_eq!(alarm.external_id, "123");
    assert_eq!(alarm.site_id, "NE1");
    assert_eq!(alarm.severity, Severity::Critical);
    assert_eq!(alarm.status, AlarmStatus::Active);
    assert_eq!(alarm.alarm_type, "1001");
    assert_eq!(alarm.description, "Link Down");

    let outcome = adapter
        .ingest_frame(&cleared_frame("123", "2025-01-01 10:30:00"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Resolved);

    let alarms = store.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].status, AlarmStatus::Resolved);
    assert_eq!(
        alarms[0].resolved_at,
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap())
    );
}

#[tokio::test]
async fn clear_without_open_alarm_creates_nothing() {
    let (adapter, store) = adapter_on(1);
    let outcome = adapter
        .ingest_frame(&cleared_frame("9", "2025-01-01 10:30:00"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unmatched);
    assert_eq!(store.alarm_count(), 0);
    assert_eq!(store.stream_record_count(), 1, "raw record is still kept");
}

#[tokio::test]
async fn occurrence_time_only_moves_forward() {
    let (adapter, store) = adapter_on(1);
    adapter
        .ingest_frame(&active_frame("1", "2025-01-01 10:00:00"))
        .await
        .unwrap();

    let earlier = adapter
        .ingest_frame(&active_frame("2", "2025-01-01 09:00:00"))
        .await
        .unwrap();
    assert_eq!(earlier, Outcome::Updated);
    assert_eq!(
        store.alarms()[0].timestamp,
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
    );

    adapter
        .ingest_frame(&active_frame("3", "2025-01-01 11:00:00"))
        .await
        .unwrap();
    assert_eq!(store.alarm_count(), 1);
    assert_eq!(
        store.alarms()[0].timestamp,
        Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn raw_record_upsert_keeps_first_seen() {
    let (adapter, store) = adapter_on(1);
    adapter
        .ingest_frame(&active_frame("77", "2025-01-01 10:00:00"))
        .await
        .unwrap();
    let first = store.stream_record("77").unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut again = active_frame("77", "2025-01-01 10:00:00");
    again.insert("Severity".into(), "Minor".into());
    adapter.ingest_frame(&again).await.unwrap();

    let second = store.stream_record("77").unwrap();
    assert_eq!(store.stream_record_count(), 1);
    assert_eq!(second.first_received_at, first.first_received_at);
    assert!(second.last_received_at > first.last_received_at);
    assert_eq!(second.mapped_severity, Severity::Minor);
    assert_eq!(second.fields.get("Severity").map(String::as_str), Some("Minor"));
}

#[tokio::test]
async fn bad_frames_are_counted_and_skipped() {
    let (adapter, store) = adapter_on(1);

    let mut missing = active_frame("1", "2025-01-01 10:00:00");
    missing.remove("NeType");
    let err = adapter.ingest_frame(&missing).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let mut empty = active_frame("2", "2025-01-01 10:00:00");
    empty.insert("AlarmName".into(), "  ".into());
    assert!(adapter.ingest_frame(&empty).await.is_err());

    let err = adapter
        .ingest_frame(&active_frame("3", "01/01/2025 10:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }));

    adapter
        .ingest_frame(&active_frame("4", "2025-01-01 10:00:00"))
        .await
        .unwrap();

    assert_eq!(store.alarm_count(), 1);
    assert_eq!(store.stream_record_count(), 1);

    // Counters drain even while the stream itself is down.
    let result = adapter.sync();
    adapter.stop().await;
    assert_eq!((result.alarms_processed, result.errors), (1, 3));
}

// ── End to end over TCP ─────────────────────────────────────────────

#[tokio::test]
async fn frames_from_the_wire_reach_the_store() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"<+++>handshake=1<---><+++>Sn=5\nNeSn=NE2\nNeName=Edge\n")
            .await
            .unwrap();
        socket
            .write_all(
                b"NeType=Switch\nAlarmID=7\nAlarmName=Fan Fail\nSeverity=Major\n\
                  State=Active\nOccurtime=2025-02-01 08:00:00<--->",
            )
            .await
            .unwrap();
        // Hold the connection open until the test is done with it.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let (adapter, store) = adapter_on(port);
    adapter.start();
    assert!(adapter.is_running());

    let mut waited = 0;
    while store.alarm_count() == 0 && waited < 100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
    }
    // Counters are bumped right after the save.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = adapter.sync();
    assert!(result.success, "{result:?}");
    assert_eq!(result.alarms_processed, 1);

    let alarm = &store.alarms()[0];
    assert_eq!(alarm.site_name, "Edge");
    assert_eq!(alarm.severity, Severity::Major);

    adapter.stop().await;
    assert!(!adapter.is_running());
    server.abort();
}
