// ── Domain model ──
//
// Canonical alarm record, the raw stream record, and sync outcomes.

pub mod alarm;
pub mod raw;
pub mod sync;

pub use alarm::{AlarmDraft, AlarmStatus, CanonicalAlarm, Severity};
pub use raw::{StreamRawAlarm, StreamRecordInsert, StreamRecordUpdate};
pub use sync::SyncResult;
