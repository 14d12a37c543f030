//! Alarm ingestion core between `faultwire-api` and the `faultwire` binary.
//!
//! - **[`Orchestrator`]**: Registry of adapters with concurrent
//!   [`sync_all`](Orchestrator::sync_all) sweeps, connection tests, and an
//!   auto-sync schedule. One sweep at a time.
//!
//! - **[`Adapter`]**: Closed set of sources: polled REST vendors
//!   ([`PollingAdapter`]), the block-framed TCP stream ([`StreamAdapter`]),
//!   and the SNMP trap listener ([`TrapAdapter`]).
//!
//! - **Domain model** ([`model`]): [`CanonicalAlarm`] with its merge and
//!   resolve rules, the raw stream record, and [`SyncResult`].
//!
//! - **Collaborators**: [`AlarmStore`] for persistence and
//!   [`AlarmNotifier`] for new-alarm notices. [`MemoryStore`],
//!   [`LogNotifier`], and [`WebhookNotifier`] ship in-crate.

pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{
    Adapter, AdapterContext, AdapterInfo, AdapterKind, Outcome, PollingAdapter, StreamAdapter,
    TrapAdapter, VendorKind,
};
pub use config::{
    IngestConfig, NotifySettings, PollingConfig, StreamConfig, SyncSettings, TlsVerification,
    TrapConfig,
};
pub use error::CoreError;
pub use model::{AlarmDraft, AlarmStatus, CanonicalAlarm, Severity, StreamRawAlarm, SyncResult};
pub use notify::{AlarmNotifier, LogNotifier, NewAlarmNotice, WebhookNotifier};
pub use orchestrator::{Orchestrator, OrchestratorStatus, SweepReport, TestOutcome};
pub use store::{AlarmFilter, AlarmStore, MemoryStore, StoreError};
