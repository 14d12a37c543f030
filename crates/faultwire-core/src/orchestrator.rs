// ── Adapter orchestrator ──
//
// Owns the adapter registry and the sweep schedule. Cheap to clone; every
// clone drives the same registry. At most one sweep runs at a time: a
// manual `sync_all` during a sweep fails with `SweepInProgress`, an
// auto-sync tick during a sweep is skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{
    Adapter, AdapterContext, AdapterInfo, PollingAdapter, StreamAdapter, TrapAdapter,
};
use crate::config::{IngestConfig, SyncSettings};
use crate::error::CoreError;
use crate::model::SyncResult;
use crate::notify::AlarmNotifier;
use crate::store::AlarmStore;

// ── Reports ──────────────────────────────────────────────────────────

/// Result of one connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), CoreError>> for TestOutcome {
    fn from(result: Result<(), CoreError>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Per-adapter results of one sweep plus their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub results: BTreeMap<String, SyncResult>,
    pub totals: SyncResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    /// A sweep is in progress right now.
    pub running: bool,
    pub adapters: Vec<String>,
    pub next_sync_at: Option<DateTime<Utc>>,
    pub auto_sync_enabled: bool,
}

// ── Orchestrator ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    adapters: DashMap<String, Arc<Adapter>>,
    settings: SyncSettings,
    sweeping: AtomicBool,
    next_sync_at: watch::Sender<Option<DateTime<Utc>>>,
    auto_sync: Mutex<Option<AutoSyncTask>>,
}

struct AutoSyncTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Orchestrator {
    /// An empty orchestrator; add adapters with [`register`](Self::register).
    pub fn new(settings: SyncSettings) -> Self {
        let (next_sync_at, _) = watch::channel(None);
        Self {
            inner: Arc::new(OrchestratorInner {
                adapters: DashMap::new(),
                settings,
                sweeping: AtomicBool::new(false),
                next_sync_at,
                auto_sync: Mutex::new(None),
            }),
        }
    }

    /// Build and register every enabled adapter described by `config`.
    pub fn from_config(
        config: &IngestConfig,
        store: Arc<dyn AlarmStore>,
        notifier: Arc<dyn AlarmNotifier>,
    ) -> Result<Self, CoreError> {
        let orchestrator = Self::new(config.sync.clone());
        let ctx = AdapterContext::new(store, notifier, config.notify.recipients.clone());

        for polling in &config.polling {
            if !polling.enabled {
                info!(adapter = %polling.vendor, "adapter disabled, not registering");
                continue;
            }
            orchestrator.register(PollingAdapter::new(polling, ctx.clone())?);
        }

        match &config.stream {
            Some(stream) if stream.enabled => {
                orchestrator.register(StreamAdapter::new(stream.clone(), &ctx));
            }
            Some(_) => info!(adapter = "stream", "adapter disabled, not registering"),
            None => debug!(adapter = "stream", "not configured"),
        }

        match &config.trap {
            Some(trap) if trap.enabled => {
                orchestrator.register(TrapAdapter::new(trap.clone(), &ctx));
            }
            Some(_) => info!(adapter = "trap", "adapter disabled, not registering"),
            None => debug!(adapter = "trap", "not configured"),
        }

        info!(adapters = orchestrator.inner.adapters.len(), "orchestrator initialized");
        Ok(orchestrator)
    }

    /// Add an adapter under its own name. Returns the adapter it replaced.
    pub fn register(&self, adapter: impl Into<Adapter>) -> Option<Arc<Adapter>> {
        let adapter = adapter.into();
        let name = adapter.name().to_owned();
        let replaced = self.inner.adapters.insert(name.clone(), Arc::new(adapter));
        if replaced.is_some() {
            warn!(adapter = %name, "adapter registered twice, replacing");
        } else {
            debug!(adapter = %name, "adapter registered");
        }
        replaced
    }

    pub fn adapter(&self, name: &str) -> Option<Arc<Adapter>> {
        self.inner.adapters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered names, sorted.
    pub fn adapter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .adapters
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn describe_adapters(&self) -> Vec<AdapterInfo> {
        self.snapshot().iter().map(|a| a.describe()).collect()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    fn snapshot(&self) -> Vec<Arc<Adapter>> {
        let mut adapters: Vec<Arc<Adapter>> = self
            .inner
            .adapters
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        adapters.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        adapters
    }

    // ── Connection tests ─────────────────────────────────────────────

    /// Test every adapter concurrently; one failure never hides another.
    pub async fn test_all(&self) -> BTreeMap<String, TestOutcome> {
        let adapters = self.snapshot();
        let outcomes = join_all(adapters.iter().map(|adapter| async move {
            let result = adapter.test_connection().await;
            if let Err(e) = &result {
                warn!(adapter = %adapter.name(), error = %e, "connection test failed");
            }
            (adapter.name().to_owned(), TestOutcome::from(result))
        }))
        .await;
        outcomes.into_iter().collect()
    }

    pub async fn test_adapter(&self, name: &str) -> Result<(), CoreError> {
        self.require(name)?.test_connection().await
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Run one sweep over every adapter.
    pub async fn sync_all(&self) -> Result<SweepReport, CoreError> {
        let Some(_guard) = SweepGuard::acquire(&self.inner.sweeping) else {
            return Err(CoreError::SweepInProgress);
        };
        Ok(self.sweep().await)
    }

    /// Sync a single adapter outside of any sweep.
    pub async fn sync_adapter(&self, name: &str) -> Result<SyncResult, CoreError> {
        Ok(self.require(name)?.sync().await)
    }

    fn require(&self, name: &str) -> Result<Arc<Adapter>, CoreError> {
        self.adapter(name).ok_or_else(|| CoreError::AdapterNotFound {
            name: name.to_owned(),
        })
    }

    async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        let adapters = self.snapshot();
        let results = join_all(
            adapters
                .iter()
                .map(|adapter| async move { (adapter.name().to_owned(), adapter.sync().await) }),
        )
        .await;

        let mut totals = SyncResult::ok();
        let mut by_name = BTreeMap::new();
        for (name, result) in results {
            totals.absorb(&result);
            by_name.insert(name, result);
        }

        info!(
            adapters = by_name.len(),
            created = totals.alarms_processed,
            updated = totals.alarms_updated,
            errors = totals.errors,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "sweep complete"
        );
        SweepReport {
            results: by_name,
            totals,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start long-lived adapters, then auto-sync if enabled.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.start_adapters().await;
        if self.inner.settings.auto_sync {
            self.start_auto_sync().await?;
        }
        Ok(())
    }

    /// Bring up stream and trap adapters. A failure is logged; the adapter
    /// retries on its next sync.
    pub async fn start_adapters(&self) {
        let adapters = self.snapshot();
        for adapter in adapters.iter().filter(|a| a.is_long_lived()) {
            if let Err(e) = adapter.start().await {
                warn!(adapter = %adapter.name(), error = %e, "adapter failed to start");
            }
        }
    }

    /// Schedule a sweep every `interval`. No-op while already scheduled.
    pub async fn start_auto_sync(&self) -> Result<(), CoreError> {
        let interval = self.inner.settings.interval;
        if interval.is_zero() {
            return Err(CoreError::Config {
                message: "sync interval must be greater than zero".into(),
            });
        }

        let mut slot = self.inner.auto_sync.lock().await;
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(auto_sync_task(self.clone(), interval, cancel.clone()));
        *slot = Some(AutoSyncTask { cancel, handle });
        info!(interval_secs = interval.as_secs(), "auto-sync started");
        Ok(())
    }

    /// Stop scheduling sweeps. A sweep already running is allowed to finish.
    pub async fn stop_auto_sync(&self) {
        let task = self.inner.auto_sync.lock().await.take();
        if let Some(AutoSyncTask { cancel, handle }) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "auto-sync task ended abnormally");
            }
            info!("auto-sync stopped");
        }
        self.inner.next_sync_at.send_replace(None);
    }

    pub async fn is_auto_syncing(&self) -> bool {
        self.inner
            .auto_sync
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stop auto-sync and every adapter.
    pub async fn shutdown(&self) {
        self.stop_auto_sync().await;
        let adapters = self.snapshot();
        join_all(adapters.iter().map(|adapter| adapter.stop())).await;
        info!("orchestrator shut down");
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            running: self.inner.sweeping.load(Ordering::Acquire),
            adapters: self.adapter_names(),
            next_sync_at: *self.inner.next_sync_at.borrow(),
            auto_sync_enabled: self.inner.settings.auto_sync,
        }
    }

    /// Watch the next scheduled sweep time. `None` while not scheduled.
    pub fn subscribe_next_sync(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.next_sync_at.subscribe()
    }

    fn schedule_next(&self, interval: Duration) {
        let next = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|step| Utc::now().checked_add_signed(step));
        self.inner.next_sync_at.send_replace(next);
    }
}

// ── Background task ──────────────────────────────────────────────────

async fn auto_sync_task(orchestrator: Orchestrator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick
    orchestrator.schedule_next(period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match SweepGuard::acquire(&orchestrator.inner.sweeping) {
                    Some(_guard) => {
                        orchestrator.sweep().await;
                    }
                    None => debug!("sweep already running, skipping tick"),
                }
                orchestrator.schedule_next(period);
            }
        }
    }
}

/// Holds the sweep flag; clears it on drop.
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = SweepGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(SweepGuard::acquire(&flag).is_none());
        drop(first);
        assert!(SweepGuard::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn unknown_adapter_is_reported() {
        let orchestrator = Orchestrator::new(SyncSettings::default());
        let err = orchestrator.sync_adapter("nope").await.unwrap_err();
        assert!(matches!(err, CoreError::AdapterNotFound { name } if name == "nope"));
    }

    #[tokio::test]
    async fn empty_sweep_succeeds() {
        let orchestrator = Orchestrator::new(SyncSettings::default());
        let report = orchestrator.sync_all().await.unwrap();
        assert!(report.results.is_empty());
        assert!(report.totals.success);
        assert!(!orchestrator.status().running);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let orchestrator = Orchestrator::new(SyncSettings {
            interval: Duration::ZERO,
            auto_sync: true,
        });
        let err = orchestrator.start_auto_sync().await.unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sync_schedules_and_stops() {
        let orchestrator = Orchestrator::new(SyncSettings {
            interval: Duration::from_secs(60),
            auto_sync: true,
        });
        orchestrator.start_auto_sync().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(orchestrator.is_auto_syncing().await);
        assert!(orchestrator.status().next_sync_at.is_some());

        orchestrator.stop_auto_sync().await;
        assert!(!orchestrator.is_auto_syncing().await);
        assert_eq!(orchestrator.status().next_sync_at, None);
    }
}
