// ── Polled REST source ──
//
// One adapter per configured vendor profile. A sync probes the health
// endpoint, fetches the alarm list, and reconciles each record on its own:
// a bad record is counted and skipped, never fatal to the batch.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use faultwire_api::rest::FaultApiClient;

use super::AdapterContext;
use super::reconcile::{Outcome, upsert_by_source};
use super::vendor::VendorKind;
use crate::config::PollingConfig;
use crate::error::CoreError;
use crate::model::{AlarmDraft, CanonicalAlarm, SyncResult};
use crate::notify::NewAlarmNotice;

pub struct PollingAdapter {
    name: String,
    vendor: VendorKind,
    enabled: bool,
    client: FaultApiClient,
    ctx: AdapterContext,
}

impl PollingAdapter {
    pub fn new(config: &PollingConfig, ctx: AdapterContext) -> Result<Self, CoreError> {
        let vendor = config.vendor;
        let endpoints =
            vendor.endpoints(config.health_path.as_deref(), config.alarms_path.as_deref());
        let client = FaultApiClient::new(
            config.base_url.clone(),
            endpoints,
            vendor.auth_scheme(),
            &config.api_key,
            &config.transport(),
        )?;

        Ok(Self {
            name: vendor.to_string(),
            vendor,
            enabled: config.enabled,
            client,
            ctx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> VendorKind {
        self.vendor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_url(&self) -> &Url {
        self.client.base_url()
    }

    pub async fn test_connection(&self) -> Result<(), CoreError> {
        self.client
            .test_connection()
            .await
            .map_err(|e| CoreError::Connection {
                target: self.client.base_url().to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn fetch_alarms(&self) -> Result<Vec<Value>, CoreError> {
        self.client
            .fetch_alarms()
            .await
            .map_err(|e| CoreError::Fetch {
                adapter: self.name.clone(),
                reason: e.to_string(),
            })
    }

    pub fn normalize(&self, raw: &Value) -> Result<AlarmDraft, CoreError> {
        self.vendor.normalize(raw, Utc::now())
    }

    /// Probe, fetch, and reconcile every record.
    pub async fn sync(&self) -> SyncResult {
        if !self.enabled {
            debug!(adapter = %self.name, "adapter disabled, skipping sync");
            return SyncResult::ok();
        }

        if let Err(e) = self.test_connection().await {
            warn!(adapter = %self.name, error = %e, "connection test failed");
            return SyncResult::failed(e);
        }

        let records = match self.fetch_alarms().await {
            Ok(records) => records,
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "alarm fetch failed");
                return SyncResult::failed(e);
            }
        };

        let mut result = SyncResult::ok();
        for (index, raw) in records.iter().enumerate() {
            match self.ingest(raw).await {
                Ok(Outcome::Created) => result.alarms_processed += 1,
                Ok(_) => result.alarms_updated += 1,
                Err(e) => {
                    result.errors += 1;
                    warn!(adapter = %self.name, index, error = %e, "skipping alarm record");
                }
            }
        }

        info!(
            adapter = %self.name,
            fetched = records.len(),
            created = result.alarms_processed,
            updated = result.alarms_updated,
            errors = result.errors,
            "sync complete"
        );
        result
    }

    async fn ingest(&self, raw: &Value) -> Result<Outcome, CoreError> {
        let now = Utc::now();
        let draft = self.vendor.normalize(raw, now)?;
        let serial = draft.external_id.clone();
        let (outcome, alarm) =
            upsert_by_source(self.ctx.store.as_ref(), &self.name, draft, now).await?;

        debug!(adapter = %self.name, %serial, ?outcome, "alarm reconciled");
        if outcome == Outcome::Created {
            self.notify(&alarm).await;
        }
        Ok(outcome)
    }

    async fn notify(&self, alarm: &CanonicalAlarm) {
        let notice = NewAlarmNotice::for_alarm(alarm, &self.ctx.recipients);
        if let Err(e) = self.ctx.notifier.notify(&notice).await {
            warn!(adapter = %self.name, alarm_id = %alarm.id, error = %e, "notification failed");
        }
    }
}
