// ── New-alarm notifications ──
//
// Downstream delivery (email, ticketing) is an external collaborator. The
// core hands it a notice for each alarm created by a polled source and
// never lets a delivery failure affect ingestion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use url::Url;
use uuid::Uuid;

use faultwire_api::TransportConfig;

use crate::error::CoreError;
use crate::model::{CanonicalAlarm, Severity};

/// Payload describing a newly created alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlarmNotice {
    pub alarm_id: Uuid,
    pub site_name: String,
    pub site_id: String,
    pub severity: Severity,
    pub alarm_type: String,
    pub description: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub recipients: Vec<String>,
}

impl NewAlarmNotice {
    pub fn for_alarm(alarm: &CanonicalAlarm, recipients: &[String]) -> Self {
        Self {
            alarm_id: alarm.id,
            site_name: alarm.site_name.clone(),
            site_id: alarm.site_id.clone(),
            severity: alarm.severity,
            alarm_type: alarm.alarm_type.clone(),
            description: alarm.description.clone(),
            source: alarm.source.clone(),
            timestamp: alarm.timestamp,
            recipients: recipients.to_vec(),
        }
    }
}

#[async_trait]
pub trait AlarmNotifier: Send + Sync {
    async fn notify(&self, notice: &NewAlarmNotice) -> Result<(), CoreError>;
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AlarmNotifier for LogNotifier {
    async fn notify(&self, notice: &NewAlarmNotice) -> Result<(), CoreError> {
        info!(
            alarm_id = %notice.alarm_id,
            source = %notice.source,
            site = %notice.site_name,
            severity = %notice.severity,
            recipients = notice.recipients.len(),
            "new alarm: {}",
            notice.description
        );
        Ok(())
    }
}

/// POSTs each notice as JSON to a webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: Url, transport: &TransportConfig) -> Result<Self, CoreError> {
        let http = transport.build_client()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl AlarmNotifier for WebhookNotifier {
    async fn notify(&self, notice: &NewAlarmNotice) -> Result<(), CoreError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(notice)
            .send()
            .await
            .map_err(|e| CoreError::Notification {
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Notification {
                message: format!("webhook {} answered HTTP {}", self.url, status.as_u16()),
            });
        }
        Ok(())
    }
}
