// ── Vendor profiles for polled REST sources ──
//
// Each profile fixes the auth header, the list envelope, the identity
// field and the severity scale of one management platform. Normalization
// is pure and total: unknown values fall back to minor/active and missing
// fields to sensible defaults. Only a missing identity is rejected.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use faultwire_api::rest::{AuthScheme, RestEndpoints};

use crate::error::CoreError;
use crate::model::{AlarmDraft, AlarmStatus, Severity};

/// Supported polled platforms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VendorKind {
    /// Generic NMS: lower-case severity words, bearer token.
    Nms,
    /// Element manager: integer severity codes, `X-API-Key`.
    Ems,
    /// SDN controller: X.733 severities, `X-Auth-Token`.
    Sdnc,
}

impl VendorKind {
    pub fn auth_scheme(self) -> AuthScheme {
        match self {
            Self::Nms => AuthScheme::Bearer,
            Self::Ems => AuthScheme::Header("x-api-key"),
            Self::Sdnc => AuthScheme::Header("x-auth-token"),
        }
    }

    /// Object key holding the alarm list, when the body is not a bare array.
    pub fn envelope(self) -> &'static str {
        match self {
            Self::Nms => "alarms",
            Self::Ems => "data",
            Self::Sdnc => "items",
        }
    }

    pub fn identity_field(self) -> &'static str {
        match self {
            Self::Nms => "id",
            Self::Ems => "alarmId",
            Self::Sdnc => "alarmSerialNo",
        }
    }

    pub fn default_health_path(self) -> &'static str {
        match self {
            Self::Nms => "/api/v1/health",
            Self::Ems => "/ems/api/ping",
            Self::Sdnc => "/api/v2/health",
        }
    }

    pub fn default_alarms_path(self) -> &'static str {
        match self {
            Self::Nms => "/api/v1/alarms",
            Self::Ems => "/ems/api/alarms/active",
            Self::Sdnc => "/api/v2/fm/alarms",
        }
    }

    pub fn endpoints(self, health_path: Option<&str>, alarms_path: Option<&str>) -> RestEndpoints {
        RestEndpoints {
            health_path: health_path.unwrap_or(self.default_health_path()).to_owned(),
            alarms_path: alarms_path.unwrap_or(self.default_alarms_path()).to_owned(),
            envelope: Some(self.envelope()),
        }
    }

    /// Turn one raw record into a draft.
    pub fn normalize(self, raw: &Value, now: DateTime<Utc>) -> Result<AlarmDraft, CoreError> {
        let Some(record) = raw.as_object() else {
            return Err(CoreError::validation("alarm record is not a JSON object"));
        };

        let external_id = text(record, &[self.identity_field()]).ok_or_else(|| {
            CoreError::validation(format!(
                "alarm record has no '{}' identity",
                self.identity_field()
            ))
        })?;

        let draft = match self {
            Self::Nms => AlarmDraft {
                external_id,
                site_id: text(record, &["siteId"]).unwrap_or_default(),
                site_name: text(record, &["siteName"]).unwrap_or_default(),
                severity: text(record, &["severity"]).map_or(Severity::Minor, |s| word_severity(&s)),
                status: text(record, &["status"]).map_or(AlarmStatus::Active, |s| word_status(&s)),
                alarm_type: text(record, &["alarmType", "type"]).unwrap_or_default(),
                description: text(record, &["description", "message"]).unwrap_or_default(),
                timestamp: time(record, &["timestamp", "raisedAt"]).unwrap_or(now),
            },
            Self::Ems => AlarmDraft {
                external_id,
                site_id: text(record, &["neId"]).unwrap_or_default(),
                site_name: text(record, &["neName"]).unwrap_or_default(),
                severity: integer(record, "severity").map_or(Severity::Minor, code_severity),
                status: integer(record, "state").map_or(AlarmStatus::Active, code_status),
                alarm_type: text(record, &["alarmType", "probableCause"]).unwrap_or_default(),
                description: text(record, &["alarmText", "description"]).unwrap_or_default(),
                timestamp: time(record, &["raisedAt", "eventTime"]).unwrap_or(now),
            },
            Self::Sdnc => {
                let perceived = text(record, &["perceivedSeverity", "severity"]);
                let cleared = perceived
                    .as_deref()
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case("cleared"));
                let acknowledged = text(record, &["ackState"])
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case("acknowledged"));
                AlarmDraft {
                    external_id,
                    site_id: text(record, &["nodeId"]).unwrap_or_default(),
                    site_name: text(record, &["nodeName"]).unwrap_or_default(),
                    severity: perceived.map_or(Severity::Minor, |s| x733_severity(&s)),
                    status: if cleared {
                        AlarmStatus::Resolved
                    } else if acknowledged {
                        AlarmStatus::Acknowledged
                    } else {
                        AlarmStatus::Active
                    },
                    alarm_type: text(record, &["probableCause"]).unwrap_or_default(),
                    description: text(record, &["specificProblem", "additionalText"])
                        .unwrap_or_default(),
                    timestamp: time(record, &["eventTime", "raisedTime"]).unwrap_or(now),
                }
            }
        };

        Ok(draft)
    }
}

// ── Severity / status scales ─────────────────────────────────────────

/// `critical`, `major`, `minor`, `warning`, `info`.
pub fn word_severity(value: &str) -> Severity {
    match value.trim().to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "major" => Severity::Major,
        _ => Severity::Minor,
    }
}

pub fn word_status(value: &str) -> AlarmStatus {
    match value.trim().to_ascii_lowercase().as_str() {
        "acknowledged" | "acked" => AlarmStatus::Acknowledged,
        "resolved" | "cleared" | "closed" => AlarmStatus::Resolved,
        _ => AlarmStatus::Active,
    }
}

/// 1 critical, 2 major, 3 minor, 4 warning, 0 indeterminate.
pub fn code_severity(code: i64) -> Severity {
    match code {
        1 => Severity::Critical,
        2 => Severity::Major,
        _ => Severity::Minor,
    }
}

/// 0 active, 1 acknowledged, 2 cleared.
pub fn code_status(code: i64) -> AlarmStatus {
    match code {
        1 => AlarmStatus::Acknowledged,
        2 => AlarmStatus::Resolved,
        _ => AlarmStatus::Active,
    }
}

/// ITU-T X.733 perceived severity. `CLEARED` maps to minor; the status
/// carries the clear.
pub fn x733_severity(value: &str) -> Severity {
    match value.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "MAJOR" => Severity::Major,
        _ => Severity::Minor,
    }
}

// ── Field helpers ────────────────────────────────────────────────────

/// First non-empty value among `keys`, strings and numbers accepted.
fn text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn integer(record: &Map<String, Value>, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` (UTC), or epoch seconds/millis.
fn time(record: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) => parse_time_text(s.trim()),
        Value::Number(n) => n.as_i64().and_then(epoch),
        _ => None,
    })
}

pub(crate) fn parse_time_text(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    value.parse::<i64>().ok().and_then(epoch)
}

/// Values above 10^11 are taken as milliseconds.
fn epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn nms_record_is_normalized() {
        let draft = VendorKind::Nms
            .normalize(
                &json!({
                    "id": "N-1",
                    "siteId": "S1",
                    "siteName": "Core",
                    "severity": "Critical",
                    "status": "acknowledged",
                    "alarmType": "POWER",
                    "description": "PSU failed",
                    "timestamp": "2025-01-01T10:00:00Z"
                }),
                now(),
            )
            .unwrap();
        assert_eq!(draft.external_id, "N-1");
        assert_eq!(draft.severity, Severity::Critical);
        assert_eq!(draft.status, AlarmStatus::Acknowledged);
        assert_eq!(draft.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn ems_record_uses_integer_codes_and_epoch_millis() {
        let draft = VendorKind::Ems
            .normalize(
                &json!({
                    "alarmId": 4711,
                    "neId": "NE-9",
                    "neName": "OLT-9",
                    "severity": 2,
                    "state": 2,
                    "alarmText": "LOS",
                    "raisedAt": 1_735_725_600_000_i64
                }),
                now(),
            )
            .unwrap();
        assert_eq!(draft.external_id, "4711");
        assert_eq!(draft.severity, Severity::Major);
        assert_eq!(draft.status, AlarmStatus::Resolved);
        assert_eq!(draft.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn sdnc_cleared_severity_resolves() {
        let draft = VendorKind::Sdnc
            .normalize(
                &json!({
                    "alarmSerialNo": "X-1",
                    "perceivedSeverity": "CLEARED",
                    "probableCause": "linkDown",
                    "specificProblem": "Port 3 down"
                }),
                now(),
            )
            .unwrap();
        assert_eq!(draft.status, AlarmStatus::Resolved);
        assert_eq!(draft.severity, Severity::Minor);
        assert_eq!(draft.alarm_type, "linkDown");
        assert_eq!(draft.description, "Port 3 down");
    }

    #[test]
    fn missing_fields_get_defaults() {
        for vendor in VendorKind::iter() {
            let mut raw = Map::new();
            raw.insert(vendor.identity_field().to_owned(), json!("only-id"));
            let draft = vendor.normalize(&Value::Object(raw), now()).unwrap();
            assert_eq!(draft.severity, Severity::Minor, "{vendor}");
            assert_eq!(draft.status, AlarmStatus::Active, "{vendor}");
            assert_eq!(draft.timestamp, now(), "{vendor}");
            assert_eq!(draft.site_id, "", "{vendor}");
            assert_eq!(draft.description, "", "{vendor}");
        }
    }

    #[test]
    fn missing_identity_is_a_validation_error() {
        for vendor in VendorKind::iter() {
            let err = vendor.normalize(&json!({ "severity": "major" }), now()).unwrap_err();
            assert!(matches!(err, CoreError::Validation { .. }), "{vendor}");
        }
        let err = VendorKind::Nms.normalize(&json!("N-1"), now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn severity_mappings_are_total() {
        for word in ["critical", "MAJOR", "minor", "warning", "info", "", "bogus"] {
            let _ = word_severity(word);
            let _ = x733_severity(word);
        }
        assert_eq!(word_severity("warning"), Severity::Minor);
        assert_eq!(word_severity("info"), Severity::Minor);
        assert_eq!(x733_severity("INDETERMINATE"), Severity::Minor);
        assert_eq!(x733_severity("  critical "), Severity::Critical);
        for code in [-1, 0, 1, 2, 3, 4, 5, i64::MAX] {
            let _ = code_severity(code);
        }
        assert_eq!(code_severity(0), Severity::Minor);
        assert_eq!(code_severity(4), Severity::Minor);
        assert_eq!(code_severity(99), Severity::Minor);
    }

    #[test]
    fn extreme_epoch_values_fall_back_to_now() {
        for value in [i64::MIN, i64::MAX] {
            let draft = VendorKind::Nms
                .normalize(&json!({ "id": "1", "timestamp": value }), now())
                .unwrap();
            assert_eq!(draft.timestamp, now(), "timestamp {value}");
        }
        assert_eq!(parse_time_text(&i64::MIN.to_string()), None);
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_now() {
        let draft = VendorKind::Nms
            .normalize(&json!({ "id": "1", "timestamp": "yesterday" }), now())
            .unwrap();
        assert_eq!(draft.timestamp, now());
    }

    #[test]
    fn endpoints_use_overrides() {
        let endpoints = VendorKind::Ems.endpoints(Some("/custom/health"), None);
        assert_eq!(endpoints.health_path, "/custom/health");
        assert_eq!(endpoints.alarms_path, "/ems/api/alarms/active");
        assert_eq!(endpoints.envelope, Some("data"));
    }
}
