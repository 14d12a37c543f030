// ── Core error types ──
//
// Domain errors from faultwire-core. Consumers never see HTTP status codes
// or BER offsets directly; the `From<faultwire_api::Error>` impl folds
// wire failures into this taxonomy.

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Source errors ────────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    Connection { target: String, reason: String },

    #[error("Failed to fetch alarms from {adapter}: {reason}")]
    Fetch { adapter: String, reason: String },

    // ── Record errors ────────────────────────────────────────────────
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Notification failed: {message}")]
    Notification { message: String },

    // ── Orchestration errors ─────────────────────────────────────────
    #[error("A sync sweep is already in progress")]
    SweepInProgress,

    #[error("No adapter named '{name}' is registered")]
    AdapterNotFound { name: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Record-level errors are counted and skipped; everything else
    /// concerns the adapter as a whole.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Validation { .. } | Self::Persistence(_)
        )
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<faultwire_api::Error> for CoreError {
    fn from(err: faultwire_api::Error) -> Self {
        use faultwire_api::Error as Api;

        match err {
            Api::Transport(ref e) => CoreError::Connection {
                target: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: err.to_string(),
            },
            Api::Status { status, url } => CoreError::Connection {
                target: url,
                reason: format!("HTTP {status}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { .. }
            | Api::Tls(_)
            | Api::Authentication { .. }
            | Api::Io(_)
            | Api::Closed
            | Api::DataTimeout { .. } => CoreError::Connection {
                target: String::new(),
                reason: err.to_string(),
            },
            Api::Deserialization { message, body: _ } => CoreError::Parse { message },
            Api::UnexpectedPayload(message) => CoreError::Parse { message },
            Api::Decode { .. } => CoreError::Parse {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_becomes_connection() {
        let err: CoreError = faultwire_api::Error::Status {
            status: 502,
            url: "https://nms.example.net/api/v1/health".into(),
        }
        .into();
        match err {
            CoreError::Connection { target, reason } => {
                assert_eq!(target, "https://nms.example.net/api/v1/health");
                assert_eq!(reason, "HTTP 502");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn payload_errors_become_parse() {
        let err: CoreError = faultwire_api::Error::UnexpectedPayload("bad".into()).into();
        assert!(matches!(err, CoreError::Parse { .. }));
        assert!(err.is_record_level());
    }

    #[test]
    fn sweep_in_progress_is_not_record_level() {
        assert!(!CoreError::SweepInProgress.is_record_level());
    }
}
