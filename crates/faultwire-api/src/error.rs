use thiserror::Error;

/// Top-level error type for the `faultwire-api` crate.
///
/// Covers every wire-level failure mode: HTTP transport to REST fault APIs,
/// the block-framed TCP stream, TLS probing, and SNMP datagram decoding.
/// `faultwire-core` maps these into its adapter-level taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The remote answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Request or connect timed out.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The remote rejected the credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Sockets ─────────────────────────────────────────────────────
    /// Socket-level I/O failure (TCP stream or UDP listener).
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("Connection closed by peer")]
    Closed,

    /// No data arrived within the watchdog window.
    #[error("No data received for {timeout_secs}s")]
    DataTimeout { timeout_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A response body had an unexpected shape.
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// Malformed BER/SNMP datagram.
    #[error("Malformed datagram at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::DataTimeout { .. } | Self::Closed | Self::Io(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this error came from an HTTP status check.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn decode(offset: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            offset,
            reason: reason.into(),
        }
    }
}
