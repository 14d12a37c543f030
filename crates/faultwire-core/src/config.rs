// ── Runtime adapter configuration ──
//
// These types describe *what* to ingest from and *how* to reach it. They
// carry credentials and tuning but never touch disk; faultwire-config
// builds an `IngestConfig` and hands it in.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use faultwire_api::stream::StreamSettings;
use faultwire_api::trap::{DEFAULT_TRAP_PORT, TrapSettings};
use faultwire_api::{TlsMode, TransportConfig};

use crate::adapter::vendor::VendorKind;

/// TLS verification strategy for REST sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed management servers).
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_transport(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// One polled REST source.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub vendor: VendorKind,
    pub base_url: Url,
    pub api_key: SecretString,
    pub enabled: bool,
    /// Overrides the vendor's default health path.
    pub health_path: Option<String>,
    /// Overrides the vendor's default alarm list path.
    pub alarms_path: Option<String>,
    pub timeout: Duration,
    pub tls: TlsVerification,
}

impl PollingConfig {
    pub fn new(vendor: VendorKind, base_url: Url, api_key: SecretString) -> Self {
        Self {
            vendor,
            base_url,
            api_key,
            enabled: true,
            health_path: None,
            alarms_path: None,
            timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.to_transport(),
            timeout: self.timeout,
        }
    }
}

/// The block-framed TCP alarm stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub settings: StreamSettings,
    pub enabled: bool,
    /// Complete a TLS handshake when testing the connection.
    pub tls_probe: bool,
}

impl StreamConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            settings: StreamSettings::new(host, port),
            enabled: true,
            tls_probe: false,
        }
    }
}

/// The SNMP trap listener.
#[derive(Debug, Clone)]
pub struct TrapConfig {
    pub settings: TrapSettings,
    pub enabled: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            settings: TrapSettings {
                bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_TRAP_PORT)),
                community: None,
            },
            enabled: true,
        }
    }
}

/// Orchestrator scheduling.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub interval: Duration,
    pub auto_sync: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            auto_sync: true,
        }
    }
}

/// Where new-alarm notices go.
#[derive(Debug, Clone, Default)]
pub struct NotifySettings {
    pub recipients: Vec<String>,
    /// POST notices here; log-only when unset.
    pub webhook_url: Option<Url>,
}

/// Everything the orchestrator needs to build its adapters.
#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub sync: SyncSettings,
    pub notify: NotifySettings,
    pub polling: Vec<PollingConfig>,
    pub stream: Option<StreamConfig>,
    pub trap: Option<TrapConfig>,
}
