//! Configuration for the faultwire binary.
//!
//! TOML file + `FAULTWIRE_` environment layering, secret resolution
//! (`*_env` indirection, then plaintext), and translation to
//! `faultwire_core::IngestConfig`.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use faultwire_api::stream::StreamSettings;
use faultwire_api::trap::{DEFAULT_TRAP_PORT, TrapSettings};
use faultwire_core::{
    IngestConfig, NotifySettings, PollingConfig, StreamConfig, SyncSettings, TlsVerification,
    TrapConfig, VendorKind,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FAULTWIRE_CONFIG";

const ENV_PREFIX: &str = "FAULTWIRE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub notify: NotifySection,

    /// Polled REST sources keyed by vendor profile (`nms`, `ems`, `sdnc`).
    #[serde(default)]
    pub polling: BTreeMap<String, PollingSection>,

    pub stream: Option<StreamSection>,

    pub trap: Option<TrapSection>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncSection {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_true")]
    pub auto_sync: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            auto_sync: true,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NotifySection {
    #[serde(default)]
    pub recipients: Vec<String>,

    /// POST new-alarm notices here; log-only when unset.
    pub webhook_url: Option<String>,
}

/// One polled vendor source.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PollingSection {
    pub base_url: Option<String>,

    /// API key (plaintext; prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub health_path: Option<String>,

    pub alarms_path: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

/// The block-framed TCP alarm stream.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StreamSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_env: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub reconnect_delay_secs: Option<u64>,
    pub max_reconnect_delay_secs: Option<u64>,
    pub data_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub buffer_limit: Option<usize>,

    /// Complete a TLS handshake in connection tests.
    #[serde(default)]
    pub tls: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TrapSection {
    #[serde(default = "default_trap_bind")]
    pub bind: String,

    #[serde(default = "default_trap_port")]
    pub port: u16,

    pub community: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TrapSection {
    fn default() -> Self {
        Self {
            bind: default_trap_bind(),
            port: default_trap_port(),
            community: None,
            enabled: true,
        }
    }
}

fn default_interval() -> u64 {
    300
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_trap_bind() -> String {
    "0.0.0.0".into()
}
fn default_trap_port() -> u16 {
    DEFAULT_TRAP_PORT
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "faultwire", "faultwire").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("faultwire");
    p
}

/// The file `load_config` would read: explicit path, `FAULTWIRE_CONFIG`,
/// then the platform default.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(config_path)
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, file, and environment.
///
/// A missing default file is fine; a missing explicitly named one is not.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let named = explicit.is_some() || std::env::var_os(CONFIG_ENV).is_some();
    let path = resolve_config_path(explicit);
    if named && !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Write `cfg` as TOML to `path`, refusing to clobber unless `force`.
pub fn save_config(cfg: &Config, path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// `*_env` indirection first, then plaintext.
pub fn resolve_secret(plain: Option<&str>, env_name: Option<&str>) -> Option<SecretString> {
    if let Some(name) = env_name {
        if let Ok(value) = std::env::var(name) {
            return Some(SecretString::from(value));
        }
        warn!(variable = name, "secret variable is not set");
    }
    plain.map(|value| SecretString::from(value.to_owned()))
}

// ── Translation to core config ──────────────────────────────────────

impl Config {
    /// Build the runtime configuration.
    ///
    /// Sources missing their connection parameters are skipped with a
    /// warning; malformed values are errors.
    pub fn to_ingest_config(&self) -> Result<IngestConfig, ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(invalid("sync.interval_secs", "must be greater than zero"));
        }

        let mut polling = Vec::new();
        for (name, section) in &self.polling {
            if let Some(cfg) = polling_config(name, section)? {
                polling.push(cfg);
            }
        }

        Ok(IngestConfig {
            sync: SyncSettings {
                interval: Duration::from_secs(self.sync.interval_secs),
                auto_sync: self.sync.auto_sync,
            },
            notify: notify_settings(&self.notify)?,
            polling,
            stream: self.stream.as_ref().map(stream_config).transpose()?.flatten(),
            trap: self.trap.as_ref().map(trap_config).transpose()?,
        })
    }
}

fn notify_settings(section: &NotifySection) -> Result<NotifySettings, ConfigError> {
    let webhook_url = section
        .webhook_url
        .as_deref()
        .map(|raw| Url::parse(raw).map_err(|e| invalid("notify.webhook_url", e.to_string())))
        .transpose()?;
    Ok(NotifySettings {
        recipients: section.recipients.clone(),
        webhook_url,
    })
}

fn polling_config(name: &str, section: &PollingSection) -> Result<Option<PollingConfig>, ConfigError> {
    let field = |key: &str| format!("polling.{name}.{key}");

    let vendor: VendorKind = name.parse().map_err(|_| {
        invalid(
            format!("polling.{name}"),
            "expected one of 'nms', 'ems', 'sdnc'",
        )
    })?;

    let Some(raw_url) = section.base_url.as_deref() else {
        warn!(adapter = name, "no base_url configured, skipping");
        return Ok(None);
    };
    let base_url = Url::parse(raw_url).map_err(|e| invalid(field("base_url"), e.to_string()))?;

    let Some(api_key) = resolve_secret(section.api_key.as_deref(), section.api_key_env.as_deref())
    else {
        warn!(adapter = name, "no api key configured, skipping");
        return Ok(None);
    };

    if section.timeout_secs == 0 {
        return Err(invalid(field("timeout_secs"), "must be greater than zero"));
    }

    let tls = if section.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = section.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut cfg = PollingConfig::new(vendor, base_url, api_key);
    cfg.enabled = section.enabled;
    cfg.health_path.clone_from(&section.health_path);
    cfg.alarms_path.clone_from(&section.alarms_path);
    cfg.timeout = Duration::from_secs(section.timeout_secs);
    cfg.tls = tls;
    Ok(Some(cfg))
}

fn stream_config(section: &StreamSection) -> Result<Option<StreamConfig>, ConfigError> {
    let (Some(host), Some(port)) = (section.host.as_deref(), section.port) else {
        warn!(adapter = "stream", "host or port missing, skipping");
        return Ok(None);
    };

    let secs = |key: &str, value: Option<u64>| -> Result<Option<Duration>, ConfigError> {
        match value {
            Some(0) => Err(invalid(format!("stream.{key}"), "must be greater than zero")),
            other => Ok(other.map(Duration::from_secs)),
        }
    };

    let mut settings = StreamSettings::new(host, port);
    settings.username.clone_from(&section.username);
    settings.password = resolve_secret(section.password.as_deref(), section.password_env.as_deref());
    if let Some(delay) = secs("reconnect_delay_secs", section.reconnect_delay_secs)? {
        settings.reconnect_delay = delay;
    }
    if let Some(delay) = secs("max_reconnect_delay_secs", section.max_reconnect_delay_secs)? {
        settings.max_reconnect_delay = delay;
    }
    if let Some(timeout) = secs("data_timeout_secs", section.data_timeout_secs)? {
        settings.data_timeout = timeout;
    }
    if let Some(timeout) = secs("connect_timeout_secs", section.connect_timeout_secs)? {
        settings.connect_timeout = timeout;
    }
    match section.buffer_limit {
        Some(0) => return Err(invalid("stream.buffer_limit", "must be greater than zero")),
        Some(limit) => settings.buffer_limit = limit,
        None => {}
    }

    Ok(Some(StreamConfig {
        settings,
        enabled: section.enabled,
        tls_probe: section.tls,
    }))
}

fn trap_config(section: &TrapSection) -> Result<TrapConfig, ConfigError> {
    let ip: IpAddr = section
        .bind
        .parse()
        .map_err(|_| invalid("trap.bind", format!("not an IP address: {}", section.bind)))?;
    Ok(TrapConfig {
        settings: TrapSettings {
            bind: SocketAddr::new(ip, section.port),
            community: section.community.clone(),
        },
        enabled: section.enabled,
    })
}
