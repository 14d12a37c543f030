//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use faultwire_config::ConfigError;
use faultwire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(faultwire::no_config),
        help("Create one with: faultwire config init")
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(faultwire::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(faultwire::config),
        help("Check the config file; print its location with: faultwire config path")
    )]
    Config(ConfigError),

    #[error("No adapters are configured")]
    #[diagnostic(
        code(faultwire::no_adapters),
        help(
            "Add [polling.<vendor>], [stream] or [trap] sections to {path}\n\
             and make sure they are enabled."
        )
    )]
    NoAdapters { path: String },

    // ── Adapters ─────────────────────────────────────────────────────
    #[error("Adapter '{name}' not found")]
    #[diagnostic(
        code(faultwire::adapter_not_found),
        help("Configured adapters: {available}")
    )]
    AdapterNotFound { name: String, available: String },

    #[error("Cannot connect to {target}")]
    #[diagnostic(
        code(faultwire::connection_failed),
        help("Check that the source is running and reachable.\n{reason}")
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("{failed} of {total} connection tests failed")]
    #[diagnostic(code(faultwire::tests_failed))]
    TestsFailed { failed: usize, total: usize },

    #[error("{failed} of {total} adapters failed to sync")]
    #[diagnostic(code(faultwire::sync_failed), help("Run: faultwire test"))]
    SyncFailed { failed: usize, total: usize },

    #[error("A sync sweep is already in progress")]
    #[diagnostic(code(faultwire::sweep_in_progress))]
    SweepInProgress,

    #[error("{0}")]
    #[diagnostic(code(faultwire::core))]
    Core(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(faultwire::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TestsFailed { .. } => exit_code::CONNECTION,
            Self::AdapterNotFound { .. } => exit_code::NOT_FOUND,
            Self::SweepInProgress => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connection { target, reason } => Self::ConnectionFailed { target, reason },
            CoreError::SweepInProgress => Self::SweepInProgress,
            CoreError::AdapterNotFound { name } => Self::AdapterNotFound {
                name,
                available: String::new(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            other => Self::Core(other),
        }
    }
}
