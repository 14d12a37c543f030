//! Clap derive structures for the `faultwire` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// faultwire -- network alarm ingestion
#[derive(Debug, Parser)]
#[command(
    name = "faultwire",
    version,
    about = "Ingest network alarms from REST, stream, and SNMP trap sources",
    long_about = "Collects alarms from polled vendor REST APIs, a block-framed TCP\n\
        alarm stream, and SNMP traps, and reconciles them into one canonical\n\
        alarm store.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config dir)
    #[arg(long, env = "FAULTWIRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start every adapter and sync on schedule until interrupted
    Run(RunArgs),

    /// Test connectivity of every configured adapter
    Test(TestArgs),

    /// Run one sync sweep (or sync a single adapter)
    Sync(SyncArgs),

    /// List configured adapters
    #[command(alias = "ls")]
    Adapters,

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Skip the sweep that normally runs right after startup
    #[arg(long)]
    pub no_initial_sync: bool,
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Only test this adapter
    #[arg(long, short = 'a')]
    pub adapter: Option<String>,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only sync this adapter
    #[arg(long, short = 'a')]
    pub adapter: Option<String>,

    /// Seconds to let stream and trap adapters collect before syncing
    #[arg(long, default_value = "0")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path in use
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
