//! Long-running ingestion: start everything, sync on schedule, stop on Ctrl-C.

use tracing::{info, warn};

use faultwire_core::Orchestrator;

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

use super::sync;

pub async fn handle(
    orchestrator: &Orchestrator,
    args: &RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    info!(adapters = ?orchestrator.adapter_names(), "starting");
    orchestrator.start().await?;

    if !args.no_initial_sync {
        match orchestrator.sync_all().await {
            Ok(report) => sync::render(&report, global)?,
            Err(e) => warn!(error = %e, "initial sweep skipped"),
        }
    }

    let status = orchestrator.status();
    if let Some(next) = status.next_sync_at {
        info!(next_sync_at = %next.to_rfc3339(), "waiting for next sweep");
    }

    let outcome = tokio::signal::ctrl_c().await;
    info!("shutting down");
    orchestrator.shutdown().await;
    outcome?;
    Ok(())
}
