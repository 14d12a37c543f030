//! One-shot sync.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use faultwire_core::{CoreError, Orchestrator, SweepReport, SyncResult};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::error::CliError;
use crate::output;

use super::unknown_adapter;

#[derive(Tabled)]
struct SyncRow {
    #[tabled(rename = "Adapter")]
    adapter: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Serialize)]
struct SyncEntry<'a> {
    adapter: &'a str,
    #[serde(flatten)]
    result: &'a SyncResult,
}

pub async fn handle(
    orchestrator: &Orchestrator,
    args: &SyncArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    orchestrator.start_adapters().await;
    if args.wait > 0 {
        tokio::time::sleep(Duration::from_secs(args.wait)).await;
    }

    let outcome = sweep(orchestrator, args.adapter.as_deref()).await;
    orchestrator.shutdown().await;
    let report = outcome?;

    render(&report, global)?;

    let failed = report.results.values().filter(|r| !r.success).count();
    if failed > 0 {
        return Err(CliError::SyncFailed {
            failed,
            total: report.results.len(),
        });
    }
    Ok(())
}

async fn sweep(orchestrator: &Orchestrator, adapter: Option<&str>) -> Result<SweepReport, CliError> {
    let Some(name) = adapter else {
        return Ok(orchestrator.sync_all().await?);
    };
    match orchestrator.sync_adapter(name).await {
        Ok(result) => Ok(SweepReport {
            totals: result.clone(),
            results: BTreeMap::from([(name.to_owned(), result)]),
        }),
        Err(CoreError::AdapterNotFound { .. }) => Err(unknown_adapter(orchestrator, name)),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn render(report: &SweepReport, global: &GlobalOpts) -> Result<(), CliError> {
    let entries: Vec<SyncEntry<'_>> = report
        .results
        .iter()
        .map(|(adapter, result)| SyncEntry { adapter, result })
        .collect();

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &entries,
        |e| SyncRow {
            adapter: e.adapter.to_owned(),
            status: output::status_label(e.result.success, color),
            created: e.result.alarms_processed,
            updated: e.result.alarms_updated,
            errors: e.result.errors,
            error: e.result.error.clone().unwrap_or_default(),
        },
        |e| {
            format!(
                "{}\t{}\t{}\t{}",
                e.adapter, e.result.alarms_processed, e.result.alarms_updated, e.result.errors
            )
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
