//! Connection tests.

use std::collections::BTreeMap;

use serde::Serialize;
use tabled::Tabled;

use faultwire_core::{CoreError, Orchestrator, TestOutcome};

use crate::cli::{GlobalOpts, TestArgs};
use crate::error::CliError;
use crate::output;

use super::unknown_adapter;

#[derive(Serialize)]
struct TestEntry {
    adapter: String,
    #[serde(flatten)]
    outcome: TestOutcome,
}

#[derive(Tabled)]
struct TestRow {
    #[tabled(rename = "Adapter")]
    adapter: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

pub async fn handle(
    orchestrator: &Orchestrator,
    args: &TestArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let outcomes: BTreeMap<String, TestOutcome> = match &args.adapter {
        Some(name) => {
            let result = match orchestrator.test_adapter(name).await {
                Err(CoreError::AdapterNotFound { .. }) => {
                    return Err(unknown_adapter(orchestrator, name));
                }
                other => other,
            };
            BTreeMap::from([(name.clone(), TestOutcome::from(result))])
        }
        None => orchestrator.test_all().await,
    };

    let entries: Vec<TestEntry> = outcomes
        .into_iter()
        .map(|(adapter, outcome)| TestEntry { adapter, outcome })
        .collect();

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &entries,
        |e| TestRow {
            adapter: e.adapter.clone(),
            status: output::status_label(e.outcome.ok, color),
            error: e.outcome.error.clone().unwrap_or_default(),
        },
        |e| format!("{}\t{}", e.adapter, if e.outcome.ok { "ok" } else { "failed" }),
    )?;
    output::print_output(&out, global.quiet);

    let failed = entries.iter().filter(|e| !e.outcome.ok).count();
    if failed > 0 {
        return Err(CliError::TestsFailed {
            failed,
            total: entries.len(),
        });
    }
    Ok(())
}
