//! Adapter listing.

use tabled::Tabled;

use faultwire_core::{AdapterInfo, Orchestrator};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct AdapterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Target")]
    target: String,
}

impl From<&AdapterInfo> for AdapterRow {
    fn from(info: &AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            kind: info.kind.to_string(),
            enabled: if info.enabled { "yes" } else { "no" }.into(),
            target: info.target.clone(),
        }
    }
}

pub fn handle(orchestrator: &Orchestrator, global: &GlobalOpts) -> Result<(), CliError> {
    let adapters = orchestrator.describe_adapters();
    let out = output::render_list(
        global.output,
        &adapters,
        |a| AdapterRow::from(a),
        |a| a.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
