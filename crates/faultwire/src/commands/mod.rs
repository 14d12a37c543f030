//! Command dispatch: bridges CLI args -> orchestrator -> output formatting.

pub mod adapters;
pub mod config_cmd;
pub mod run;
pub mod sync;
pub mod test;

use std::sync::Arc;

use faultwire_api::TransportConfig;
use faultwire_config::{load_config, resolve_config_path};
use faultwire_core::{
    AlarmNotifier, LogNotifier, MemoryStore, NotifySettings, Orchestrator, WebhookNotifier,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Load configuration and build an orchestrator with every enabled adapter.
pub fn build_orchestrator(global: &GlobalOpts) -> Result<Orchestrator, CliError> {
    let cfg = load_config(global.config.as_deref())?;
    let ingest = cfg.to_ingest_config()?;

    let notifier = build_notifier(&ingest.notify)?;
    let orchestrator = Orchestrator::from_config(&ingest, Arc::new(MemoryStore::new()), notifier)?;

    if orchestrator.adapter_names().is_empty() {
        return Err(CliError::NoAdapters {
            path: resolve_config_path(global.config.as_deref())
                .display()
                .to_string(),
        });
    }
    Ok(orchestrator)
}

fn build_notifier(settings: &NotifySettings) -> Result<Arc<dyn AlarmNotifier>, CliError> {
    match &settings.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            &TransportConfig::default(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Dispatch an orchestrator-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    orchestrator: &Orchestrator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(orchestrator, &args, global).await,
        Command::Test(args) => test::handle(orchestrator, &args, global).await,
        Command::Sync(args) => sync::handle(orchestrator, &args, global).await,
        Command::Adapters => adapters::handle(orchestrator, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// `AdapterNotFound` with the list of configured names filled in.
pub(crate) fn unknown_adapter(orchestrator: &Orchestrator, name: &str) -> CliError {
    CliError::AdapterNotFound {
        name: name.to_owned(),
        available: orchestrator.adapter_names().join(", "),
    }
}
