//! Config file commands.

use faultwire_config::{Config, resolve_config_path, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = resolve_config_path(global.config.as_deref());
    match args.command {
        ConfigCommand::Path => {
            let shown = path.display().to_string();
            let out = output::render_single(
                global.output,
                &serde_json::json!({ "path": shown, "exists": path.exists() }),
                |_| shown.clone(),
                |_| shown.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            save_config(&Config::default(), &path, force)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}
