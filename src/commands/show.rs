use anyhow::{Context as AnyhowContext, Result};
use std::io::Write;
use unitscript::Action;

use super::Loaded;
use crate::Context;
use crate::cli::ShowArgs;

/// Print one machine's compiled script to stdout
pub fn run(ctx: &Context, args: ShowArgs) -> Result<()> {
    let loaded = Loaded::load(ctx)?;
    let orchestrator = loaded.orchestrator(false)?;
    let action = Action::from(args.action);

    let script = orchestrator
        .compile(&args.machine, action)
        .with_context(|| format!("Could not compile {action} script for {}", args.machine))?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(script.text().as_bytes())
        .context("Failed to write script")?;
    Ok(())
}
