use anyhow::Result;
use colored::Colorize;

use super::Loaded;
use crate::Context;
use crate::ui;

/// List machines in global processing order
pub fn run(ctx: &Context) -> Result<()> {
    let loaded = Loaded::load(ctx)?;
    let orchestrator = loaded.orchestrator(false)?;
    let resolver = match loaded.config.resolver() {
        Ok(resolver) => Some(resolver),
        Err(e) => {
            ui::warn(&format!("Credentials unavailable: {e:#}"));
            None
        }
    };

    ui::header(&format!("Network: {}", orchestrator.network()));
    println!();

    for machine in orchestrator.machines() {
        let host = loaded
            .manifest
            .find(&machine.label)
            .map(|m| m.target(&loaded.config.ssh).destination())
            .unwrap_or_default();
        let units = match orchestrator.steps(&machine.label) {
            Ok(steps) => format!("{} units", steps.len()),
            Err(e) => format!("{e}").red().to_string(),
        };
        let credential = match &resolver {
            Some(r) if r.has(&machine.label) => "✓".green(),
            Some(_) => "✗".red(),
            None => "?".yellow(),
        };

        println!(
            "  {} {:<16} {:<8} {:<28} {}",
            credential,
            machine.label.bold(),
            machine.role.to_string().cyan(),
            host.dimmed(),
            units
        );
    }

    if !ctx.quiet {
        println!();
        ui::dim("✓/✗ = credential present/missing");
    }
    Ok(())
}
