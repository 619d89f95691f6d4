//! `audit`, `config` and `dryrun`

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use remotekit::{CredentialResolver, RemoteExecutor, SshTransport};
use std::path::PathBuf;
use std::sync::Arc;
use unitscript::Action;

use super::Loaded;
use crate::Context;
use crate::cli::{AuditArgs, ConfigArgs, DryrunArgs, Targets};
use crate::engine::{self, Engine, ExecuteOptions, Selection};
use crate::ui;

pub fn audit(ctx: &Context, args: AuditArgs) -> Result<()> {
    let request = Request {
        action: Action::Audit,
        targets: args.targets,
        detach: args.detach,
        quiet_pass: args.quiet_pass,
        yes: true,
        out: None,
    };
    run(ctx, request)
}

pub fn config(ctx: &Context, args: ConfigArgs) -> Result<()> {
    let request = Request {
        action: Action::Config,
        targets: args.targets,
        detach: args.detach,
        quiet_pass: false,
        yes: args.yes,
        out: None,
    };
    run(ctx, request)
}

pub fn dryrun(ctx: &Context, args: DryrunArgs) -> Result<()> {
    let request = Request {
        action: Action::Dryrun,
        targets: args.targets,
        detach: false,
        quiet_pass: false,
        yes: true,
        out: args.out,
    };
    run(ctx, request)
}

struct Request {
    action: Action,
    targets: Targets,
    detach: bool,
    quiet_pass: bool,
    yes: bool,
    out: Option<PathBuf>,
}

fn run(ctx: &Context, request: Request) -> Result<()> {
    let loaded = Loaded::load(ctx)?;
    let orchestrator = loaded.orchestrator(request.quiet_pass)?;

    let selection = Selection::from_args(request.targets.machines, request.targets.all)?;
    let machines = engine::plan(&orchestrator, &selection);
    log::debug!("{} on {}", request.action, machines.join(", "));

    if !ctx.quiet {
        ui::header(&format!("{} {}", request.action, loaded.manifest.label));
        for machine in &machines {
            match orchestrator.machine(machine) {
                Some(m) => println!("  {} {}", m.label, format!("({})", m.role).dimmed()),
                None => println!("  {} {}", machine, "(not in network)".red()),
            }
        }
        println!();
    }

    if !request.yes && !confirm_proceed()? {
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    // Dry runs never touch credentials.
    let resolver = if request.action.is_remote() {
        loaded.config.resolver()?
    } else {
        CredentialResolver::new()
    };
    let transport = Arc::new(SshTransport::new(loaded.config.ssh_options()));
    let engine = Engine::new(&orchestrator, &resolver, RemoteExecutor::new(transport))
        .with_targets(
            loaded
                .manifest
                .machines
                .iter()
                .map(|m| m.target(&loaded.config.ssh)),
        );

    let opts = ExecuteOptions {
        action: request.action,
        detach: request.detach,
        dryrun_dir: loaded.config.dryrun_dir(request.out.as_deref()),
    };
    let summary = engine.execute(&machines, &opts);
    engine::print_summary(request.action, &summary);

    if !summary.is_success() {
        bail!("{} of {} machine(s) failed", summary.failed(), summary.results.len());
    }
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}
