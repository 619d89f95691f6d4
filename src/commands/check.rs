//! `check` - compile everything, contact nothing
//!
//! Prints a short content digest per script so two checkouts (or two runs)
//! can be compared for byte-identical output.

use anyhow::{Result, bail};
use colored::Colorize;
use rayon::prelude::*;
use unitscript::{Action, CompiledScript, Orchestrator};

use super::Loaded;
use crate::Context;
use crate::ui;

const DIGEST_LEN: usize = 12;

struct Checked {
    machine: String,
    action: Action,
    result: Result<(usize, String), String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    let loaded = Loaded::load(ctx)?;
    let orchestrator = loaded.orchestrator(false)?;

    ui::header(&format!("Checking {}", orchestrator.network()));

    let checked = check_all(&orchestrator);
    let mut failed = 0;
    let mut current = "";
    for c in &checked {
        if c.machine != current {
            ui::section(&c.machine);
            current = &c.machine;
        }
        match &c.result {
            Ok((sections, digest)) => {
                if !ctx.quiet {
                    println!(
                        "  {} {:<7} {} {}",
                        "✓".green(),
                        c.action.as_str(),
                        digest.dimmed(),
                        format!("({sections} sections)").dimmed()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                println!("  {} {:<7} {}", "✗".red(), c.action.as_str(), e);
            }
        }
    }

    println!();
    if failed > 0 {
        bail!("{failed} script(s) failed to compile");
    }
    ui::success(&format!("{} scripts compiled", checked.len()));
    Ok(())
}

/// Every machine, every action, in global order
fn check_all(orchestrator: &Orchestrator) -> Vec<Checked> {
    let jobs: Vec<(String, Action)> = orchestrator
        .machines()
        .iter()
        .flat_map(|m| Action::ALL.map(|a| (m.label.clone(), a)))
        .collect();

    jobs.into_par_iter()
        .map(|(machine, action)| {
            let result = orchestrator
                .compile(&machine, action)
                .map(|script| (script.section_count(), digest(&script)))
                .map_err(|e| e.to_string());
            Checked {
                machine,
                action,
                result,
            }
        })
        .collect()
}

fn digest(script: &CompiledScript) -> String {
    let hex = blake3::hash(script.text().as_bytes()).to_hex();
    hex.as_str()[..DIGEST_LEN].to_string()
}
