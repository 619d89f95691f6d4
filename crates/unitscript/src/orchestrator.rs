//! The compiler: per-machine unit lists in, one script per machine out

use crate::error::{CompileError, Result};
use crate::machine::{Machine, Network, validate_machine_label};
use crate::profile::{ProfileSource, flatten};
use crate::script::CompiledScript;
use crate::types::Action;
use crate::unit::{PROCEED, Step};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Names the compiled script itself assigns
pub const RESERVED_LABELS: [&str; 7] = [PROCEED, "pass", "fail", "fail_string", "hostname", "out", "test"];

/// Check that a label can be used as a shell variable in the script
pub fn validate_label(label: &str) -> std::result::Result<(), &'static str> {
    let mut chars = label.chars();
    match chars.next() {
        None => return Err("label is empty"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err("must start with a letter or underscore");
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("may only contain letters, digits and underscores");
    }
    if RESERVED_LABELS.contains(&label) {
        return Err("reserved by the script");
    }
    // PATH, IFS, HOME and friends
    if !label.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("names without lowercase letters are left to the shell environment");
    }
    if label.starts_with("BASH") {
        return Err("BASH* names belong to the shell");
    }
    Ok(())
}

/// Variable a step assigns besides its own label
fn derived_variable(step: &Step) -> String {
    match step {
        Step::Compound(marker) if marker.is_opening() => format!("{}_unchanged", marker.name()),
        _ => format!("{}_applied", step.label()),
    }
}

type Steps = std::result::Result<Vec<Step>, String>;

/// Flattened unit lists for every machine of one network
///
/// Built once per run by [`Orchestrator::initialize`] and owned by the
/// caller. Compiling is a pure function of this value: the same machine and
/// action always produce byte-identical text.
#[derive(Debug)]
pub struct Orchestrator {
    network: Network,
    steps: HashMap<String, Steps>,
    quiet_passes: bool,
}

impl Orchestrator {
    /// Build and flatten every machine's profile
    ///
    /// A profile that fails to build does not fail the whole network; the
    /// failure is reported when that machine is compiled.
    pub fn initialize(network: &Network, source: &dyn ProfileSource) -> Result<Self> {
        let mut seen = HashSet::new();
        for machine in &network.machines {
            validate_machine_label(&machine.label).map_err(|reason| {
                CompileError::InvalidMachine {
                    label: machine.label.clone(),
                    reason,
                }
            })?;
            if !seen.insert(machine.label.as_str()) {
                return Err(CompileError::DuplicateMachine(machine.label.clone()));
            }
        }

        let steps = network
            .machines
            .par_iter()
            .map(|machine| {
                let steps = source
                    .profile(machine)
                    .map(|node| flatten(node.as_ref()))
                    .map_err(|e| format!("{e:#}"));
                match &steps {
                    Ok(steps) => log::debug!("{}: {} steps", machine.label, steps.len()),
                    Err(e) => log::warn!("{}: profile failed: {e}", machine.label),
                }
                (machine.label.clone(), steps)
            })
            .collect();

        Ok(Self {
            network: network.clone(),
            steps,
            quiet_passes: false,
        })
    }

    /// Suppress `pass:` lines in audit scripts
    #[must_use]
    pub fn quiet_passes(mut self, quiet: bool) -> Self {
        self.quiet_passes = quiet;
        self
    }

    pub fn network(&self) -> &str {
        &self.network.label
    }

    /// Machines in global processing order
    pub fn machines(&self) -> Vec<&Machine> {
        self.network.ordered()
    }

    pub fn machine(&self, label: &str) -> Option<&Machine> {
        self.network.get(label)
    }

    /// The flattened steps of a machine, if its profile built
    pub fn steps(&self, label: &str) -> Result<&[Step]> {
        let steps = self
            .steps
            .get(label)
            .ok_or_else(|| CompileError::UnknownMachine(label.to_string()))?;
        steps
            .as_deref()
            .map_err(|message| CompileError::Profile {
                machine: label.to_string(),
                message: message.clone(),
            })
    }

    /// Compile one machine's script for `action`
    pub fn compile(&self, machine: &str, action: Action) -> Result<CompiledScript> {
        let steps = self.steps(machine)?;
        check_steps(machine, steps)?;
        log::debug!("compiling {action} for {machine} ({} sections)", steps.len());
        Ok(CompiledScript::render(
            machine,
            action,
            steps,
            self.quiet_passes,
        ))
    }

    /// Compile every machine, in global processing order
    ///
    /// Each machine's result is independent; one failing compile does not
    /// affect the others.
    pub fn compile_network(&self, action: Action) -> Vec<(String, Result<CompiledScript>)> {
        self.machines()
            .par_iter()
            .map(|m| (m.label.clone(), self.compile(&m.label, action)))
            .collect()
    }
}

/// Validate labels and precondition references of one machine's steps
fn check_steps(machine: &str, steps: &[Step]) -> Result<()> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let label = step.label();
        validate_label(label).map_err(|reason| CompileError::InvalidLabel {
            machine: machine.to_string(),
            label: label.to_string(),
            reason,
        })?;
        if positions.insert(label, index).is_some() {
            return Err(CompileError::DuplicateLabel {
                machine: machine.to_string(),
                label: label.to_string(),
            });
        }
    }

    let derived: HashSet<String> = steps.iter().map(derived_variable).collect();
    if let Some(step) = steps.iter().find(|s| derived.contains(s.label())) {
        return Err(CompileError::InvalidLabel {
            machine: machine.to_string(),
            label: step.label().to_string(),
            reason: "clashes with a variable the script derives from another label",
        });
    }

    for (index, step) in steps.iter().enumerate() {
        for reference in step.references() {
            match positions.get(reference) {
                Some(&at) if at < index => {}
                Some(_) => {
                    return Err(CompileError::ForwardReference {
                        machine: machine.to_string(),
                        unit: step.label().to_string(),
                        precondition: reference.to_string(),
                    });
                }
                None => {
                    return Err(CompileError::UnresolvedPrecondition {
                        machine: machine.to_string(),
                        unit: step.label().to_string(),
                        precondition: reference.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
