//! Execution engine - compile, then write or dispatch, one machine at a time
//!
//! Every machine is handled on its own: a compile error, a missing
//! credential or a refused login fails that machine and nothing else.

use chrono::Utc;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use remotekit::{
    CredentialResolver, OutputSink, RemoteExecutor, SessionHandle, SessionOutcome, Target,
};
use unitscript::{Action, Orchestrator};

use crate::ui::TerminalSink;

/// Options for one run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub action: Action,
    /// Start every session before waiting on any of them
    pub detach: bool,
    /// Where dry-run scripts are written
    pub dryrun_dir: PathBuf,
}

/// Where a machine's run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Credential,
    Transport,
    Write,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Credential => "credential",
            Self::Transport => "session",
            Self::Write => "write",
        }
    }
}

/// Outcome for one machine
#[derive(Debug)]
pub enum MachineResult {
    /// Dry-run script written
    Written { machine: String, path: PathBuf },
    /// Session ran to the end (the script may still report failures)
    Completed(SessionOutcome),
    Failed {
        machine: String,
        stage: Stage,
        error: String,
    },
}

impl MachineResult {
    pub fn machine(&self) -> &str {
        match self {
            Self::Written { machine, .. } | Self::Failed { machine, .. } => machine,
            Self::Completed(outcome) => &outcome.machine,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Written { .. } => true,
            Self::Completed(outcome) => outcome.is_success(),
            Self::Failed { .. } => false,
        }
    }

    fn failed(machine: &str, stage: Stage, error: impl ToString) -> Self {
        let error = error.to_string();
        log::warn!("{machine}: {} failed: {error}", stage.as_str());
        Self::Failed {
            machine: machine.to_string(),
            stage,
            error,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub results: Vec<MachineResult>,
}

impl ExecuteSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

type SinkFactory<'a> = Box<dyn Fn(&str) -> Box<dyn OutputSink> + 'a>;

/// Drives compiled scripts to files or remote sessions
pub struct Engine<'a> {
    orchestrator: &'a Orchestrator,
    resolver: &'a CredentialResolver,
    executor: RemoteExecutor,
    targets: HashMap<String, Target>,
    sinks: SinkFactory<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(
        orchestrator: &'a Orchestrator,
        resolver: &'a CredentialResolver,
        executor: RemoteExecutor,
    ) -> Self {
        Self {
            orchestrator,
            resolver,
            executor,
            targets: HashMap::new(),
            sinks: Box::new(|machine: &str| -> Box<dyn OutputSink> {
                Box::new(TerminalSink::new(machine))
            }),
        }
    }

    /// Connection details per machine; machines without one connect to their label
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets
            .extend(targets.into_iter().map(|t| (t.machine.clone(), t)));
        self
    }

    /// Replace the terminal output with another sink per machine
    #[must_use]
    pub fn with_sinks(mut self, sinks: impl Fn(&str) -> Box<dyn OutputSink> + 'a) -> Self {
        self.sinks = Box::new(sinks);
        self
    }

    /// Run `opts.action` on `machines`, in the order given
    pub fn execute(&self, machines: &[String], opts: &ExecuteOptions) -> ExecuteSummary {
        let results = if opts.action.is_remote() {
            self.dispatch(machines, opts.action, opts.detach)
        } else {
            self.write_all(machines, &opts.dryrun_dir)
        };
        ExecuteSummary { results }
    }

    /// Dry run: compile and write, never contact anything
    fn write_all(&self, machines: &[String], dir: &Path) -> Vec<MachineResult> {
        let at = Utc::now();
        machines
            .iter()
            .map(|machine| match self.orchestrator.compile(machine, Action::Dryrun) {
                Err(e) => MachineResult::failed(machine, Stage::Compile, e),
                Ok(script) => match script.write_dry_run_at(dir, at) {
                    Ok(path) => MachineResult::Written {
                        machine: machine.clone(),
                        path,
                    },
                    Err(e) => MachineResult::failed(machine, Stage::Write, e),
                },
            })
            .collect()
    }

    fn dispatch(&self, machines: &[String], action: Action, detach: bool) -> Vec<MachineResult> {
        let pending: Vec<Pending> = machines
            .iter()
            .map(|machine| self.start(machine, action, detach))
            .collect();

        pending
            .into_iter()
            .map(|p| match p {
                Pending::Done(result) => result,
                Pending::Running(handle) => {
                    let machine = handle.machine().to_string();
                    match handle.wait() {
                        Ok(outcome) => MachineResult::Completed(outcome),
                        Err(e) => MachineResult::failed(&machine, Stage::Transport, e),
                    }
                }
            })
            .collect()
    }

    /// Compile, resolve, then open a session (or hand it to a worker)
    fn start(&self, machine: &str, action: Action, detach: bool) -> Pending {
        let script = match self.orchestrator.compile(machine, action) {
            Ok(script) => script,
            Err(e) => return Pending::Done(MachineResult::failed(machine, Stage::Compile, e)),
        };
        let credential = match self.resolver.resolve(machine) {
            Ok(credential) => credential,
            Err(e) => return Pending::Done(MachineResult::failed(machine, Stage::Credential, e)),
        };

        let target = self
            .targets
            .get(machine)
            .cloned()
            .unwrap_or_else(|| Target::new(machine));
        let sink = (self.sinks)(machine);
        log::info!("{machine}: starting {action} session on {}", target.destination());

        if detach {
            match self
                .executor
                .spawn(target, credential, script.into_text(), sink)
            {
                Ok(handle) => Pending::Running(handle),
                Err(e) => Pending::Done(MachineResult::failed(machine, Stage::Transport, e)),
            }
        } else {
            match self.executor.run_blocking(&target, &credential, &script, sink) {
                Ok(outcome) => Pending::Done(MachineResult::Completed(outcome)),
                Err(e) => Pending::Done(MachineResult::failed(machine, Stage::Transport, e)),
            }
        }
    }
}

enum Pending {
    Done(MachineResult),
    Running(SessionHandle),
}

/// Print final summary
pub fn print_summary(action: Action, summary: &ExecuteSummary) {
    println!();
    for result in &summary.results {
        match result {
            MachineResult::Written { machine, path } => {
                println!("  {} {} → {}", "✓".green(), machine, path.display());
            }
            MachineResult::Completed(outcome) => {
                let totals = outcome.report.as_ref().map_or_else(
                    || format!("exit code {}", outcome.exit_code),
                    |r| format!("pass={} fail={}", r.pass, r.fail),
                );
                if outcome.is_success() {
                    println!("  {} {} {}", "✓".green(), outcome.machine, totals);
                } else if outcome.cancelled {
                    println!("  {} {} cancelled", "⚠".yellow(), outcome.machine);
                } else {
                    let failed = outcome
                        .report
                        .as_ref()
                        .map(|r| r.failed.join(" "))
                        .unwrap_or_default();
                    println!(
                        "  {} {} {} {}",
                        "✗".red(),
                        outcome.machine,
                        totals,
                        failed.dimmed()
                    );
                }
            }
            MachineResult::Failed {
                machine,
                stage,
                error,
            } => {
                println!(
                    "  {} {} {} {}",
                    "✗".red(),
                    machine,
                    format!("[{}]", stage.as_str()).dimmed(),
                    error
                );
            }
        }
    }

    println!();
    if summary.is_success() {
        println!(
            "  {} {} finished on {} machines",
            "✓".green().bold(),
            action,
            summary.succeeded()
        );
    } else {
        println!(
            "  {} {} finished with errors ({} ok, {} {})",
            "⚠".yellow().bold(),
            action,
            summary.succeeded(),
            summary.failed(),
            "failed".red()
        );
    }
}
