use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use unitscript::Action;

#[derive(Parser)]
#[command(name = "bastion")]
#[command(author = "bastion contributors")]
#[command(version)]
#[command(about = "Compile idempotent shell scripts for a network and run them over ssh", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Network manifest (default: <config>/network.toml)
    #[arg(short, long, global = true, env = crate::paths::ENV_NETWORK)]
    pub network: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check machines against their profiles without changing anything
    Audit(AuditArgs),

    /// Bring machines in line with their profiles
    Config(ConfigArgs),

    /// Write config scripts to local files instead of running them
    Dryrun(DryrunArgs),

    /// Print the compiled script for one machine
    Show(ShowArgs),

    /// List machines in processing order
    List,

    /// Compile every script and report problems
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run Commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct Targets {
    /// Machines to process
    #[arg(conflicts_with = "all", required_unless_present = "all")]
    pub machines: Vec<String>,

    /// Process every machine in the network
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    #[command(flatten)]
    pub targets: Targets,

    /// Start every session before waiting on any of them
    #[arg(short, long)]
    pub detach: bool,

    /// Don't print a line for passing units
    #[arg(long)]
    pub quiet_pass: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub targets: Targets,

    /// Start every session before waiting on any of them
    #[arg(short, long)]
    pub detach: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DryrunArgs {
    #[command(flatten)]
    pub targets: Targets,

    /// Directory for the written scripts
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

// ============================================================================
// Inspection Commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Machine label
    pub machine: String,

    /// Which script to compile
    #[arg(short, long, value_enum, default_value = "audit")]
    pub action: ActionArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ActionArg {
    Audit,
    Config,
    Dryrun,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Audit => Self::Audit,
            ActionArg::Config => Self::Config,
            ActionArg::Dryrun => Self::Dryrun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_network_reads_its_env_variable() {
        let cmd = Cli::command();
        let network = cmd
            .get_arguments()
            .find(|a| a.get_id() == "network")
            .unwrap();
        assert_eq!(
            network.get_env().and_then(|v| v.to_str()),
            Some(crate::paths::ENV_NETWORK)
        );
    }

    #[test]
    fn test_parse_audit() {
        let cli = Cli::parse_from(["bastion", "-vv", "audit", "r1", "m1", "--detach"]);
        assert_eq!(cli.verbose, 2);
        let Command::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.targets.machines, ["r1", "m1"]);
        assert!(args.detach);
        assert!(!args.targets.all);
    }

    #[test]
    fn test_machines_and_all_conflict() {
        assert!(Cli::try_parse_from(["bastion", "config", "r1", "--all"]).is_err());
        assert!(Cli::try_parse_from(["bastion", "config"]).is_err());
        assert!(Cli::try_parse_from(["bastion", "config", "--all", "--yes"]).is_ok());
    }

    #[test]
    fn test_show_action() {
        let cli = Cli::parse_from(["bastion", "show", "r1", "--action", "dryrun"]);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(Action::from(args.action), Action::Dryrun);
    }
}
