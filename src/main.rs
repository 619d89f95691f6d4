mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod profile;
mod resource;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Network manifest from `--network` / `BASTION_NETWORK`
    pub network: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        network: cli.network,
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Audit(args) => commands::run::audit(&ctx, args),
        Command::Config(args) => commands::run::config(&ctx, args),
        Command::Dryrun(args) => commands::run::dryrun(&ctx, args),
        Command::Show(args) => commands::show::run(&ctx, args),
        Command::List => commands::list::run(&ctx),
        Command::Check => commands::check::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "bastion", &mut io::stdout());
            Ok(())
        }
    }
}
