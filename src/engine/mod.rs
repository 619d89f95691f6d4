//! Execution engine for bastion
//!
//! The engine orchestrates:
//! 1. Planning - Resolve the requested machines into global order
//! 2. Executing - Compile each script, then write it (dryrun) or run it
//!    over a remote session (audit, config)

pub mod executor;
pub mod planner;

pub use executor::{Engine, ExecuteOptions, print_summary};
pub use planner::{Selection, plan};
