//! # Unitscript
//!
//! Compiles per-machine lists of idempotent check/apply units into one
//! shell script per machine.
//!
//! ## Core Concepts
//!
//! - **Unit**: an audit command, an apply command, the text the audit prints
//!   on success, a failure message and a precondition label
//! - **CompoundUnit**: opening marker and closing aggregator that fold
//!   several steps into one signal
//! - **ProfileNode**: produces a machine's ordered steps per phase
//!   (structured or compound composition)
//! - **Orchestrator**: flattens every machine's profile, validates labels and
//!   precondition references, and renders scripts
//!
//! ## Example
//!
//! ```
//! use unitscript::{
//!     Action, Machine, Network, Orchestrator, Phase, ProfileNode, Role,
//!     StructuredProfile, Unit,
//! };
//!
//! let network = Network::new("home").with("r1", Role::Router);
//! let source = |m: &Machine| -> anyhow::Result<Box<dyn ProfileNode>> {
//!     Ok(Box::new(
//!         StructuredProfile::new(&m.label)
//!             .with(
//!                 Phase::Install,
//!                 Unit::new(
//!                     "dhcp_installed",
//!                     "proceed",
//!                     "sudo apt-get -y install isc-dhcp-server",
//!                     "dpkg-query -W -f='${Status}' isc-dhcp-server",
//!                     "install ok installed",
//!                 ),
//!             ),
//!     ))
//! };
//!
//! let orchestrator = Orchestrator::initialize(&network, &source)?;
//! let script = orchestrator.compile("r1", Action::Audit)?;
//! assert!(script.text().contains("#============ dhcp_installed ="));
//! # Ok::<(), unitscript::CompileError>(())
//! ```
//!
//! Scripts never abort on a failing unit. Each unit bumps the shared
//! `pass`/`fail` counters and the footer reports both along with the labels
//! that failed; [`ScriptReport`] parses that line back.

pub mod compound;
pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod profile;
pub mod script;
pub mod types;
pub mod unit;

pub use compound::CompoundUnit;
pub use error::{CompileError, Result};
pub use machine::{Machine, Network, validate_machine_label};
pub use orchestrator::{Orchestrator, RESERVED_LABELS, validate_label};
pub use profile::{CompoundProfile, Member, ProfileNode, ProfileSource, StructuredProfile, flatten};
pub use script::{CompiledScript, ScriptReport, quote};
pub use types::{Action, Phase, Role};
pub use unit::{Expectation, PROCEED, Precondition, Step, Unit};
