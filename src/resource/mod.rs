//! Built-in unit kinds
//!
//! Every kind is a small serde struct that renders into an ordinary
//! [`Unit`]. The manifest selects a kind with its `kind` field:
//!
//! ```toml
//! [[machines.install]]
//! kind = "installed"
//! name = "dhcp"
//! package = "isc-dhcp-server"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use unitscript::{CompoundProfile, Expectation, Member, Phase, Precondition, Unit};

mod dir;
mod file;
mod package;
mod service;

pub use dir::Directory;
pub use file::{FileContent, FilePerms};
pub use package::Package;
pub use service::{ServiceEnabled, ServiceRunning};

/// A declaration that renders into one unit
pub trait UnitKind: fmt::Debug {
    /// Manifest name of the kind (e.g., "dir", "installed")
    fn kind(&self) -> &'static str;

    /// The unit this declaration stands for
    fn unit(&self) -> Unit;
}

/// One manifest entry in a phase list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitSpec {
    Simple(SimpleUnit),
    Dir(Directory),
    File(FileContent),
    FilePerms(FilePerms),
    Installed(Package),
    ServiceEnabled(ServiceEnabled),
    ServiceRunning(ServiceRunning),
    Compound(CompoundSpec),
}

impl UnitSpec {
    /// The single-unit kind behind this entry, if it isn't a compound
    pub fn as_kind(&self) -> Option<&dyn UnitKind> {
        match self {
            Self::Simple(u) => Some(u),
            Self::Dir(u) => Some(u),
            Self::File(u) => Some(u),
            Self::FilePerms(u) => Some(u),
            Self::Installed(u) => Some(u),
            Self::ServiceEnabled(u) => Some(u),
            Self::ServiceRunning(u) => Some(u),
            Self::Compound(_) => None,
        }
    }

    /// Render as a member of a compound block in `phase`
    pub fn member(&self, phase: Phase) -> Member {
        let kind: &dyn UnitKind = match self {
            Self::Compound(compound) => return Member::Node(Box::new(compound.profile(phase))),
            Self::Simple(u) => u,
            Self::Dir(u) => u,
            Self::File(u) => u,
            Self::FilePerms(u) => u,
            Self::Installed(u) => u,
            Self::ServiceEnabled(u) => u,
            Self::ServiceRunning(u) => u,
        };
        Member::Unit(kind.unit())
    }
}

/// The four-string unit contract, verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleUnit {
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    #[serde(default)]
    pub apply: String,
    pub audit: String,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub expect: Expectation,
    pub message: Option<String>,
}

impl UnitKind for SimpleUnit {
    fn kind(&self) -> &'static str {
        "simple"
    }

    fn unit(&self) -> Unit {
        let unit = Unit::new(
            &self.name,
            self.precondition.clone(),
            &self.apply,
            &self.audit,
            &self.expected,
        )
        .expecting(self.expect);
        with_message(unit, self.message.as_deref())
    }
}

/// A compound block: nested entries behind one `<name>` signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundSpec {
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    /// Shell run in config scripts when any nested unit changed something
    pub on_change: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
}

impl CompoundSpec {
    pub fn profile(&self, phase: Phase) -> CompoundProfile {
        let mut profile = CompoundProfile::new(&self.name, phase, self.precondition.clone());
        for spec in &self.units {
            profile.push(spec.member(phase));
        }
        if let Some(on_change) = &self.on_change {
            profile = profile.on_change(on_change);
        }
        if let Some(message) = &self.message {
            profile = profile.with_message(message);
        }
        profile
    }
}

pub(crate) fn with_message(unit: Unit, message: Option<&str>) -> Unit {
    match message {
        Some(message) => unit.with_message(message),
        None => unit,
    }
}
