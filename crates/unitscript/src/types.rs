//! Core enums shared by the unit model, the profiles and the compiler

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a machine is on the network
///
/// The declaration order is the global processing order: rules declared by a
/// later role may depend on state established by an earlier one, never the
/// other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// An end-user device (laptop, phone, printer)
    Device,
    /// A service running on top of a metal host
    Service,
    /// A bare-metal host
    Metal,
    /// A router fronting the rest of the network
    Router,
}

impl Role {
    /// All roles, in global processing order
    pub const ALL: [Role; 4] = [Role::Device, Role::Service, Role::Metal, Role::Router];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Service => "service",
            Self::Metal => "metal",
            Self::Router => "router",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase a unit belongs to
///
/// A machine's flattened unit list is the concatenation of every phase in
/// the order of [`Phase::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Install,
    PersistentConfig,
    LiveConfig,
    PersistentFirewall,
    LiveFirewall,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Install,
        Phase::PersistentConfig,
        Phase::LiveConfig,
        Phase::PersistentFirewall,
        Phase::LiveFirewall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::PersistentConfig => "persistent_config",
            Self::LiveConfig => "live_config",
            Self::PersistentFirewall => "persistent_firewall",
            Self::LiveFirewall => "live_firewall",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a compiled script does on the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Check only, never change anything
    Audit,
    /// Check, apply where the check fails, check again
    Config,
    /// The config script, written to a local file instead of being sent
    Dryrun,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Audit, Action::Config, Action::Dryrun];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Config => "config",
            Self::Dryrun => "dryrun",
        }
    }

    /// Whether sections carry the apply fragment
    pub fn applies(&self) -> bool {
        matches!(self, Self::Config | Self::Dryrun)
    }

    /// Whether the compiled text is sent to the remote host
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Dryrun)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audit" => Ok(Self::Audit),
            "config" => Ok(Self::Config),
            "dryrun" | "dry-run" | "dry_run" => Ok(Self::Dryrun),
            _ => Err(CompileError::InvalidAction(s.to_string())),
        }
    }
}
