//! Network manifest schema
//!
//! ```toml
//! label = "home"
//!
//! [[machines]]
//! label = "r1"
//! role = "router"
//! host = "192.168.1.1"
//! user = "admin"
//!
//! [[machines.install]]
//! kind = "installed"
//! name = "dhcp"
//! package = "isc-dhcp-server"
//!
//! [[machines.persistent_firewall]]
//! kind = "simple"
//! name = "dhcp_port_open"
//! precondition = "dhcp_installed"
//! audit = "sudo iptables -C INPUT -p udp --dport 67 -j ACCEPT 2>&1 && echo pass;"
//! expected = "pass"
//! apply = "sudo iptables -A INPUT -p udp --dport 67 -j ACCEPT;"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use unitscript::{Machine, Network, Phase, Role, validate_machine_label};

use crate::config::SshConfig;
use crate::resource::UnitSpec;
use remotekit::Target;

/// Structural problems in a manifest that serde can't catch
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest declares no machines")]
    Empty,

    #[error("machine #{index} has an empty label")]
    EmptyLabel { index: usize },

    #[error("machine '{0}' is declared more than once")]
    DuplicateMachine(String),

    #[error("machine label '{label}' is invalid: {reason}")]
    InvalidLabel { label: String, reason: &'static str },
}

// ============================================================================
// Manifest
// ============================================================================

/// The whole network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkManifest {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub machines: Vec<MachineSpec>,
}

fn default_label() -> String {
    "network".to_string()
}

/// One machine and its per-phase unit entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    pub label: String,
    pub role: Role,
    /// Address to connect to (defaults to the label)
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,

    #[serde(default)]
    pub install: Vec<UnitSpec>,
    #[serde(default)]
    pub persistent_config: Vec<UnitSpec>,
    #[serde(default)]
    pub live_config: Vec<UnitSpec>,
    #[serde(default)]
    pub persistent_firewall: Vec<UnitSpec>,
    #[serde(default)]
    pub live_firewall: Vec<UnitSpec>,
}

impl MachineSpec {
    /// Entries declared for `phase`
    pub fn phase(&self, phase: Phase) -> &[UnitSpec] {
        match phase {
            Phase::Install => &self.install,
            Phase::PersistentConfig => &self.persistent_config,
            Phase::LiveConfig => &self.live_config,
            Phase::PersistentFirewall => &self.persistent_firewall,
            Phase::LiveFirewall => &self.live_firewall,
        }
    }

    /// Session target, falling back to the `[ssh]` defaults
    pub fn target(&self, ssh: &SshConfig) -> Target {
        Target::new(&self.label)
            .with_host(self.host.clone().unwrap_or_else(|| self.label.clone()))
            .with_user(self.user.clone().or_else(|| ssh.user.clone()))
            .with_port(self.port.or(ssh.port))
    }
}

impl NetworkManifest {
    /// Load a manifest; `.json` files are JSON, everything else TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read network manifest: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        };

        manifest
            .validate()
            .with_context(|| format!("Invalid network manifest: {}", path.display()))?;
        log::debug!(
            "Loaded network '{}' with {} machines from {}",
            manifest.label,
            manifest.machines.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.machines.is_empty() {
            return Err(ManifestError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for (index, machine) in self.machines.iter().enumerate() {
            if machine.label.trim().is_empty() {
                return Err(ManifestError::EmptyLabel { index });
            }
            validate_machine_label(&machine.label).map_err(|reason| {
                ManifestError::InvalidLabel {
                    label: machine.label.clone(),
                    reason,
                }
            })?;
            if !seen.insert(machine.label.as_str()) {
                return Err(ManifestError::DuplicateMachine(machine.label.clone()));
            }
        }
        Ok(())
    }

    pub fn find(&self, label: &str) -> Option<&MachineSpec> {
        self.machines.iter().find(|m| m.label == label)
    }

    /// The machine identities, in declaration order
    pub fn network(&self) -> Network {
        Network {
            label: self.label.clone(),
            machines: self
                .machines
                .iter()
                .map(|m| Machine::new(&m.label, m.role))
                .collect(),
        }
    }
}
