//! Machines and the network that declares them

use crate::types::Role;
use serde::{Deserialize, Serialize};

/// A host, device, service or router identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    pub label: String,
    pub role: Role,
}

impl Machine {
    pub fn new(label: impl Into<String>, role: Role) -> Self {
        Self {
            label: label.into(),
            role,
        }
    }
}

/// Check that a machine label is safe inside a script banner and as a
/// file name stem
///
/// Letters, digits, `_` and `-`, starting with a letter or digit.
pub fn validate_machine_label(label: &str) -> Result<(), &'static str> {
    let mut chars = label.chars();
    match chars.next() {
        None => return Err("label is empty"),
        Some(c) if !c.is_ascii_alphanumeric() => {
            return Err("must start with a letter or digit");
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err("may only contain letters, digits, '_' and '-'");
    }
    Ok(())
}

/// The declared network: a label and its machines in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub label: String,
    pub machines: Vec<Machine>,
}

impl Network {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            machines: Vec::new(),
        }
    }

    /// Builder-style machine declaration
    pub fn with(mut self, label: impl Into<String>, role: Role) -> Self {
        self.machines.push(Machine::new(label, role));
        self
    }

    pub fn get(&self, label: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.label == label)
    }

    /// Machines in global processing order
    ///
    /// Devices first, then services, metal hosts and routers. Declaration
    /// order is kept within a role.
    pub fn ordered(&self) -> Vec<&Machine> {
        let mut machines: Vec<&Machine> = self.machines.iter().collect();
        machines.sort_by_key(|m| m.role);
        machines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_by_role_then_declaration() {
        let network = Network::new("home")
            .with("r1", Role::Router)
            .with("m1", Role::Metal)
            .with("d2", Role::Device)
            .with("s1", Role::Service)
            .with("d1", Role::Device);

        let labels: Vec<_> = network.ordered().iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, ["d2", "d1", "s1", "m1", "r1"]);
    }

    #[test]
    fn test_machine_label_rules() {
        for ok in ["r1", "core-router", "Edge_2", "9th"] {
            assert!(validate_machine_label(ok).is_ok(), "{ok}");
        }
        for bad in ["", "../x", "a/b", "-r1", "r1.lan", "r$(id)", "r 1"] {
            assert!(validate_machine_label(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_get() {
        let network = Network::new("home").with("r1", Role::Router);
        assert_eq!(network.get("r1").unwrap().role, Role::Router);
        assert!(network.get("r2").is_none());
    }
}
