//! Directory resource - ensure a directory exists

use serde::{Deserialize, Serialize};
use unitscript::{Precondition, Unit, quote};

use super::{UnitKind, with_message};

/// A directory created recursively when missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Unit name (the label gets `_created` appended)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    pub path: String,
    pub message: Option<String>,
}

impl UnitKind for Directory {
    fn kind(&self) -> &'static str {
        "dir"
    }

    fn unit(&self) -> Unit {
        let path = quote(&self.path);
        let unit = Unit::new(
            format!("{}_created", self.name),
            self.precondition.clone(),
            format!("sudo mkdir -p {path};"),
            format!("sudo [ -d {path} ] && echo pass;"),
            "pass",
        )
        .with_message(format!("Couldn't create {}", self.path));
        with_message(unit, self.message.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_unit() {
        let unit = Directory {
            name: "etc_bastion".into(),
            precondition: Precondition::Proceed,
            path: "/etc/bastion".into(),
            message: None,
        }
        .unit();

        assert_eq!(unit.label(), "etc_bastion_created");
        assert_eq!(unit.apply_command(), "sudo mkdir -p '/etc/bastion';");
        assert_eq!(unit.audit_command(), "sudo [ -d '/etc/bastion' ] && echo pass;");
        assert_eq!(unit.expected_success_text(), "pass");
        assert_eq!(unit.failure_message(), "Couldn't create /etc/bastion");
    }
}
