//! Service resources - systemd units enabled at boot and running now

use serde::{Deserialize, Serialize};
use unitscript::{Precondition, Unit, quote};

use super::{UnitKind, with_message};

/// A systemd unit enabled at boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEnabled {
    /// Unit name (the label gets `_enabled` appended)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    /// systemd unit; defaults to `name`
    pub service: Option<String>,
    pub message: Option<String>,
}

/// A systemd unit that is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRunning {
    /// Unit name (the label gets `_running` appended)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    /// systemd unit; defaults to `name`
    pub service: Option<String>,
    pub message: Option<String>,
}

impl UnitKind for ServiceEnabled {
    fn kind(&self) -> &'static str {
        "service_enabled"
    }

    fn unit(&self) -> Unit {
        let service = self.service.as_deref().unwrap_or(&self.name);
        let quoted = quote(service);
        let unit = Unit::new(
            format!("{}_enabled", self.name),
            self.precondition.clone(),
            format!("sudo systemctl enable {quoted};"),
            format!("sudo systemctl is-enabled {quoted} 2>&1;"),
            "enabled",
        )
        .with_message(format!("{service} is not enabled at boot"));
        with_message(unit, self.message.as_deref())
    }
}

impl UnitKind for ServiceRunning {
    fn kind(&self) -> &'static str {
        "service_running"
    }

    fn unit(&self) -> Unit {
        let service = self.service.as_deref().unwrap_or(&self.name);
        let quoted = quote(service);
        let unit = Unit::new(
            format!("{}_running", self.name),
            self.precondition.clone(),
            format!("sudo systemctl restart {quoted};"),
            format!("sudo systemctl is-active {quoted} 2>&1;"),
            "active",
        )
        .with_message(format!("{service} is not running"));
        with_message(unit, self.message.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_units() {
        let enabled = ServiceEnabled {
            name: "dhcp".into(),
            precondition: Precondition::after("dhcp_installed"),
            service: Some("isc-dhcp-server".into()),
            message: None,
        }
        .unit();
        assert_eq!(enabled.label(), "dhcp_enabled");
        assert_eq!(enabled.precondition().dependency(), Some("dhcp_installed"));
        assert_eq!(enabled.audit_command(), "sudo systemctl is-enabled 'isc-dhcp-server' 2>&1;");
        assert_eq!(enabled.expected_success_text(), "enabled");

        let running = ServiceRunning {
            name: "sshd".into(),
            precondition: Precondition::Proceed,
            service: None,
            message: None,
        }
        .unit();
        assert_eq!(running.label(), "sshd_running");
        assert_eq!(running.apply_command(), "sudo systemctl restart 'sshd';");
        assert_eq!(running.failure_message(), "sshd is not running");
    }
}
