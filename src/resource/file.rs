//! File resources - exact file content and permission bits

use serde::{Deserialize, Serialize};
use unitscript::{Precondition, Unit, quote};

use super::{UnitKind, with_message};

/// A file whose content must be exactly `lines`
///
/// The audit prints the file; command substitution drops trailing newlines,
/// so trailing blank lines are not significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Unit name (used as the label)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    pub path: String,
    #[serde(default)]
    pub lines: Vec<String>,
    pub message: Option<String>,
}

impl FileContent {
    fn expected(&self) -> String {
        let mut lines: &[String] = &self.lines;
        while let Some((last, rest)) = lines.split_last() {
            if !last.is_empty() {
                break;
            }
            lines = rest;
        }
        lines.join("\n")
    }
}

impl UnitKind for FileContent {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn unit(&self) -> Unit {
        let path = quote(&self.path);
        let body: Vec<String> = self.lines.iter().map(|l| quote(l)).collect();
        let apply = if body.is_empty() {
            format!("sudo truncate -s 0 {path};")
        } else {
            format!(
                "printf '%s\\n' {} | sudo tee {path} > /dev/null;",
                body.join(" ")
            )
        };
        let unit = Unit::new(
            &self.name,
            self.precondition.clone(),
            apply,
            format!("sudo cat {path} 2>/dev/null;"),
            self.expected(),
        )
        .with_message(format!("{} doesn't have the expected content", self.path));
        with_message(unit, self.message.as_deref())
    }
}

/// Octal permission bits of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePerms {
    /// Unit name (the label gets `_perms` appended)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    pub path: String,
    /// Octal mode as `stat -c %a` prints it (e.g., "755")
    pub mode: String,
    pub message: Option<String>,
}

impl UnitKind for FilePerms {
    fn kind(&self) -> &'static str {
        "file_perms"
    }

    fn unit(&self) -> Unit {
        let path = quote(&self.path);
        let mode = self.mode.trim_start_matches('0');
        let mode = if mode.is_empty() { "0" } else { mode };
        let unit = Unit::new(
            format!("{}_perms", self.name),
            self.precondition.clone(),
            format!("sudo chmod {mode} {path};"),
            format!("sudo stat -c %a {path} 2>/dev/null;"),
            mode,
        )
        .with_message(format!("Couldn't change permissions of {} to {mode}", self.path));
        with_message(unit, self.message.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_content_unit() {
        let unit = FileContent {
            name: "sysctl_conf".into(),
            precondition: Precondition::Proceed,
            path: "/etc/sysctl.conf".into(),
            lines: vec![
                "net.ipv4.ip_forward=1".into(),
                "# it's routed".into(),
                String::new(),
            ],
            message: None,
        }
        .unit();

        assert_eq!(unit.label(), "sysctl_conf");
        assert_eq!(
            unit.apply_command(),
            "printf '%s\\n' 'net.ipv4.ip_forward=1' '# it'\\''s routed' '' | sudo tee '/etc/sysctl.conf' > /dev/null;"
        );
        assert_eq!(
            unit.expected_success_text(),
            "net.ipv4.ip_forward=1\n# it's routed"
        );
    }

    #[test]
    fn test_empty_file() {
        let unit = FileContent {
            name: "empty".into(),
            precondition: Precondition::Proceed,
            path: "/etc/empty".into(),
            lines: Vec::new(),
            message: None,
        }
        .unit();
        assert_eq!(unit.apply_command(), "sudo truncate -s 0 '/etc/empty';");
        assert_eq!(unit.expected_success_text(), "");
    }

    #[test]
    fn test_file_perms_unit() {
        let unit = FilePerms {
            name: "hook".into(),
            precondition: Precondition::after("hook"),
            path: "/etc/dhcp/hook".into(),
            mode: "0755".into(),
            message: None,
        }
        .unit();
        assert_eq!(unit.label(), "hook_perms");
        assert_eq!(unit.apply_command(), "sudo chmod 755 '/etc/dhcp/hook';");
        assert_eq!(unit.expected_success_text(), "755");
    }
}
