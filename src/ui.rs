#![allow(dead_code)]

use colored::Colorize;
use remotekit::{OutputLine, OutputSink, Stream};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Remote Output
// ============================================================================

/// What a line of remote script output reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Pass,
    Fail,
    Skipped,
    Changed,
    Other,
}

fn line_kind(text: &str) -> LineKind {
    if text.starts_with("pass:") {
        LineKind::Pass
    } else if text.starts_with("fail:") {
        LineKind::Fail
    } else if text.starts_with("skipped:") {
        LineKind::Skipped
    } else if text.starts_with("changed:") {
        LineKind::Changed
    } else {
        LineKind::Other
    }
}

/// Streams remote lines to the terminal, prefixed with the machine label
///
/// Sessions running side by side interleave line by line; the prefix keeps
/// them apart.
#[derive(Debug)]
pub struct TerminalSink {
    prefix: String,
}

impl TerminalSink {
    pub fn new(machine: &str) -> Self {
        Self {
            prefix: format!("[{machine}]"),
        }
    }
}

impl OutputSink for TerminalSink {
    fn line(&mut self, line: &OutputLine) {
        let prefix = self.prefix.dimmed();
        match line.stream {
            Stream::Stderr => eprintln!("{prefix} {}", line.text.red()),
            Stream::Stdout => {
                let text = &line.text;
                match line_kind(text) {
                    LineKind::Pass => println!("{prefix} {}", text.green()),
                    LineKind::Fail => println!("{prefix} {}", text.red().bold()),
                    LineKind::Skipped => println!("{prefix} {}", text.yellow()),
                    LineKind::Changed => println!("{prefix} {}", text.cyan()),
                    LineKind::Other => println!("{prefix} {text}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_kind() {
        assert_eq!(line_kind("pass: dhcp_installed"), LineKind::Pass);
        assert_eq!(line_kind("fail: dhcp isn't installed"), LineKind::Fail);
        assert_eq!(line_kind("skipped: b (a not met)"), LineKind::Skipped);
        assert_eq!(line_kind("changed: web"), LineKind::Changed);
        assert_eq!(line_kind("pass=3 fail=0 failed:"), LineKind::Other);
    }

    #[test]
    fn test_terminal_sink_prefix() {
        assert_eq!(TerminalSink::new("r1").prefix, "[r1]");
    }
}
