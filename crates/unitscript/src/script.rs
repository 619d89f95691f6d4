//! Script rendering, dry-run artifacts and footer parsing

use crate::types::Action;
use crate::unit::Step;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Timestamp format used in dry-run file names
pub const DRY_RUN_TIMESTAMP: &str = "%Y%m%dT%H%M%S";

/// Quote a string for the shell using single quotes
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Indent every non-empty line by one tab, terminating the last line
pub fn indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push('\t');
        out.push_str(line);
        out.push('\n');
    }
    out
}

pub(crate) fn header(machine: &str, action: Action) -> String {
    format!(
        "#!/bin/bash\n\
         \n\
         hostname=$(hostname);\n\
         proceed=1;\n\
         \n\
         echo \"Started {action} $hostname with config label: {machine}\"\n\
         pass=0; fail=0; fail_string=;\n"
    )
}

pub(crate) fn footer(machine: &str, action: Action) -> String {
    format!(
        "\necho \"pass=$pass fail=$fail failed:$fail_string\"\n\
         echo \"Finished {action} $hostname with config label: {machine}\"\n"
    )
}

/// One delimited section: the step's fragment, guarded when it has a precondition
pub(crate) fn section(step: &Step, action: Action, quiet: bool) -> String {
    let label = step.label();
    let fragment = if action.applies() {
        step.apply_fragment()
    } else {
        step.audit_fragment(quiet)
    };

    let mut out = format!("\n#============ {label} =============\n");
    match step.precondition().dependency() {
        None => out.push_str(&fragment),
        Some(pre) => {
            out.push_str(&format!("{label}=0;\n"));
            out.push_str(&format!("if [ \"${pre}\" = \"1\" ] ; then\n"));
            out.push_str(&indent(&fragment));
            out.push_str("else\n");
            out.push_str(&format!(
                "\techo {};\n",
                quote(&format!("skipped: {label} ({pre} not met)"))
            ));
            out.push_str("fi ;\n");
        }
    }
    out
}

/// The compiled script for one machine and one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    machine: String,
    action: Action,
    sections: usize,
    text: String,
}

impl CompiledScript {
    pub(crate) fn render(machine: &str, action: Action, steps: &[Step], quiet: bool) -> Self {
        let mut text = header(machine, action);
        for step in steps {
            text.push_str(&section(step, action, quiet));
        }
        text.push_str(&footer(machine, action));
        Self {
            machine: machine.to_string(),
            action,
            sections: steps.len(),
            text,
        }
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Number of unit sections in the body
    pub fn section_count(&self) -> usize {
        self.sections
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// File name of the dry-run artifact for a given instant
    pub fn dry_run_file_name(&self, at: DateTime<Utc>) -> String {
        format!("{}_{}.sh", self.machine, at.format(DRY_RUN_TIMESTAMP))
    }

    /// Write the script to `<dir>/<machine>_<timestamp>.sh`
    pub fn write_dry_run(&self, dir: &Path) -> io::Result<PathBuf> {
        self.write_dry_run_at(dir, Utc::now())
    }

    /// Write the script using an explicit timestamp
    pub fn write_dry_run_at(&self, dir: &Path, at: DateTime<Utc>) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.dry_run_file_name(at));
        fs::write(&path, &self.text)?;
        log::debug!("wrote dry-run script {}", path.display());
        Ok(path)
    }
}

impl fmt::Display for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Totals printed by a script's footer line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub pass: usize,
    pub fail: usize,
    pub failed: Vec<String>,
}

impl ScriptReport {
    /// Parse one `pass=<n> fail=<n> failed:<labels>` line
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix("pass=")?;
        let (pass, rest) = rest.split_once(" fail=")?;
        let (fail, failed) = rest.split_once(" failed:")?;
        Some(Self {
            pass: pass.trim().parse().ok()?,
            fail: fail.trim().parse().ok()?,
            failed: failed.split_whitespace().map(String::from).collect(),
        })
    }

    /// Find the last footer line in a script's output
    pub fn parse(output: &str) -> Option<Self> {
        output.lines().rev().find_map(Self::parse_line)
    }

    pub fn is_clean(&self) -> bool {
        self.fail == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Unit;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!(indent("a;\n\nb;"), "\ta;\n\tb;\n");
        assert_eq!(indent(""), "");
    }

    #[test]
    fn test_header_and_footer() {
        let head = header("r1", Action::Audit);
        assert!(head.starts_with("#!/bin/bash\n"));
        assert!(head.contains("proceed=1;"));
        assert!(head.contains("Started audit $hostname with config label: r1"));
        assert!(head.ends_with("pass=0; fail=0; fail_string=;\n"));

        let foot = footer("r1", Action::Audit);
        assert!(foot.contains("echo \"pass=$pass fail=$fail failed:$fail_string\""));
        assert!(foot.contains("Finished audit $hostname with config label: r1"));
    }

    #[test]
    fn test_unguarded_section() {
        let step = Step::from(Unit::new("a", "proceed", "", "echo ok", "ok"));
        let text = section(&step, Action::Audit, false);
        assert!(text.starts_with("\n#============ a =============\n"));
        assert!(!text.contains("not met"));
    }

    #[test]
    fn test_guarded_section() {
        let step = Step::from(Unit::new("b", "a", "", "echo ok", "ok"));
        let text = section(&step, Action::Audit, false);
        assert!(text.contains("b=0;\nif [ \"$a\" = \"1\" ] ; then\n"));
        assert!(text.contains("echo 'skipped: b (a not met)';"));
    }

    #[test]
    fn test_write_dry_run() {
        let tmp = TempDir::new().unwrap();
        let steps = vec![Step::from(Unit::new("a", "proceed", "touch /x", "echo ok", "ok"))];
        let script = CompiledScript::render("m1", Action::Dryrun, &steps, false);
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let path = script.write_dry_run_at(tmp.path(), at).unwrap();
        assert_eq!(path.file_name().unwrap(), "m1_20240309T140507.sh");
        assert_eq!(fs::read_to_string(&path).unwrap(), script.text());
        assert_eq!(script.section_count(), 1);
    }

    #[test]
    fn test_report_parse() {
        let out = "Started audit box with config label: m1\n\
                   pass: a\n\
                   pass=3 fail=2 failed: b c\n\
                   Finished audit box with config label: m1\n";
        let report = ScriptReport::parse(out).unwrap();
        assert_eq!(report.pass, 3);
        assert_eq!(report.fail, 2);
        assert_eq!(report.failed, vec!["b", "c"]);
        assert!(!report.is_clean());

        let clean = ScriptReport::parse_line("pass=1 fail=0 failed:").unwrap();
        assert!(clean.is_clean());
        assert!(clean.failed.is_empty());
        assert!(ScriptReport::parse("no footer here").is_none());
    }
}
