//! The idempotent check/apply unit
//!
//! A Unit is four opaque shell strings plus a label and a precondition.
//! The crate never looks inside the strings; it only decides where they
//! go in the compiled script and how their outcome feeds the shared
//! `pass`/`fail`/`fail_string` counters.

use crate::compound::CompoundUnit;
use crate::script::{indent, quote};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The precondition label that is always satisfied
pub const PROCEED: &str = "proceed";

/// What must hold before a unit is attempted
///
/// Serialized as a bare label; `"proceed"` (or an empty string) means
/// unconditional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Precondition {
    /// No guard at all
    #[default]
    Proceed,
    /// Only attempt the unit when the named unit succeeded earlier in the script
    After(String),
}

impl Precondition {
    pub fn after(label: impl Into<String>) -> Self {
        Self::from(label.into())
    }

    /// The label this precondition refers to (`proceed` when unconditional)
    pub fn label(&self) -> &str {
        match self {
            Self::Proceed => PROCEED,
            Self::After(label) => label,
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// The referenced label, unless unconditional
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::Proceed => None,
            Self::After(label) => Some(label),
        }
    }
}

impl From<String> for Precondition {
    fn from(label: String) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed == PROCEED {
            Self::Proceed
        } else {
            Self::After(trimmed.to_string())
        }
    }
}

impl From<&str> for Precondition {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<Precondition> for String {
    fn from(precondition: Precondition) -> Self {
        match precondition {
            Precondition::Proceed => PROCEED.to_string(),
            Precondition::After(label) => label,
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the captured audit output is compared with the expected text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Success when the output equals the expected text
    #[default]
    Equals,
    /// Success when the output differs from the expected text
    Differs,
}

impl Expectation {
    fn operator(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Differs => "!=",
        }
    }
}

/// One idempotent check/apply step
///
/// # Example
///
/// ```
/// use unitscript::{Precondition, Unit};
///
/// let unit = Unit::new(
///     "etc_bastion_created",
///     Precondition::Proceed,
///     "sudo mkdir -p /etc/bastion;",
///     "sudo [ -d /etc/bastion ] && echo pass;",
///     "pass",
/// )
/// .with_message("Couldn't create /etc/bastion");
///
/// assert_eq!(unit.label(), "etc_bastion_created");
/// assert!(unit.audit_fragment(false).contains("etc_bastion_created=1;"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    label: String,
    precondition: Precondition,
    apply: String,
    audit: String,
    expected: String,
    expectation: Expectation,
    message: String,
}

impl Unit {
    /// Create a unit from the apply command, the audit command and the text
    /// the audit command prints on success
    pub fn new(
        label: impl Into<String>,
        precondition: impl Into<Precondition>,
        apply: impl Into<String>,
        audit: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let message = format!("{label} is not in the expected state");
        Self {
            label,
            precondition: precondition.into(),
            apply: apply.into(),
            audit: audit.into(),
            expected: expected.into(),
            expectation: Expectation::Equals,
            message,
        }
    }

    /// Set the human-readable failure message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Succeed when the audit output is anything but the expected text
    pub fn expecting(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    /// The raw audit command
    pub fn audit_command(&self) -> &str {
        &self.audit
    }

    /// The raw apply command
    pub fn apply_command(&self) -> &str {
        &self.apply
    }

    pub fn expected_success_text(&self) -> &str {
        &self.expected
    }

    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    pub fn failure_message(&self) -> &str {
        &self.message
    }

    /// Shell text that checks the unit and records the outcome
    ///
    /// When `quiet` is set, passing units do not echo anything.
    pub fn audit_fragment(&self, quiet: bool) -> String {
        let mut out = format!("{}=0;\n", self.label);
        out.push_str(&self.check());
        out.push_str(&record(&self.label, &self.message, quiet));
        out
    }

    /// Shell text that checks the unit, applies it when the check fails,
    /// checks again and records the outcome
    pub fn apply_fragment(&self) -> String {
        let label = &self.label;
        let mut out = format!("{label}=0;\n{label}_applied=0;\n");
        out.push_str(&self.check());
        out.push_str(&format!("if [ \"${label}\" != \"1\" ] ; then\n"));
        out.push_str(&indent(&self.apply));
        out.push_str(&format!("\t{label}_applied=1;\n"));
        out.push_str(&indent(&self.check()));
        out.push_str("fi ;\n");
        out.push_str(&record(label, &self.message, false));
        out
    }

    fn check(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("out=$({});\n", self.audit.trim_end()));
        out.push_str(&format!("test={};\n", quote(&self.expected)));
        out.push_str(&format!(
            "if [ \"$out\" {} \"$test\" ] ; then\n\t{}=1;\nfi ;\n",
            self.expectation.operator(),
            self.label
        ));
        out
    }
}

/// Shell text that feeds a unit's signal into the shared counters
pub(crate) fn record(label: &str, message: &str, quiet: bool) -> String {
    let mut out = format!("if [ \"${label}\" = \"1\" ] ; then\n");
    if !quiet {
        out.push_str(&format!("\techo {};\n", quote(&format!("pass: {label}"))));
    }
    out.push_str("\tpass=$((pass + 1));\n");
    out.push_str("else\n");
    out.push_str(&format!("\techo {};\n", quote(&format!("fail: {label}"))));
    out.push_str(&format!("\techo {};\n", quote(message)));
    out.push_str("\tfail=$((fail + 1));\n");
    out.push_str(&format!("\tfail_string=\"$fail_string {label}\";\n"));
    out.push_str("fi ;\n");
    out
}

/// One entry of a machine's ordered unit list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Unit(Unit),
    Compound(CompoundUnit),
}

impl Step {
    pub fn label(&self) -> &str {
        match self {
            Self::Unit(unit) => unit.label(),
            Self::Compound(compound) => compound.label(),
        }
    }

    pub fn precondition(&self) -> &Precondition {
        match self {
            Self::Unit(unit) => unit.precondition(),
            Self::Compound(compound) => compound.precondition(),
        }
    }

    /// Every label that must already be defined when this step runs
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.precondition().dependency().into_iter().collect();
        if let Self::Compound(compound) = self {
            refs.extend(compound.members().iter().map(String::as_str));
        }
        refs
    }

    pub fn audit_fragment(&self, quiet: bool) -> String {
        match self {
            Self::Unit(unit) => unit.audit_fragment(quiet),
            Self::Compound(compound) => compound.audit_fragment(quiet),
        }
    }

    pub fn apply_fragment(&self) -> String {
        match self {
            Self::Unit(unit) => unit.apply_fragment(),
            Self::Compound(compound) => compound.apply_fragment(),
        }
    }
}

impl From<Unit> for Step {
    fn from(unit: Unit) -> Self {
        Self::Unit(unit)
    }
}

impl From<CompoundUnit> for Step {
    fn from(compound: CompoundUnit) -> Self {
        Self::Compound(compound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_unit() -> Unit {
        Unit::new(
            "etc_created",
            "proceed",
            "sudo mkdir -p /etc/x;",
            "sudo [ -d /etc/x ] && echo pass;",
            "pass",
        )
    }

    #[test]
    fn test_precondition_from_label() {
        assert_eq!(Precondition::from("proceed"), Precondition::Proceed);
        assert_eq!(Precondition::from(""), Precondition::Proceed);
        assert_eq!(
            Precondition::from(" dhcp_installed "),
            Precondition::After("dhcp_installed".into())
        );
        assert_eq!(Precondition::after("x").dependency(), Some("x"));
        assert_eq!(Precondition::Proceed.dependency(), None);
        assert_eq!(Precondition::Proceed.label(), "proceed");
    }

    #[test]
    fn test_audit_fragment_records_outcome() {
        let text = dir_unit().audit_fragment(false);
        assert!(text.starts_with("etc_created=0;\n"));
        assert!(text.contains("out=$(sudo [ -d /etc/x ] && echo pass;);"));
        assert!(text.contains("test='pass';"));
        assert!(text.contains("if [ \"$out\" = \"$test\" ] ; then"));
        assert!(text.contains("echo 'pass: etc_created';"));
        assert!(text.contains("fail_string=\"$fail_string etc_created\";"));
        assert!(!text.contains("mkdir"));
    }

    #[test]
    fn test_quiet_audit_hides_passes_only() {
        let text = dir_unit().audit_fragment(true);
        assert!(!text.contains("pass: etc_created"));
        assert!(text.contains("fail: etc_created"));
    }

    #[test]
    fn test_apply_fragment_applies_between_checks() {
        let text = dir_unit().apply_fragment();
        let first_check = text.find("out=$(").unwrap();
        let apply = text.find("sudo mkdir -p /etc/x;").unwrap();
        let second_check = text.rfind("out=$(").unwrap();
        assert!(first_check < apply && apply < second_check);
        assert!(text.contains("etc_created_applied=1;"));
    }

    #[test]
    fn test_differs_expectation() {
        let unit = Unit::new("no_telnet", "proceed", "", "command -v telnet", "")
            .expecting(Expectation::Differs);
        assert!(
            unit.audit_fragment(false)
                .contains("if [ \"$out\" != \"$test\" ] ; then")
        );
    }

    #[test]
    fn test_failure_message_is_quoted() {
        let unit = dir_unit().with_message("Couldn't create /etc/x");
        assert!(
            unit.audit_fragment(false)
                .contains("echo 'Couldn'\\''t create /etc/x';")
        );
    }

    #[test]
    fn test_step_references() {
        let step = Step::from(Unit::new("b", "a", "", "true", ""));
        assert_eq!(step.references(), vec!["a"]);
        let step = Step::from(dir_unit());
        assert!(step.references().is_empty());
    }
}
