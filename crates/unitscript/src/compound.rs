//! Compound units: one pass/fail signal over several steps
//!
//! A compound is emitted as an opening marker, the member steps, and a
//! closing aggregator. The opening marker `<name>_compound` sets
//! `<name>_unchanged=1` unconditionally; the closing unit `<name>` succeeds
//! only if that signal and every member's signal are 1. Later units can
//! depend on `<name>` like on any other label.

use crate::script::{indent, quote};
use crate::unit::{Precondition, record};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Marker {
    Open,
    Close {
        members: Vec<String>,
        on_change: Option<String>,
        message: String,
    },
}

/// Opening marker or closing aggregator of a compound block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundUnit {
    name: String,
    label: String,
    precondition: Precondition,
    marker: Marker,
}

impl CompoundUnit {
    /// The `<name>_compound` marker that starts a block
    pub fn open(name: impl Into<String>, precondition: impl Into<Precondition>) -> Self {
        let name = name.into();
        Self {
            label: format!("{name}_compound"),
            name,
            precondition: precondition.into(),
            marker: Marker::Open,
        }
    }

    /// The `<name>` aggregator that ends a block
    ///
    /// `members` are the terminal labels of the steps inside the block.
    /// `on_change` runs in config scripts when any member applied a change.
    pub fn close(
        name: impl Into<String>,
        precondition: impl Into<Precondition>,
        members: Vec<String>,
        on_change: Option<String>,
    ) -> Self {
        let name = name.into();
        let message = format!("{name}: at least one of its steps did not pass");
        Self {
            label: name.clone(),
            name,
            precondition: precondition.into(),
            marker: Marker::Close {
                members,
                on_change: on_change.filter(|s| !s.trim().is_empty()),
                message,
            },
        }
    }

    /// Replace the failure message of a closing aggregator
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let Marker::Close { message, .. } = &mut self.marker {
            *message = text.into();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    pub fn is_opening(&self) -> bool {
        matches!(self.marker, Marker::Open)
    }

    /// Labels aggregated by a closing unit (empty for the opening marker)
    pub fn members(&self) -> &[String] {
        match &self.marker {
            Marker::Open => &[],
            Marker::Close { members, .. } => members,
        }
    }

    pub fn audit_fragment(&self, quiet: bool) -> String {
        match &self.marker {
            Marker::Open => self.open_fragment(),
            Marker::Close {
                members, message, ..
            } => {
                let mut out = format!("{}=0;\n", self.label);
                out.push_str(&self.aggregate(members));
                out.push_str(&record(&self.label, message, quiet));
                out
            }
        }
    }

    pub fn apply_fragment(&self) -> String {
        match &self.marker {
            Marker::Open => self.open_fragment(),
            Marker::Close {
                members,
                on_change,
                message,
            } => {
                let label = &self.label;
                let mut out = format!("{label}=0;\n{label}_applied=0;\n");
                if let Some(on_change) = on_change
                    && !members.is_empty()
                {
                    let changed = members
                        .iter()
                        .map(|m| format!("[ \"${m}_applied\" = \"1\" ]"))
                        .collect::<Vec<_>>()
                        .join(" || ");
                    out.push_str(&format!("if {changed} ; then\n"));
                    out.push_str(&format!(
                        "\techo {};\n",
                        quote(&format!("changed: {label}"))
                    ));
                    out.push_str(&indent(on_change));
                    out.push_str(&format!("\t{label}_applied=1;\n"));
                    out.push_str("fi ;\n");
                }
                out.push_str(&self.aggregate(members));
                out.push_str(&record(label, message, false));
                out
            }
        }
    }

    fn open_fragment(&self) -> String {
        format!("{name}_unchanged=1;\n{label}=1;\n", name = self.name, label = self.label)
    }

    fn aggregate(&self, members: &[String]) -> String {
        let mut tests = vec![format!("[ \"${}_unchanged\" = \"1\" ]", self.name)];
        tests.extend(members.iter().map(|m| format!("[ \"${m}\" = \"1\" ]")));
        format!(
            "if {} ; then\n\t{}=1;\nfi ;\n",
            tests.join(" && "),
            self.label
        )
    }
}
