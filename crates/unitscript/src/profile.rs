//! Profile composition
//!
//! A [`ProfileNode`] produces a machine's ordered steps for one phase. There
//! are two compositions: [`StructuredProfile`] concatenates its parts, and
//! [`CompoundProfile`] brackets its members between a compound opening marker
//! and a closing aggregator. Emission order is execution order; nothing
//! downstream reorders steps.

use crate::compound::CompoundUnit;
use crate::machine::Machine;
use crate::types::Phase;
use crate::unit::{Precondition, Step, Unit};
use std::fmt;

/// Producer of a machine's ordered unit list per phase
pub trait ProfileNode: Send + Sync + fmt::Debug {
    /// Name of the node (machine label or compound name)
    fn label(&self) -> &str;

    /// Steps this node contributes to `phase`, in execution order
    fn emit(&self, phase: Phase) -> Vec<Step>;

    /// Labels whose signals together stand for this node's outcome in
    /// `phase`; the node succeeded only if every one of them is 1
    fn terminals(&self, phase: Phase) -> Vec<String> {
        self.emit(phase)
            .iter()
            .map(|step| step.label().to_string())
            .collect()
    }
}

/// Every step of a profile across all phases, in phase order
pub fn flatten(node: &dyn ProfileNode) -> Vec<Step> {
    Phase::ALL.iter().flat_map(|&phase| node.emit(phase)).collect()
}

/// Builds the profile tree for a machine
///
/// Implementations wrap the content generators. They are called once per
/// machine per [`Orchestrator::initialize`](crate::Orchestrator::initialize).
pub trait ProfileSource: Sync {
    fn profile(&self, machine: &Machine) -> anyhow::Result<Box<dyn ProfileNode>>;
}

impl<F> ProfileSource for F
where
    F: Fn(&Machine) -> anyhow::Result<Box<dyn ProfileNode>> + Sync,
{
    fn profile(&self, machine: &Machine) -> anyhow::Result<Box<dyn ProfileNode>> {
        self(machine)
    }
}

#[derive(Debug)]
enum Part {
    Step(Phase, Step),
    Node(Box<dyn ProfileNode>),
}

/// Flat concatenation of steps and child nodes
#[derive(Debug)]
pub struct StructuredProfile {
    label: String,
    parts: Vec<Part>,
}

impl StructuredProfile {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, phase: Phase, step: impl Into<Step>) {
        self.parts.push(Part::Step(phase, step.into()));
    }

    pub fn push_node(&mut self, node: Box<dyn ProfileNode>) {
        self.parts.push(Part::Node(node));
    }

    #[must_use]
    pub fn with(mut self, phase: Phase, step: impl Into<Step>) -> Self {
        self.push(phase, step);
        self
    }

    #[must_use]
    pub fn with_node(mut self, node: impl ProfileNode + 'static) -> Self {
        self.push_node(Box::new(node));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl ProfileNode for StructuredProfile {
    fn label(&self) -> &str {
        &self.label
    }

    fn emit(&self, phase: Phase) -> Vec<Step> {
        let mut steps = Vec::new();
        for part in &self.parts {
            match part {
                Part::Step(p, step) if *p == phase => steps.push(step.clone()),
                Part::Step(..) => {}
                Part::Node(node) => steps.extend(node.emit(phase)),
            }
        }
        steps
    }

    fn terminals(&self, phase: Phase) -> Vec<String> {
        let mut labels = Vec::new();
        for part in &self.parts {
            match part {
                Part::Step(p, step) if *p == phase => labels.push(step.label().to_string()),
                Part::Step(..) => {}
                Part::Node(node) => labels.extend(node.terminals(phase)),
            }
        }
        labels
    }
}

/// A member of a compound block
#[derive(Debug)]
pub enum Member {
    Unit(Unit),
    Node(Box<dyn ProfileNode>),
}

impl Member {
    fn emit(&self, phase: Phase) -> Vec<Step> {
        match self {
            Self::Unit(unit) => vec![Step::Unit(unit.clone())],
            Self::Node(node) => node.emit(phase),
        }
    }

    fn terminals(&self, phase: Phase) -> Vec<String> {
        match self {
            Self::Unit(unit) => vec![unit.label().to_string()],
            Self::Node(node) => node.terminals(phase),
        }
    }
}

impl From<Unit> for Member {
    fn from(unit: Unit) -> Self {
        Self::Unit(unit)
    }
}

/// Members bracketed by `<name>_compound` and the `<name>` aggregator
///
/// The whole block belongs to one phase. `<name>` is 1 only when every
/// member's terminal signal is 1; a failing member never stops its
/// siblings from being emitted or run.
#[derive(Debug)]
pub struct CompoundProfile {
    name: String,
    phase: Phase,
    precondition: Precondition,
    members: Vec<Member>,
    on_change: Option<String>,
    message: Option<String>,
}

impl CompoundProfile {
    pub fn new(name: impl Into<String>, phase: Phase, precondition: impl Into<Precondition>) -> Self {
        Self {
            name: name.into(),
            phase,
            precondition: precondition.into(),
            members: Vec::new(),
            on_change: None,
            message: None,
        }
    }

    pub fn push(&mut self, member: impl Into<Member>) {
        self.members.push(member.into());
    }

    #[must_use]
    pub fn with(mut self, member: impl Into<Member>) -> Self {
        self.push(member);
        self
    }

    #[must_use]
    pub fn with_node(mut self, node: impl ProfileNode + 'static) -> Self {
        self.members.push(Member::Node(Box::new(node)));
        self
    }

    /// Fragment run in config scripts after any member applied a change
    #[must_use]
    pub fn on_change(mut self, fragment: impl Into<String>) -> Self {
        self.on_change = Some(fragment.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl ProfileNode for CompoundProfile {
    fn label(&self) -> &str {
        &self.name
    }

    fn emit(&self, phase: Phase) -> Vec<Step> {
        if phase != self.phase {
            return Vec::new();
        }

        let mut steps = vec![Step::from(CompoundUnit::open(
            &self.name,
            self.precondition.clone(),
        ))];
        let mut members = Vec::with_capacity(self.members.len());
        for member in &self.members {
            steps.extend(member.emit(phase));
            members.extend(member.terminals(phase));
        }

        let mut close = CompoundUnit::close(
            &self.name,
            self.precondition.clone(),
            members,
            self.on_change.clone(),
        );
        if let Some(message) = &self.message {
            close = close.with_message(message);
        }
        steps.push(Step::from(close));
        steps
    }

    fn terminals(&self, phase: Phase) -> Vec<String> {
        if phase == self.phase {
            vec![self.name.clone()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(label: &str, pre: &str) -> Unit {
        Unit::new(label, pre, "", "echo ok", "ok")
    }

    fn labels(steps: &[Step]) -> Vec<&str> {
        steps.iter().map(Step::label).collect()
    }

    #[test]
    fn test_structured_concatenates_in_declared_order() {
        let profile = StructuredProfile::new("m1")
            .with(Phase::Install, unit("a", "proceed"))
            .with(Phase::LiveConfig, unit("c", "a"))
            .with(Phase::Install, unit("b", "a"));

        assert_eq!(labels(&profile.emit(Phase::Install)), ["a", "b"]);
        assert_eq!(labels(&profile.emit(Phase::LiveConfig)), ["c"]);
        assert!(profile.emit(Phase::LiveFirewall).is_empty());
        assert_eq!(labels(&flatten(&profile)), ["a", "b", "c"]);
    }

    #[test]
    fn test_compound_brackets_members() {
        let compound = CompoundProfile::new("web", Phase::PersistentConfig, "proceed")
            .with(unit("web_conf", "proceed"))
            .with(unit("web_site", "web_conf"));

        let steps = compound.emit(Phase::PersistentConfig);
        assert_eq!(
            labels(&steps),
            ["web_compound", "web_conf", "web_site", "web"]
        );
        let Step::Compound(close) = &steps[3] else {
            panic!("expected closing aggregator");
        };
        assert_eq!(close.members(), ["web_conf", "web_site"]);
        assert!(compound.emit(Phase::Install).is_empty());
        assert_eq!(compound.terminals(Phase::PersistentConfig), ["web"]);
        assert!(compound.terminals(Phase::Install).is_empty());
    }

    #[test]
    fn test_nested_compound_uses_child_terminals() {
        let inner = CompoundProfile::new("inner", Phase::Install, "proceed")
            .with(unit("x", "proceed"));
        let outer = CompoundProfile::new("outer", Phase::Install, "proceed")
            .with_node(inner)
            .with(unit("y", "proceed"));

        let steps = outer.emit(Phase::Install);
        assert_eq!(
            labels(&steps),
            ["outer_compound", "inner_compound", "x", "inner", "y", "outer"]
        );
        let Step::Compound(close) = steps.last().unwrap() else {
            panic!("expected closing aggregator");
        };
        assert_eq!(close.members(), ["inner", "y"]);
    }

    #[test]
    fn test_compound_aggregates_every_step_of_structured_member() {
        let child = StructuredProfile::new("pair")
            .with(Phase::Install, Unit::new("a", "proceed", "", "false", "a failed"))
            .with(Phase::Install, unit("b", "proceed"))
            .with(Phase::LiveConfig, unit("elsewhere", "proceed"))
            .with_node(
                CompoundProfile::new("inner", Phase::Install, "proceed")
                    .with(unit("x", "proceed")),
            );
        let outer = CompoundProfile::new("outer", Phase::Install, "proceed").with_node(child);

        let steps = outer.emit(Phase::Install);
        let Step::Compound(close) = steps.last().unwrap() else {
            panic!("expected closing aggregator");
        };
        assert_eq!(close.members(), ["a", "b", "inner"]);
        assert!(close.audit_fragment(false).contains(r#"[ "$a" = "1" ]"#));
    }

    #[test]
    fn test_structured_embeds_compound() {
        let profile = StructuredProfile::new("m1")
            .with(Phase::Install, unit("pkg_installed", "proceed"))
            .with_node(
                CompoundProfile::new("svc", Phase::Install, "pkg_installed")
                    .with(unit("svc_conf", "proceed")),
            );
        assert_eq!(
            labels(&flatten(&profile)),
            ["pkg_installed", "svc_compound", "svc_conf", "svc"]
        );
    }
}
