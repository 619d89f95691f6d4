//! Run planner - which machines, in which order

use anyhow::{Result, bail};
use unitscript::Orchestrator;

/// Machines named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Machines(Vec<String>),
}

impl Selection {
    /// `--all` and explicit machine names are mutually exclusive
    pub fn from_args(machines: Vec<String>, all: bool) -> Result<Self> {
        match (all, machines.is_empty()) {
            (true, true) => Ok(Self::All),
            (true, false) => bail!("Pass either machine names or --all, not both"),
            (false, false) => Ok(Self::Machines(machines)),
            (false, true) => bail!("No machines given (pass machine names or --all)"),
        }
    }
}

/// Resolve a selection into machine labels in global processing order
///
/// Unknown names are kept, after the known ones, so that each of them fails
/// on its own when it is compiled.
pub fn plan(orchestrator: &Orchestrator, selection: &Selection) -> Vec<String> {
    let ordered = orchestrator.machines();
    match selection {
        Selection::All => ordered.iter().map(|m| m.label.clone()).collect(),
        Selection::Machines(names) => {
            let mut known: Vec<(usize, &str)> = Vec::new();
            let mut unknown: Vec<&str> = Vec::new();
            for name in names {
                let name = name.as_str();
                if known.iter().any(|(_, n)| *n == name) || unknown.contains(&name) {
                    continue;
                }
                match ordered.iter().position(|m| m.label == name) {
                    Some(position) => known.push((position, name)),
                    None => unknown.push(name),
                }
            }
            known.sort_by_key(|(position, _)| *position);
            known
                .into_iter()
                .map(|(_, name)| name)
                .chain(unknown)
                .map(str::to_string)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitscript::{Machine, Network, ProfileNode, Role, StructuredProfile};

    fn orchestrator() -> Orchestrator {
        let network = Network::new("home")
            .with("r1", Role::Router)
            .with("m1", Role::Metal)
            .with("s1", Role::Service)
            .with("d1", Role::Device);
        let source = |m: &Machine| -> anyhow::Result<Box<dyn ProfileNode>> {
            Ok(Box::new(StructuredProfile::new(&m.label)))
        };
        Orchestrator::initialize(&network, &source).unwrap()
    }

    #[test]
    fn test_selection_from_args() {
        assert_eq!(Selection::from_args(vec![], true).unwrap(), Selection::All);
        assert!(Selection::from_args(vec![], false).is_err());
        assert!(Selection::from_args(vec!["r1".into()], true).is_err());
    }

    #[test]
    fn test_plan_all_is_globally_ordered() {
        assert_eq!(plan(&orchestrator(), &Selection::All), ["d1", "s1", "m1", "r1"]);
    }

    #[test]
    fn test_plan_named_machines() {
        let selection = Selection::Machines(vec![
            "r1".into(),
            "x9".into(),
            "d1".into(),
            "r1".into(),
        ]);
        assert_eq!(plan(&orchestrator(), &selection), ["d1", "r1", "x9"]);
    }
}
