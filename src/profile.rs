//! Manifest-backed profile source
//!
//! Turns each [`MachineSpec`] into a [`StructuredProfile`]: plain entries
//! become units in their phase, `kind = "compound"` entries become a
//! [`unitscript::CompoundProfile`] node for that phase.

use anyhow::{Result, bail};
use unitscript::{Machine, Phase, ProfileNode, ProfileSource, StructuredProfile};

use crate::resource::UnitSpec;
use crate::schema::{MachineSpec, NetworkManifest};

/// Builds profiles from a loaded [`NetworkManifest`]
#[derive(Debug, Clone, Copy)]
pub struct ManifestSource<'a> {
    manifest: &'a NetworkManifest,
}

impl<'a> ManifestSource<'a> {
    pub fn new(manifest: &'a NetworkManifest) -> Self {
        Self { manifest }
    }
}

impl ProfileSource for ManifestSource<'_> {
    fn profile(&self, machine: &Machine) -> Result<Box<dyn ProfileNode>> {
        let Some(spec) = self.manifest.find(&machine.label) else {
            bail!("machine '{}' is not declared in the manifest", machine.label);
        };
        if spec.role != machine.role {
            bail!(
                "machine '{}' is declared as {} but requested as {}",
                machine.label,
                spec.role,
                machine.role
            );
        }
        Ok(Box::new(structured(spec)))
    }
}

fn structured(spec: &MachineSpec) -> StructuredProfile {
    let mut profile = StructuredProfile::new(&spec.label);
    for phase in Phase::ALL {
        for entry in spec.phase(phase) {
            match entry {
                UnitSpec::Compound(compound) => {
                    profile.push_node(Box::new(compound.profile(phase)));
                }
                other => {
                    if let Some(kind) = other.as_kind() {
                        profile.push(phase, kind.unit());
                    }
                }
            }
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitscript::{Action, Orchestrator, Role, Step, flatten};

    const MANIFEST: &str = r#"
label = "home"

[[machines]]
label = "r1"
role = "router"

[[machines.live_config]]
kind = "simple"
name = "forwarding"
audit = "sysctl -n net.ipv4.ip_forward"
expected = "1"
apply = "sudo sysctl -w net.ipv4.ip_forward=1;"

[[machines.install]]
kind = "installed"
name = "dhcp"
package = "isc-dhcp-server"

[[machines.persistent_config]]
kind = "compound"
name = "dhcp_conf"
precondition = "dhcp_installed"
on_change = "sudo systemctl restart isc-dhcp-server;"

[[machines.persistent_config.units]]
kind = "dir"
name = "dhcp_dir"
path = "/etc/dhcp"

[[machines.persistent_config.units]]
kind = "file_perms"
name = "dhcpd_conf"
path = "/etc/dhcp/dhcpd.conf"
mode = "644"
precondition = "dhcp_dir_created"
"#;

    fn manifest() -> NetworkManifest {
        toml::from_str(MANIFEST).unwrap()
    }

    #[test]
    fn test_entries_follow_phase_order() {
        let manifest = manifest();
        let source = ManifestSource::new(&manifest);
        let node = source.profile(&Machine::new("r1", Role::Router)).unwrap();

        let labels: Vec<String> = flatten(node.as_ref())
            .iter()
            .map(|s| s.label().to_string())
            .collect();
        assert_eq!(
            labels,
            [
                "dhcp_installed",
                "dhcp_conf_compound",
                "dhcp_dir_created",
                "dhcpd_conf_perms",
                "dhcp_conf",
                "forwarding",
            ]
        );
    }

    #[test]
    fn test_compound_entry_becomes_block() {
        let manifest = manifest();
        let node = ManifestSource::new(&manifest)
            .profile(&Machine::new("r1", Role::Router))
            .unwrap();

        let steps = node.emit(Phase::PersistentConfig);
        let Step::Compound(close) = steps.last().unwrap() else {
            panic!("expected closing marker");
        };
        assert_eq!(close.members(), ["dhcp_dir_created", "dhcpd_conf_perms"]);
    }

    #[test]
    fn test_unknown_machine() {
        let manifest = manifest();
        let source = ManifestSource::new(&manifest);
        let err = source
            .profile(&Machine::new("r9", Role::Router))
            .unwrap_err();
        assert!(err.to_string().contains("r9"));

        let err = source.profile(&Machine::new("r1", Role::Metal)).unwrap_err();
        assert!(err.to_string().contains("declared as router"));
    }

    #[test]
    fn test_manifest_compiles() {
        let manifest = manifest();
        let orchestrator =
            Orchestrator::initialize(&manifest.network(), &ManifestSource::new(&manifest))
                .unwrap();
        let script = orchestrator.compile("r1", Action::Audit).unwrap();
        assert_eq!(script.section_count(), 6);
        assert!(script.text().contains("#============ dhcp_conf ============="));
    }
}
