//! Package resource - ensure a Debian package is installed

use serde::{Deserialize, Serialize};
use unitscript::{Precondition, Unit, quote};

use super::{UnitKind, with_message};

/// The status line dpkg prints for an installed package
pub const INSTALLED_STATUS: &str = "Status: install ok installed";

/// A package installed through apt when dpkg doesn't report it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Unit name (the label gets `_installed` appended)
    pub name: String,
    #[serde(default)]
    pub precondition: Precondition,
    /// Package name as apt knows it
    pub package: String,
    pub message: Option<String>,
}

impl UnitKind for Package {
    fn kind(&self) -> &'static str {
        "installed"
    }

    fn unit(&self) -> Unit {
        let package = quote(&self.package);
        let unit = Unit::new(
            format!("{}_installed", self.name),
            self.precondition.clone(),
            format!("sudo DEBIAN_FRONTEND=noninteractive apt-get --assume-yes install {package};"),
            format!("dpkg-query --status {package} 2>&1 | grep \"Status:\";"),
            INSTALLED_STATUS,
        )
        .with_message(format!("Couldn't install {}", self.package));
        with_message(unit, self.message.as_deref())
    }
}
