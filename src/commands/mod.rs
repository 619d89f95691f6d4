// Script runs
pub mod run;

// Inspection commands
pub mod check;
pub mod list;
pub mod show;

use anyhow::{Context as AnyhowContext, Result};
use unitscript::Orchestrator;

use crate::Context;
use crate::config::BastionConfig;
use crate::paths;
use crate::profile::ManifestSource;
use crate::schema::NetworkManifest;

/// Everything a command needs before it compiles anything
pub(crate) struct Loaded {
    pub config: BastionConfig,
    pub manifest: NetworkManifest,
}

impl Loaded {
    pub fn load(ctx: &Context) -> Result<Self> {
        let config = BastionConfig::load()?;
        let path = paths::network_file(ctx.network.as_deref())?;
        let manifest = NetworkManifest::load(&path)?;
        Ok(Self { config, manifest })
    }

    /// Build every machine's profile
    pub fn orchestrator(&self, quiet_passes: bool) -> Result<Orchestrator> {
        let orchestrator = Orchestrator::initialize(
            &self.manifest.network(),
            &ManifestSource::new(&self.manifest),
        )
        .with_context(|| format!("Could not initialize network '{}'", self.manifest.label))?;
        Ok(orchestrator.quiet_passes(quiet_passes || self.config.output.quiet))
    }
}
