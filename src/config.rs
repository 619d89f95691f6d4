use anyhow::{Context, Result};
use remotekit::{CredentialResolver, EnvStore, FileStore, SshOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// App Config
// ============================================================================

/// Contents of `bastion.toml`; every section is optional
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    pub ssh: SshConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// ssh client program
    pub program: String,
    /// Login user for machines that don't declare one
    pub user: Option<String>,
    /// Port for machines that don't declare one
    pub port: Option<u16>,
    /// Seconds; 0 disables the client timeout
    pub connect_timeout: u64,
    pub identity_file: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            port: None,
            connect_timeout: 10,
            identity_file: None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Credential file (default `<config>/credentials.toml`)
    pub file: Option<String>,
    /// Prefix of the per-machine secret variables
    pub env_prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            file: None,
            env_prefix: "BASTION_SECRET_".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where dry-run scripts are written (default: current directory)
    pub dryrun_dir: Option<String>,
    /// Suppress `pass:` lines in audit scripts
    pub quiet: bool,
}

impl BastionConfig {
    /// Load `<config>/bastion.toml`, or defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Options for the ssh transport
    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            program: self.ssh.program.clone(),
            connect_timeout: (self.ssh.connect_timeout > 0).then_some(self.ssh.connect_timeout),
            identity_file: self.ssh.identity_file.as_deref().map(paths::expand),
            extra_args: self.ssh.extra_args.clone(),
        }
    }

    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.credentials.file {
            Some(file) => Ok(paths::expand(file)),
            None => Ok(paths::config_dir()?.join(paths::CREDENTIALS_FILE)),
        }
    }

    /// Environment first, then the credential file
    pub fn resolver(&self) -> Result<CredentialResolver> {
        let file = self.credentials_file()?;
        let store = FileStore::load(&file)
            .with_context(|| format!("Could not load credentials from {}", file.display()))?;
        Ok(CredentialResolver::new()
            .with_store(EnvStore::new(&self.credentials.env_prefix))
            .with_store(store))
    }

    /// Directory for dry-run scripts; `--out` wins over the config
    pub fn dryrun_dir(&self, explicit: Option<&Path>) -> PathBuf {
        match (explicit, &self.output.dryrun_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => paths::expand(dir),
            (None, None) => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = BastionConfig::load_from(&tmp.path().join("bastion.toml")).unwrap();
        assert_eq!(config.ssh.program, "ssh");
        assert_eq!(config.ssh.connect_timeout, 10);
        assert_eq!(config.credentials.env_prefix, "BASTION_SECRET_");
        assert!(!config.output.quiet);
        assert_eq!(config.dryrun_dir(None), PathBuf::from("."));
    }

    #[test]
    fn test_partial_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bastion.toml");
        fs::write(
            &path,
            r#"
[ssh]
user = "ops"
connect_timeout = 0
extra_args = ["-o", "StrictHostKeyChecking=accept-new"]

[output]
dryrun_dir = "/var/tmp/bastion"
quiet = true
"#,
        )
        .unwrap();

        let config = BastionConfig::load_from(&path).unwrap();
        assert_eq!(config.ssh.user.as_deref(), Some("ops"));
        assert_eq!(config.ssh.program, "ssh");
        assert!(config.output.quiet);

        let options = config.ssh_options();
        assert_eq!(options.connect_timeout, None);
        assert_eq!(options.extra_args.len(), 2);

        assert_eq!(config.dryrun_dir(None), PathBuf::from("/var/tmp/bastion"));
        assert_eq!(
            config.dryrun_dir(Some(Path::new("out"))),
            PathBuf::from("out")
        );
    }

    #[test]
    fn test_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bastion.toml");
        fs::write(&path, "[ssh\nuser = 1").unwrap();
        assert!(BastionConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_resolver_reads_credential_file() {
        let tmp = TempDir::new().unwrap();
        let creds = tmp.path().join("creds.toml");
        fs::write(&creds, "[machines]\nr1 = \"pw\"\n").unwrap();

        let config = BastionConfig {
            credentials: CredentialsConfig {
                file: Some(creds.display().to_string()),
                env_prefix: "BASTION_TEST_UNSET_PREFIX_".to_string(),
            },
            ..BastionConfig::default()
        };
        let resolver = config.resolver().unwrap();
        assert_eq!(resolver.resolve("r1").unwrap().machine(), "r1");
        assert!(resolver.resolve("m1").is_err());
    }
}
