//! Fail-closed credential lookup
//!
//! A credential is the secret that unlocks privileged execution on one
//! machine. Lookups go through a [`CredentialStore`]; the
//! [`CredentialResolver`] turns "no secret" into
//! [`CredentialError::Missing`] so that a machine without a credential is
//! never contacted.
//!
//! Secrets never appear in `Debug` or `Display` output.

use crate::error::CredentialError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Redaction marker printed in place of a secret
pub const REDACTED: &str = "[redacted]";

/// An opaque secret value
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret. Only the transport should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The transport sends the secret as one line ahead of the script
    pub fn is_single_line(&self) -> bool {
        !self.0.contains(['\n', '\r'])
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// A resolved secret bound to the machine it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    machine: String,
    secret: Secret,
}

impl Credential {
    pub fn new(machine: impl Into<String>, secret: Secret) -> Self {
        Self {
            machine: machine.into(),
            secret,
        }
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

/// Read-only source of per-machine secrets
pub trait CredentialStore: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Look up the secret for a machine; `Ok(None)` when there is none
    fn lookup(&self, machine: &str) -> Result<Option<Secret>, CredentialError>;
}

/// Secrets held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    secrets: HashMap<String, Secret>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, machine: impl Into<String>, secret: impl Into<String>) {
        self.secrets.insert(machine.into(), Secret::new(secret));
    }

    #[must_use]
    pub fn with(mut self, machine: impl Into<String>, secret: impl Into<String>) -> Self {
        self.insert(machine, secret);
        self
    }
}

impl CredentialStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn lookup(&self, machine: &str) -> Result<Option<Secret>, CredentialError> {
        Ok(self.secrets.get(machine).cloned())
    }
}

/// Secrets taken from environment variables named `<prefix><MACHINE>`
///
/// The machine label is upper-cased and every character that is not an
/// ASCII letter or digit becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvStore {
    prefix: String,
}

impl EnvStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Name of the variable holding `machine`'s secret
    pub fn variable(&self, machine: &str) -> String {
        let suffix: String = machine
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{suffix}", self.prefix)
    }
}

impl CredentialStore for EnvStore {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, machine: &str) -> Result<Option<Secret>, CredentialError> {
        Ok(std::env::var(self.variable(machine)).ok().map(Secret::new))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    machines: HashMap<String, Secret>,
}

/// Secrets read from a TOML file
///
/// ```toml
/// [machines]
/// r1 = "router secret"
/// m1 = "metal secret"
/// ```
///
/// A missing file is an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    secrets: HashMap<String, Secret>,
}

impl FileStore {
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("credential file {} not found", path.display());
                return Ok(Self {
                    path: path.to_path_buf(),
                    secrets: HashMap::new(),
                });
            }
            Err(source) => {
                return Err(CredentialError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        warn_if_shared(path);

        // The parser's rendered message quotes the offending source, which
        // here is a secret. Only the position is reported.
        let file: CredentialFile =
            toml::from_str(&content).map_err(|e| CredentialError::Store {
                path: path.to_path_buf(),
                message: parse_position(&content, e.span()),
            })?;

        log::debug!(
            "loaded {} credential(s) from {}",
            file.machines.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            secrets: file.machines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl CredentialStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn lookup(&self, machine: &str) -> Result<Option<Secret>, CredentialError> {
        Ok(self.secrets.get(machine).cloned())
    }
}

/// Describe where a parse error happened without quoting the source
fn parse_position(content: &str, span: Option<std::ops::Range<usize>>) -> String {
    let Some(span) = span else {
        return "malformed TOML".to_string();
    };
    let before = content.get(..span.start).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        + 1;
    format!("malformed TOML at line {line}, column {column}")
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path)
        && meta.permissions().mode() & 0o077 != 0
    {
        log::warn!(
            "credential file {} is readable by other users (mode {:o})",
            path.display(),
            meta.permissions().mode() & 0o777
        );
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

/// Resolves credentials from an ordered list of stores
///
/// The first store that has a non-empty secret wins. An empty chain
/// resolves nothing.
#[derive(Default)]
pub struct CredentialResolver {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(mut self, store: impl CredentialStore + 'static) -> Self {
        self.stores.push(Box::new(store));
        self
    }

    /// Resolve a machine's credential, failing closed when there is none
    pub fn resolve(&self, machine: &str) -> Result<Credential, CredentialError> {
        for store in &self.stores {
            match store.lookup(machine)? {
                Some(secret) if !secret.is_empty() => {
                    if !secret.is_single_line() {
                        return Err(CredentialError::InvalidSecret {
                            machine: machine.to_string(),
                        });
                    }
                    log::debug!("{machine}: credential found in {} store", store.name());
                    return Ok(Credential::new(machine, secret));
                }
                Some(_) => log::debug!("{machine}: empty secret in {} store", store.name()),
                None => {}
            }
        }
        Err(CredentialError::Missing {
            machine: machine.to_string(),
        })
    }

    /// Returns true if a credential is present, without exposing it
    pub fn has(&self, machine: &str) -> bool {
        self.resolve(machine).is_ok()
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("CredentialResolver")
            .field("stores", &names)
            .finish()
    }
}
