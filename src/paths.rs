//! Centralized path resolution for bastion
//!
//! # Environment Variables
//!
//! - `BASTION_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/bastion`)
//! - `BASTION_NETWORK` - Override the network manifest path
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `BASTION_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/bastion` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\bastion`
//!    - macOS/Linux: `~/.config/bastion`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "BASTION_CONFIG_DIR";

/// Environment variable for the network manifest path
pub const ENV_NETWORK: &str = "BASTION_NETWORK";

/// App config file name inside the config directory
pub const CONFIG_FILE: &str = "bastion.toml";

/// Default network manifest name inside the config directory
pub const NETWORK_FILE: &str = "network.toml";

/// Default credential file name inside the config directory
pub const CREDENTIALS_FILE: &str = "credentials.toml";

/// Get the bastion config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join("bastion");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("bastion");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("bastion");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of `bastion.toml`
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Resolve the network manifest path
///
/// Priority: explicit flag (clap also reads `BASTION_NETWORK` into it),
/// then `<config>/network.toml`.
pub fn network_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(config_dir()?.join(NETWORK_FILE)),
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
