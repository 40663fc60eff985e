//! Configuration file handling for the CLI.
//!
//! The CLI reads the same TOML layout as the server. Without an explicit
//! path it looks in `~/.scrivener/config.toml`, and a missing file means
//! defaults.

use crate::error::{CliError, Result};
use scrivener_server::config::ScrivenerConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the default configuration file path.
pub fn default_path() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".scrivener").join("config.toml"))
}

/// Resolve an explicit path or fall back to the default location.
pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(PathBuf::from(path)),
        None => default_path(),
    }
}

/// Load configuration from `path`, or defaults when the file is absent.
pub fn load(path: &Path) -> Result<ScrivenerConfig> {
    if path.exists() {
        Ok(ScrivenerConfig::from_file(path)?)
    } else {
        Ok(ScrivenerConfig::default())
    }
}

/// Write a default configuration file.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let contents = ScrivenerConfig::default().to_toml()?;
    fs::write(path, contents)?;
    Ok(())
}
