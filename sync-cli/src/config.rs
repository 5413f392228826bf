//! Configuration discovery for the CLI.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use watchlink_sync_client::LinkConfig;

/// Config file looked up inside the data directory.
pub const CONFIG_FILE: &str = "watchlink.toml";

/// Effective configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The configuration in effect.
    pub config: LinkConfig,
    /// File it was read from, if any.
    pub source: Option<PathBuf>,
}

/// Get the default data directory for watchlink.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "watchlink", "watchlink")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Load the configuration.
///
/// An explicit `--config` path must exist. The default file inside the data
/// directory is optional; without it every setting takes its default.
pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = LinkConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        return Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
        });
    }

    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(LoadedConfig {
            config: LinkConfig::default(),
            source: None,
        });
    }

    let config = LinkConfig::from_file(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok(LoadedConfig {
        config,
        source: Some(path),
    })
}
