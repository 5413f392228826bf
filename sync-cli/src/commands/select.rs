//! Pair from a device-selection callback URL.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;
use watchlink_sync_client::{DevicePersistenceStore, FileDeviceStore, LinkConfig, LinkError};
use watchlink_sync_core::parse_selection_url;

/// Run the select command.
pub async fn run(data_dir: &Path, config: &LinkConfig, url: &str) -> Result<()> {
    let devices = parse_selection_url(url, &config.link.callback_scheme)
        .map_err(LinkError::from)
        .context("Invalid device selection callback")?;

    let Some(first) = devices.first() else {
        bail!(LinkError::DiscoveryFailed("no devices selected".into()));
    };

    let store = FileDeviceStore::in_dir(data_dir);
    store
        .save(first)
        .await
        .context("Failed to save paired device")?;
    info!(device = %first.uuid, candidates = devices.len(), "paired from selection callback");

    println!("Paired: {} ({})", first.friendly_name, first.model_name);
    println!("  UUID: {}", first.uuid);
    if devices.len() > 1 {
        println!();
        println!("Other candidates (watched, not current):");
        for device in &devices[1..] {
            println!("  {} ({}) {}", device.friendly_name, device.model_name, device.uuid);
        }
    }
    Ok(())
}
