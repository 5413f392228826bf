//! Show the paired wearable and effective configuration.

use anyhow::{Context, Result};
use std::path::Path;
use watchlink_sync_client::{DevicePersistenceStore, FileDeviceStore, StoreError};

use crate::config::LoadedConfig;

/// Run the status command.
pub async fn run(data_dir: &Path, loaded: &LoadedConfig) -> Result<()> {
    println!("=== watchlink status ===");
    println!();

    let store = FileDeviceStore::in_dir(data_dir);
    match store.load().await {
        Ok(Some(device)) => {
            println!("Device:");
            println!("  UUID:  {}", device.uuid);
            println!("  Model: {}", device.model_name);
            println!("  Name:  {}", device.friendly_name);
        }
        Ok(None) => {
            println!("Device: NOT PAIRED");
            println!();
            println!("Run 'watchlink select <callback-url>' to pair.");
        }
        Err(StoreError::InvalidDeviceIdentity(reason)) => {
            println!("Device: UNREADABLE ({})", reason);
            println!();
            println!("Run 'watchlink forget' and pair again.");
        }
        Err(e) => return Err(e).context("Failed to read paired device"),
    }

    println!();
    match &loaded.source {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: defaults"),
    }
    let rendered = toml::to_string_pretty(&loaded.config).context("Failed to render config")?;
    for line in rendered.lines() {
        println!("  {}", line);
    }

    Ok(())
}
