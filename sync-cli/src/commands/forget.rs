//! Forget the paired wearable.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use watchlink_sync_client::{DevicePersistenceStore, FileDeviceStore};

/// Run the forget command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let store = FileDeviceStore::in_dir(data_dir);
    store.clear().await.context("Failed to clear paired device")?;
    info!(data_dir = %data_dir.display(), "paired device cleared");

    println!("Paired device forgotten.");
    println!("The device picker will open on the next launch.");
    Ok(())
}
