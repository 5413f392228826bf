//! # watchlink
//!
//! Operator CLI for watchlink.
//!
//! ## Commands
//!
//! - `status`: Show the paired wearable and the effective configuration
//! - `forget`: Clear the paired wearable
//! - `select`: Ingest a device-selection callback URL
//! - `simulate`: Run a scripted workout against mock SDKs
//!
//! ## Example
//!
//! ```bash
//! # Pair from a picker callback
//! watchlink select 'watchlink-ciq://device-select-resp?devices=...'
//!
//! # Show what is stored
//! watchlink status
//!
//! # Watch a workout go out over both transports
//! watchlink -v simulate --unreachable
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{forget, select, simulate, status};

/// Operator CLI for watchlink.
#[derive(Parser, Debug)]
#[command(name = "watchlink")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the paired device and config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/watchlink.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the paired wearable and effective configuration
    Status,

    /// Forget the paired wearable
    Forget,

    /// Pair from a device-selection callback URL
    Select {
        /// Callback URL delivered by the device picker
        url: String,
    },

    /// Run a four-state workout through mock transports
    Simulate {
        /// Simulate a wearable that is out of range for immediate messages
        #[arg(long)]
        unreachable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let loaded = config::load(&data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Status => status::run(&data_dir, &loaded).await?,
        Commands::Forget => forget::run(&data_dir).await?,
        Commands::Select { url } => select::run(&data_dir, &loaded.config, &url).await?,
        Commands::Simulate { unreachable } => simulate::run(&loaded.config, unreachable).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = match verbose {
        0 => "warn,watchlink=info,watchlink_sync_client=info",
        1 => "warn,watchlink=debug,watchlink_sync_client=debug",
        _ => "warn,watchlink=trace,watchlink_sync_client=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
