//! hotasd - HOTAS fusion daemon
//!
//! Fuses configured stick/throttle/rudder devices into one virtual
//! Xbox-360-compatible controller. `hotasd` runs the daemon; `hotasd check`
//! reports configuration and device health without creating anything.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod check;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openhotas_engine::Daemon;

#[derive(Parser)]
#[command(name = "hotasd")]
#[command(about = "HOTAS fusion daemon - many flight controllers, one virtual gamepad")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    /// (default: ~/.config/openhotas/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fusion daemon (the default when no subcommand is given)
    Run,

    /// Validate the configuration and report device, binding, and
    /// calibration status without creating the virtual device
    Check {
        /// Output in JSON format for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set; pass --config explicitly")?;
    Ok(PathBuf::from(home).join(".config/openhotas/config.json"))
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hotasd={log_level},openhotas_engine={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            tracing::info!(config = %config_path.display(), "starting hotasd");
            let mut daemon = Daemon::from_file(&config_path).with_context(|| {
                format!("failed to start from {}", config_path.display())
            })?;
            daemon.run().context("daemon exited with an error")?;
            Ok(())
        }
        Commands::Check { json } => check::run(&config_path, json),
    }
}
