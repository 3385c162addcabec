// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use hostbroker::cli::{self, Cli};
use hostbroker::Settings;

use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    // RUST_LOG=hostbroker=trace,warn (sets hostbroker to trace, others to warn)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");

    let cli_args = Cli::parse();

    let settings = Settings::load(cli_args.settings.as_deref())
        .context("Failed to load settings")
        .map(Arc::new)?;
    info!(
        "Settings loaded ({} provider blocks, {} nicks)",
        settings.provider_names().len(),
        settings.nicks.len()
    );
    debug!(
        "Console log level from settings: {}",
        settings.logging.console_level
    );

    cli::handle_command(cli_args.command, Arc::clone(&settings))
}
