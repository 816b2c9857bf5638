//! Flagrun CLI - Command-line interface
//!
//! Runs feature flag regression trials and manages persisted settings.

mod commands;
mod dashboard;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use flagrun_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "flagrun")]
#[command(about = "A feature flag regression trial runner")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,

    /// Directory receiving the full trace log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Path of the persisted settings file
    #[arg(long, global = true, default_value = ".flagrun/settings.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("failed to initialize logging")?;
    tracing::debug!("Writing trace log to {}", log_file.display());

    if let Err(e) = commands::handle_command(cli.command, &cli.settings).await {
        tracing::error!("{}", e);
        anyhow::bail!(e.user_message());
    }

    Ok(())
}
