//! Cuetide CLI - Command-line interface
//!
//! Inspects scenario files and runs simulated subtitle playback sessions.

mod commands;

use anyhow::Context;
use clap::Parser;
use cuetide_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "cuetide")]
#[command(about = "Subtitle fragment scheduling simulator")]
struct Cli {
    /// Console log level; the log file always records everything
    #[arg(long, global = true, default_value = "warn")]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to initialize logging")?;

    if let Err(error) = commands::handle_command(cli.command).await {
        tracing::error!(%error, "Command failed");
        anyhow::bail!(error.user_message());
    }

    Ok(())
}
