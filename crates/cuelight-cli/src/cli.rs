//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands;

#[derive(Parser)]
#[command(name = "cuelight")]
#[command(version = "0.1")]
#[command(about = "Playback-synchronized transcript highlighting toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Parse a transcript and report cue statistics
    Inspect {
        /// Path to the transcript file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a synchronized playback simulation over a synthetic document
    Simulate {
        /// Path to the transcript file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Simulation step in milliseconds
        #[arg(long, default_value_t = 250)]
        step_ms: u64,

        /// Engine tuning overrides (TOML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Emit transitions and diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect { file, json } => commands::inspect::run(&file, json).await,
        Commands::Simulate {
            file,
            step_ms,
            config,
            json,
        } => {
            commands::simulate::run(commands::simulate::SimulateOptions {
                file,
                step_ms,
                config,
                json,
            })
            .await
        }
    }
}
