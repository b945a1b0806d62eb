//! # Warden REPL
//!
//! Loads policy files and answers goals typed on stdin, one per line.
//!
//! ```text
//! warden-repl policy.polar roles.polar --config warden.toml
//! > allow("alice", "read", {owner: "alice"})
//! True
//! ```
//!
//! Environment variables:
//! - `WARDEN_CONFIG` - configuration file (same as `--config`)
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::info;
use warden_authz::{Warden, WardenConfig};

/// Warden policy REPL
#[derive(Parser)]
#[command(name = "warden-repl")]
#[command(about = "Interactive query shell for Warden authorization policies")]
#[command(version)]
struct Cli {
    /// Policy files to load before the first query
    files: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so query output stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => WardenConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WardenConfig::default(),
    };
    let warden = Warden::with_config(config).context("Failed to initialize engine")?;

    for file in &cli.files {
        warden
            .enqueue_file(file)
            .with_context(|| format!("Failed to read policy file {}", file.display()))?;
    }
    info!(files = cli.files.len(), "Starting REPL");

    let stdin = io::stdin();
    warden
        .repl(stdin.lock(), io::stdout().lock())
        .context("REPL terminated")?;
    Ok(())
}
