//! Tether - multi-store HTTP session repository
//!
//! Main entry point for the Tether CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod stores;

use commands::{demo, ttl, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tether - multi-store HTTP session repository
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovering one
    #[arg(short, long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate configuration
    Validate(validate::ValidateArgs),

    /// Evaluate the idle-timeout policy for a simulated request
    Ttl(ttl::TtlArgs),

    /// Create, replicate and read back a session using the configured stores
    Demo(demo::DemoArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "tether=debug,tether_session=debug,tether_config=debug,info"
    } else {
        "tether=info,tether_session=warn,tether_config=warn,warn"
    };

    let log_dir = tether_config::user_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tether.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tether=trace,tether_session=trace,tether_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context::load(cli.config.as_deref(), cli.json, cli.verbose)?;

    match cli.command {
        Commands::Validate(args) => validate::run(args, &ctx).await,
        Commands::Ttl(args) => ttl::run(args, &ctx).await,
        Commands::Demo(args) => demo::run(args, &ctx).await,
    }
}
