//! # travel-monitor
//!
//! `travel-monitor start` runs the coordinator and its interactive session.
//! `travel-monitor worker` is started by the coordinator for each shard and
//! talks to it over stdin/stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use travel_monitor::config::{AppConfig, StartArgs, WorkerArgs};
use travel_monitor::coordinator::Coordinator;
use travel_monitor::triggers::Triggers;
use travel_monitor::{session, worker};

/// Travel Monitor - sharded vaccination and travel clearance
#[derive(Parser, Debug)]
#[command(name = "travel-monitor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the coordinator and read commands from stdin
    Start(StartArgs),
    /// Run a worker (started by the coordinator)
    Worker(WorkerArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.mode {
        Mode::Start(args) => {
            init_logging(&args.log_level, args.json_logs)?;
            let result = start(args).await;
            if let Err(e) = &result {
                tracing::error!(error = ?e, "Travel monitor failed");
            }
            // A pending stdin read cannot be cancelled and would hold the
            // runtime open until the next line arrives
            std::process::exit(if result.is_ok() { 0 } else { 1 });
        }
        Mode::Worker(args) => {
            init_logging(&args.log_level, args.json_logs)?;
            worker::run(args).await
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    info!("🔥 Starting travel monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    config.validate()?;
    info!(
        workers = config.num_workers,
        buffer_size = config.buffer_size,
        bloom_size = config.bloom_size,
        input_dir = %config.input_dir.display(),
        "📋 Configuration loaded"
    );

    // Registered before any worker starts so no child exit goes unnoticed
    let mut triggers = Triggers::coordinator().context("Failed to register signal handlers")?;

    let mut coordinator = Coordinator::start(config).await.context("Bootstrap failed")?;

    let result = session::run(&mut coordinator, &mut triggers).await;
    coordinator.shutdown().await;

    info!("👋 Travel monitor shutdown complete");
    result.context("Session failed")
}

/// Initialize structured logging with tracing. Output goes to stderr:
/// stdout carries command output (coordinator) or the channel (worker).
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
