//! Configuration management for the travel monitor.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Deserialize;

use travel_common::constants::{
    DEFAULT_BLOOM_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_CONFIG_PATH, DEFAULT_SHUTDOWN_GRACE_MS,
    DEFAULT_WORKERS, HEADER_LEN,
};

/// Coordinator command-line arguments
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Number of worker processes (overrides config)
    #[arg(short = 'm', long = "workers", env = "TRAVEL_WORKERS")]
    pub workers: Option<usize>,

    /// Channel buffer size in bytes (overrides config)
    #[arg(short = 'b', long, env = "TRAVEL_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Bloom filter size in bytes (overrides config)
    #[arg(short = 's', long, env = "TRAVEL_BLOOM_SIZE")]
    pub bloom_size: Option<usize>,

    /// Root input directory, one subdirectory per country (overrides config)
    #[arg(short = 'i', long, env = "TRAVEL_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory for summary files (overrides config)
    #[arg(long, env = "TRAVEL_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Program started for each worker (defaults to this executable)
    #[arg(long)]
    pub worker_program: Option<PathBuf>,

    /// How long workers get to write their summary on shutdown
    #[arg(long)]
    pub shutdown_grace_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    pub json_logs: bool,
}

/// Worker command-line arguments, filled in by the coordinator
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Directory for the summary file
    #[arg(long)]
    pub log_dir: PathBuf,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value = "false")]
    pub json_logs: bool,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Number of worker processes
    #[serde(default = "default_workers")]
    pub num_workers: usize,

    /// Channel buffer size in bytes, at least one frame header
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Bloom filter size in bytes
    #[serde(default = "default_bloom_size")]
    pub bloom_size: usize,

    /// Root input directory
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Summary file directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Worker executable; `None` means the running binary
    #[serde(default)]
    pub worker_program: Option<PathBuf>,

    /// Shutdown grace period per worker in milliseconds
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Log level handed to workers
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_workers() -> usize { DEFAULT_WORKERS }
fn default_buffer_size() -> usize { DEFAULT_BUFFER_SIZE }
fn default_bloom_size() -> usize { DEFAULT_BLOOM_SIZE }
fn default_input_dir() -> PathBuf { PathBuf::from("input_dir") }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_shutdown_grace_ms() -> u64 { DEFAULT_SHUTDOWN_GRACE_MS }
fn default_log_level() -> String { "info".to_string() }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &StartArgs) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(workers) = args.workers {
            config.num_workers = workers;
        }
        if let Some(buffer_size) = args.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(bloom_size) = args.bloom_size {
            config.bloom_size = bloom_size;
        }
        if let Some(ref input_dir) = args.input_dir {
            config.input_dir = input_dir.clone();
        }
        if let Some(ref log_dir) = args.log_dir {
            config.log_dir = log_dir.clone();
        }
        if let Some(ref program) = args.worker_program {
            config.worker_program = Some(program.clone());
        }
        if let Some(grace) = args.shutdown_grace_ms {
            config.shutdown_grace_ms = grace;
        }
        config.log_level = args.log_level.clone();
        config.json_logs = args.json_logs;

        Ok(config)
    }

    /// Startup checks that must pass before any worker is started
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            bail!("number of workers must be at least 1");
        }
        if self.buffer_size < HEADER_LEN {
            bail!(
                "buffer size {} is smaller than a message header ({} bytes)",
                self.buffer_size,
                HEADER_LEN
            );
        }
        if self.bloom_size == 0 {
            bail!("bloom filter size must be at least 1 byte");
        }
        if u32::try_from(self.buffer_size).is_err() || u32::try_from(self.bloom_size).is_err() {
            bail!("buffer and bloom filter sizes must fit in 32 bits");
        }
        std::fs::read_dir(&self.input_dir)
            .with_context(|| format!("Cannot open input directory {}", self.input_dir.display()))?;
        Ok(())
    }

    /// Executable used for worker processes
    pub fn worker_program(&self) -> Result<PathBuf> {
        match &self.worker_program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().context("Failed to locate the worker executable"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            num_workers: default_workers(),
            buffer_size: default_buffer_size(),
            bloom_size: default_bloom_size(),
            input_dir: default_input_dir(),
            log_dir: default_log_dir(),
            worker_program: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}
