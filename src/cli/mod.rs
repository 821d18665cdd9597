//! Command-line interface for promtable.
//!
//! Runs a concurrent update workload against an in-process adapter and
//! prints the collected snapshot as JSON.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, MetricsError, Result};
use crate::metrics::{Command, MetricFamily, StorageAdapter, UpdateRequest};
use clap::Parser;
use std::path::PathBuf;

/// Prometheus histogram defaults.
const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Exercise the shared metric tables from several worker threads.
#[derive(Parser, Debug)]
#[command(name = "promtable")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/promtable/config.yaml)
    #[arg(short, long, env = "PROMTABLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum distinct metric names per type
    #[arg(long, env = "PROMTABLE_TABLE_SIZE")]
    pub table_size: Option<usize>,

    /// Maximum serialized bytes per metric record
    #[arg(long, env = "PROMTABLE_VALUE_SIZE")]
    pub value_size: Option<usize>,

    /// Number of concurrent worker threads
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Updates of each metric type per worker
    #[arg(short, long, default_value_t = 1000)]
    pub iterations: usize,

    /// Enable debug logging
    #[arg(short, long, env = "PROMTABLE_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = self.config.clone().or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("promtable").join("config.yaml"))
                .filter(|p| p.exists())
        });

        match config_path {
            Some(path) => builder = builder.from_file(&path)?,
            None => tracing::debug!("No config file found, using defaults"),
        }

        if let Some(slots) = self.table_size {
            builder = builder.table_size(slots);
        }
        if let Some(bytes) = self.value_size {
            builder = builder.value_size(bytes);
        }

        builder.build()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("PROMTABLE_LOG_LEVEL")
            .unwrap_or_else(|_| config.logging.level.as_str().to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.logging.structured)
            .with_thread_ids(config.logging.structured)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Outcome of one workload run.
#[derive(Debug)]
pub struct RunReport {
    /// Snapshot collected after every worker finished
    pub families: Vec<MetricFamily>,
    /// Updates refused for capacity
    pub rejected: usize,
}

/// Drive `workers` threads through `iterations` updates of each metric type.
///
/// Capacity rejections are counted rather than aborting the run; any other
/// error stops it.
pub fn run_workload(
    storage: &StorageAdapter,
    workers: usize,
    iterations: usize,
) -> Result<RunReport> {
    let rejected = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| scope.spawn(move || drive_worker(storage, worker, iterations)))
            .collect();

        let mut rejected = 0;
        for handle in handles {
            rejected += handle
                .join()
                .map_err(|_| MetricsError::config("worker thread panicked"))??;
        }
        Ok::<usize, MetricsError>(rejected)
    })?;

    Ok(RunReport {
        families: storage.collect()?,
        rejected,
    })
}

fn drive_worker(storage: &StorageAdapter, worker: usize, iterations: usize) -> Result<usize> {
    let worker_label = worker.to_string();
    let mut rejected = 0;

    for i in 0..iterations {
        let observed = (i % 100) as f64 / 10.0;
        let requests = [
            UpdateRequest::counter("workload_updates_total", "Updates issued", 1.0, Command::Add),
            UpdateRequest::gauge("workload_progress", "Last iteration seen", i as f64, Command::Set)
                .with_labels(["worker"], [worker_label.as_str()]),
            UpdateRequest::histogram(
                "workload_value",
                "Observed values",
                observed,
                DEFAULT_BUCKETS.to_vec(),
            ),
            UpdateRequest::summary("workload_value_window", "Recent values", observed, 60, vec![
                0.5, 0.9, 0.99,
            ]),
        ];

        for req in &requests {
            match storage.update(req) {
                Ok(()) => {},
                Err(e) if e.is_capacity_exceeded() => rejected += 1,
                Err(e) => return Err(e),
            }
        }
    }

    Ok(rejected)
}

/// Execute the promtable command.
pub fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.check_config {
        println!("Configuration is valid");
        println!("{:#?}", config.storage);
        return Ok(());
    }

    cli.init_logging(&config)?;
    tracing::info!(
        "Running {} workers x {} iterations ({} slots, {} byte cells)",
        cli.workers,
        cli.iterations,
        config.storage.table_size,
        config.storage.value_size
    );

    let storage = StorageAdapter::new(config.storage)?;
    let report = run_workload(&storage, cli.workers, cli.iterations)?;

    if report.rejected > 0 {
        tracing::warn!("{} updates rejected for capacity", report.rejected);
    }

    let json = serde_json::to_string_pretty(&report.families)
        .map_err(|e| MetricsError::encoding(format!("cannot render snapshot: {}", e)))?;
    println!("{}", json);
    Ok(())
}
