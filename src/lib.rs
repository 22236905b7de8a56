//! dataload
//!
//! Benchmarks three strategies for loading a directory of large CSV files
//! and reports per-file timing, memory and CPU-affinity telemetry.
//!
//! # Architecture
//!
//! - **Ingest**: chunk planning, CSV record reading and per-file assembly
//! - **Pipeline**: mode orchestration, worker pool, host telemetry and the run summary
//! - **Analytics**: most and least viewed videos per year and region
//!
//! # Usage
//!
//! ```no_run
//! use dataload::{run_benchmark, Config, ProcessLauncher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("dataload.yaml".as_ref())?;
//!     run_benchmark(config, ProcessLauncher::current_exe()).await?;
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod report;

pub use analytics::{AnalyticsConfig, AnalyticsReporter};
pub use config::{Config, IngestConfig};
pub use error::{ConfigError, IngestError, WorkerFault};
pub use ingest::{CsvFiles, Dataset, FileIngestor};
pub use pipeline::{
    Metrics, Mode, Orchestrator, OrchestratorConfig, ProcessLauncher, RunOutcome, RunSummary,
    SystemCpu, SystemInfo, SystemProbe,
};

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// A finished run and where its summary was written.
#[derive(Debug)]
pub struct BenchmarkRun {
    pub outcome: RunOutcome,
    pub summary_path: PathBuf,
}

/// Ingest every matching file in the configured folder, print the report
/// and persist the summary CSV.
pub async fn run_benchmark(config: Config, launcher: ProcessLauncher) -> Result<BenchmarkRun> {
    config.validate()?;
    let mode = config.mode()?;
    let files = config.input.discover_files()?;

    tracing::info!("Starting dataload benchmark");
    tracing::info!(
        "{} files in {} ({} mode)",
        files.len(),
        config.input.folder.display(),
        mode
    );

    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig {
            mode,
            ingest: config.ingest.clone(),
            max_processes: config.processing.max_processes,
        },
        Arc::new(CsvFiles::new()),
        Arc::new(SystemProbe::new()),
        Arc::new(SystemCpu),
        launcher,
    );
    if config.output.enable_analytics {
        orchestrator = orchestrator.with_analytics(AnalyticsReporter::new(config.analytics.clone()));
    }

    let outcome = orchestrator.run(files).await;

    if let Some(analytics) = outcome.analytics.as_deref().filter(|a| !a.is_empty()) {
        println!("{}\n", analytics);
    }
    println!("{}", "System information".bold());
    println!("{}\n", SystemInfo::collect());
    println!("{}", outcome.summary.render());

    let summary_path = outcome.summary.persist(&config.output.summary_dir)?;
    tracing::info!("Summary written to {}", summary_path.display());

    Ok(BenchmarkRun {
        outcome,
        summary_path,
    })
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}

/// Initialize the Rayon thread pool.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}
