//! dataload CLI
//!
//! Load a folder of CSV files sequentially, concurrently on one core, or in
//! worker processes across all cores, and report how long each file took.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dataload::pipeline::{ingest_in_worker, WorkerReport};
use dataload::report::file_inventory;
use dataload::{
    build_runtime, init_rayon, run_benchmark, Config, CsvFiles, IngestConfig, ProcessLauncher,
};

#[derive(Parser)]
#[command(name = "dataload")]
#[command(about = "Benchmark sequential, single-core and multi-core CSV loading", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Folder containing the CSV files
    #[arg(short, long, global = true)]
    folder: Option<PathBuf>,

    /// Read files concurrently on the least-loaded core
    #[arg(short = 's', long, global = true)]
    unique_process: bool,

    /// Read files in parallel worker processes across all cores
    #[arg(short = 'm', long, global = true)]
    multi_process: bool,

    /// Override records per chunk in multi-process mode
    #[arg(long, global = true)]
    rows_per_chunk: Option<usize>,

    /// Directory for the summary CSV
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Skip the ranking tables
    #[arg(long, global = true)]
    no_analytics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark (default if no command specified)
    Run,

    /// Validate configuration and list record counts and sizes of the input files
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "dataload.yaml")]
        output: PathBuf,
    },

    /// Ingest one file and print a JSON report on stdout
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        chunk_concurrency: Option<usize>,
    },
}

fn main() -> Result<()> {
    // stdout carries the report and worker JSON, so logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command(config)?;
        }

        Some(Commands::Validate) => {
            let config = load_config(&cli)?;
            validate_command(&config)?;
        }

        Some(Commands::GenerateConfig { ref output }) => {
            generate_config_command(output)?;
        }

        Some(Commands::Worker {
            ref file,
            chunk_concurrency,
        }) => {
            let defaults = IngestConfig::default();
            let ingest = IngestConfig {
                rows_per_chunk: cli.rows_per_chunk.unwrap_or(defaults.rows_per_chunk),
                chunk_concurrency,
            };
            worker_command(file, ingest)?;
        }
    }

    Ok(())
}

/// Configuration file (if any) with CLI overrides applied on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(folder) = &cli.folder {
        config.input.folder = folder.clone();
    }
    if cli.unique_process {
        config.mode.unique_process = true;
    }
    if cli.multi_process {
        config.mode.multi_process = true;
    }
    if let Some(rows) = cli.rows_per_chunk {
        config.ingest.rows_per_chunk = rows;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.summary_dir = dir.clone();
    }
    if cli.no_analytics {
        config.output.enable_analytics = false;
    }

    if config.input.folder.as_os_str().is_empty() {
        anyhow::bail!("No input folder given; pass -f <folder> or set input.folder");
    }

    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    config.validate()?;

    // Initialize Rayon
    init_rayon(config.processing.rayon_threads)?;

    // Build and run Tokio runtime
    let runtime = build_runtime(config.processing.worker_threads)?;
    runtime.block_on(async { run_benchmark(config, ProcessLauncher::current_exe()).await })?;

    Ok(())
}

fn validate_command(config: &Config) -> Result<()> {
    config.validate()?;
    let files = config.input.discover_files()?;

    println!("Configuration is valid ({} mode)\n", config.mode()?);
    println!("{}", file_inventory(&CsvFiles::new(), &files)?);
    Ok(())
}

fn worker_command(file: &Path, ingest: IngestConfig) -> Result<()> {
    if ingest.rows_per_chunk == 0 {
        anyhow::bail!("rows_per_chunk must be > 0");
    }

    let runtime = build_runtime(None)?;
    let report: WorkerReport = runtime.block_on(ingest_in_worker(file, &ingest));

    if let WorkerReport::Failed { error } = &report {
        tracing::warn!("{}", error);
    }
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# dataload configuration

# === INPUT: Which files to read ===
input:
  # Folder holding the CSV files (overridden by -f)
  folder: "datasets"

  # Only files with this extension are read
  extension: "csv"

# === MODE: Concurrency strategy ===
# Neither flag = sequential. Setting both is an error.
mode:
  # One blocking task per file, process pinned to the least-loaded core (-s)
  unique_process: false

  # One worker process per file across all cores (-m)
  multi_process: false

# === INGEST: Chunked reads in multi-process mode ===
ingest:
  # Records per line-range chunk
  rows_per_chunk: 20000

  # Chunk reads in flight per file (null = one per chunk)
  # chunk_concurrency: 8

# === PROCESSING: Runtime sizing ===
processing:
  # Worker processes alive at once (null = number of cores)
  # max_processes: 4

  # Tokio async worker threads (null = num CPUs)
  # worker_threads: 8

  # Rayon thread pool size for analytics sorting (null = num CPUs)
  # rayon_threads: 8

# === OUTPUT: Reports ===
output:
  # Directory that receives <mode>_summary_<HHMMSS>.csv
  summary_dir: "."

  # Print the most and least viewed videos per year and region
  enable_analytics: true

# === ANALYTICS: Ranking columns ===
analytics:
  years: [2017, 2018]
  top_n: 2
  views_column: "views"
  date_column: "publish_time"
  title_column: "title"
  id_column: "video_id"

  # Leading file name characters used as the region code
  region_prefix_len: 2
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
