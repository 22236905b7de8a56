//! Runs a file list under one of the three concurrency topologies.
//!
//! | Mode | Outer scope | Per-file read | Affinity |
//! |------|-------------|---------------|----------|
//! | `Sequential` | one file at a time | whole file | unchanged |
//! | `SingleCoreConcurrent` | one blocking task per file | whole file | least-loaded core |
//! | `MultiCoreConcurrent` | one worker process per file | chunked [`FileIngestor`] | all cores |
//!
//! Whatever the completion order, results are returned in input order.

use crate::analytics::AnalyticsReporter;
use crate::config::IngestConfig;
use crate::error::{IngestError, WorkerFault};
use crate::ingest::{CsvFiles, Dataset, FileIngestor, IngestedFile, RecordSource};
use crate::pipeline::{
    blocking, CpuControl, FileFailure, Metrics, MetricsSnapshot, RunSummary, SystemCpu,
    SystemProbe, Telemetry, TelemetryProbe, WorkerPool,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

/// Concurrency strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Sequential,
    SingleCoreConcurrent,
    MultiCoreConcurrent,
}

impl Mode {
    /// Label used in the summary file name.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sequential => "sequentially",
            Mode::SingleCoreConcurrent => "unique_process",
            Mode::MultiCoreConcurrent => "multi_process",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Sequential => "sequentially",
            Mode::SingleCoreConcurrent => "unique process",
            Mode::MultiCoreConcurrent => "multi process",
        };
        f.write_str(name)
    }
}

/// How multi-core mode executes one file.
#[derive(Debug, Clone)]
pub enum ProcessLauncher {
    /// Re-run `program` as `program worker --file <path>`; the child prints a
    /// JSON [`WorkerReport`] on stdout.
    Subprocess { program: PathBuf },

    /// Run the file ingestor on a blocking task of this process.
    InProcess,
}

impl ProcessLauncher {
    /// Launcher for the running executable.
    pub fn current_exe() -> Self {
        match std::env::current_exe() {
            Ok(program) => ProcessLauncher::Subprocess { program },
            Err(e) => {
                tracing::warn!("Cannot locate own executable ({}); ingesting in-process", e);
                ProcessLauncher::InProcess
            }
        }
    }
}

/// What a worker process sends back to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReport {
    Ingested {
        file: IngestedFile,
        /// Chunk and row counters of the worker's ingestion
        #[serde(default)]
        metrics: MetricsSnapshot,
    },
    Failed {
        error: IngestError,
    },
}

/// Entry point of a worker process: ingest one file with default collaborators.
pub async fn ingest_in_worker(path: &Path, config: &IngestConfig) -> WorkerReport {
    let metrics = Metrics::new();
    let ingestor = FileIngestor::new(
        Arc::new(CsvFiles::new()),
        Arc::new(SystemProbe::new()),
        Arc::new(SystemCpu),
        metrics.clone(),
        config,
    );

    tracing::info!(
        "Processing {} on cores {:?}",
        path.display(),
        SystemCpu.current()
    );

    match ingestor.ingest(path).await {
        Ok(file) => WorkerReport::Ingested {
            file,
            metrics: metrics.snapshot(),
        },
        Err(error) => WorkerReport::Failed { error },
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: Mode,
    pub ingest: IngestConfig,
    /// Worker processes alive at once (None = core count)
    pub max_processes: Option<usize>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Datasets of the successfully ingested files, in input order
    pub datasets: Vec<(PathBuf, Dataset)>,
    /// Rendered ranking tables, when analytics is enabled
    pub analytics: Option<String>,
    pub metrics: MetricsSnapshot,
}

type UnitResult = Result<Result<IngestedFile, IngestError>, WorkerFault>;

/// Coordinates per-file work under the configured mode.
pub struct Orchestrator {
    config: OrchestratorConfig,
    source: Arc<dyn RecordSource>,
    probe: Arc<dyn TelemetryProbe>,
    cpu: Arc<dyn CpuControl>,
    launcher: ProcessLauncher,
    metrics: Arc<Metrics>,
    analytics: Option<AnalyticsReporter>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        source: Arc<dyn RecordSource>,
        probe: Arc<dyn TelemetryProbe>,
        cpu: Arc<dyn CpuControl>,
        launcher: ProcessLauncher,
    ) -> Self {
        Self {
            config,
            source,
            probe,
            cpu,
            launcher,
            metrics: Metrics::new(),
            analytics: None,
        }
    }

    /// Run the analytics pass over the merged datasets before the run ends.
    pub fn with_analytics(mut self, reporter: AnalyticsReporter) -> Self {
        self.analytics = Some(reporter);
        self
    }

    /// Ingest every file and build the run summary.
    pub async fn run(&self, files: Vec<PathBuf>) -> RunOutcome {
        let mode = self.config.mode;
        let program_start = self.probe.sample().time;

        tracing::info!("Reading {} files in {} mode", files.len(), mode);

        let results = match mode {
            Mode::Sequential => self.run_sequential(&files).await,
            Mode::SingleCoreConcurrent => self.run_single_core(&files).await,
            Mode::MultiCoreConcurrent => self.run_multi_core(&files).await,
        };

        let mut telemetry: Vec<Telemetry> = Vec::with_capacity(files.len());
        let mut datasets = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        for (path, result) in files.into_iter().zip(results) {
            match settle(&path, result) {
                Ok(file) => {
                    self.metrics.add_file_ingested();
                    telemetry.push(file.telemetry);
                    datasets.push((path, file.dataset));
                }
                Err(failure) => {
                    tracing::warn!("{}: {}", failure.file_path.display(), failure.reason);
                    self.metrics.add_file_failed();
                    failures.push(failure);
                }
            }
        }

        let analytics = self.analytics.as_ref().map(|reporter| reporter.render(&datasets));
        let program_end = self.probe.sample().time;

        let metrics = self.metrics.snapshot();
        tracing::info!("Run complete: {}", metrics);

        RunOutcome {
            summary: RunSummary::new(mode, program_start, program_end, telemetry, failures),
            datasets,
            analytics,
            metrics,
        }
    }

    async fn run_sequential(&self, files: &[PathBuf]) -> Vec<UnitResult> {
        let mut results = Vec::with_capacity(files.len());
        for path in files {
            results.push(self.read_whole(path.clone()).await);
        }
        results
    }

    async fn run_single_core(&self, files: &[PathBuf]) -> Vec<UnitResult> {
        let cpu = self.cpu.clone();
        let core = blocking("core load sampling".to_string(), move || cpu.least_loaded_core())
            .await
            .unwrap_or_else(|fault| {
                tracing::warn!("{}; falling back to core 0", fault);
                0
            });

        match self.cpu.pin(&[core]) {
            Ok(()) => tracing::info!("Process pinned to core {}", core),
            Err(e) => tracing::warn!("Failed to pin process to core {}: {}", core, e),
        }

        WorkerPool::unbounded()
            .run(files.to_vec(), |_, path| self.read_whole(path))
            .await
    }

    async fn run_multi_core(&self, files: &[PathBuf]) -> Vec<UnitResult> {
        let cores: Vec<usize> = (0..self.cpu.core_count()).collect();
        match self.cpu.pin(&cores) {
            Ok(()) => tracing::info!("Process allowed on cores {:?}", cores),
            Err(e) => tracing::warn!("Failed to widen affinity to all cores: {}", e),
        }

        let limit = self.config.max_processes.unwrap_or(cores.len());
        WorkerPool::bounded(limit)
            .run(files.to_vec(), |_, path| async move { self.launch(&path).await })
            .await
    }

    /// Single-shot read of a whole file, timed on a blocking task.
    async fn read_whole(&self, path: PathBuf) -> UnitResult {
        let source = self.source.clone();
        let probe = self.probe.clone();
        let cpu = self.cpu.clone();
        let metrics = self.metrics.clone();
        let unit = format!("read of {}", path.display());

        blocking(unit, move || -> Result<IngestedFile, IngestError> {
            let start = probe.sample();
            let dataset = source.read_whole(&path)?;
            let end = probe.sample();
            metrics.add_rows(dataset.len() as u64);
            let telemetry =
                Telemetry::from_samples(path, probe.pid(), cpu.current(), &start, &end, 0);
            Ok(IngestedFile { dataset, telemetry })
        })
        .await
    }

    /// Chunked ingestion of one file in its own worker.
    async fn launch(&self, path: &Path) -> UnitResult {
        match &self.launcher {
            ProcessLauncher::InProcess => {
                let ingestor = FileIngestor::new(
                    self.source.clone(),
                    self.probe.clone(),
                    self.cpu.clone(),
                    self.metrics.clone(),
                    &self.config.ingest,
                );
                Ok(ingestor.ingest(path).await)
            }
            ProcessLauncher::Subprocess { program } => self.spawn_worker(program, path).await,
        }
    }

    async fn spawn_worker(&self, program: &Path, path: &Path) -> UnitResult {
        let unit = path.display().to_string();

        let mut command = tokio::process::Command::new(program);
        command
            .arg("worker")
            .arg("--file")
            .arg(path)
            .arg("--rows-per-chunk")
            .arg(self.config.ingest.rows_per_chunk.to_string());
        if let Some(limit) = self.config.ingest.chunk_concurrency {
            command.arg("--chunk-concurrency").arg(limit.to_string());
        }

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WorkerFault::Spawn {
                unit: unit.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(WorkerFault::ProcessFailed {
                unit,
                status: output.status.to_string(),
            });
        }

        let report: WorkerReport =
            serde_json::from_slice(&output.stdout).map_err(|e| WorkerFault::BadReport {
                unit: unit.clone(),
                reason: e.to_string(),
            })?;

        match report {
            WorkerReport::Ingested { file, metrics } => {
                self.metrics.merge(&metrics);
                Ok(Ok(file))
            }
            WorkerReport::Failed { error } => Ok(Err(error)),
        }
    }
}

/// Collapse both fault layers of a unit into a per-file outcome.
fn settle(path: &Path, result: UnitResult) -> Result<IngestedFile, FileFailure> {
    match result {
        Ok(Ok(file)) => Ok(file),
        Ok(Err(error)) => Err(FileFailure {
            file_path: path.to_path_buf(),
            reason: error.to_string(),
        }),
        Err(fault) => Err(FileFailure {
            file_path: path.to_path_buf(),
            reason: fault.to_string(),
        }),
    }
}
