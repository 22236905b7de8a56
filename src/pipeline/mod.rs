//! Run orchestration: worker pool, host control, telemetry and reporting.

pub(crate) mod affinity;
mod metrics;
mod orchestrator;
mod pool;
mod summary;
pub(crate) mod telemetry;

pub use affinity::{CpuControl, SystemCpu};
pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::{
    ingest_in_worker, Mode, Orchestrator, OrchestratorConfig, ProcessLauncher, RunOutcome,
    WorkerReport,
};
pub use pool::{blocking, WorkerPool};
pub use summary::{FileFailure, RunSummary};
pub use telemetry::{ProbeSample, SystemInfo, SystemProbe, Telemetry, TelemetryProbe};
