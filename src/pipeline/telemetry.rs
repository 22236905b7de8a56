//! Per-file telemetry records and the probe that samples the process.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, System};

/// Wall-clock time plus memory usage of the current process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub time: DateTime<Local>,
    pub virtual_memory_bytes: u64,
    pub resident_memory_bytes: u64,
}

/// Source of timing and memory samples.
pub trait TelemetryProbe: Send + Sync {
    fn sample(&self) -> ProbeSample;

    /// Id of the process the samples describe.
    fn pid(&self) -> u32;
}

/// [`TelemetryProbe`] backed by the operating system via `sysinfo`.
pub struct SystemProbe {
    system: Mutex<System>,
    pid: Pid,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProbe for SystemProbe {
    fn sample(&self) -> ProbeSample {
        let time = Local::now();
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_process(self.pid);
        let (virtual_memory_bytes, resident_memory_bytes) = system
            .process(self.pid)
            .map(|p| (p.virtual_memory(), p.memory()))
            .unwrap_or((0, 0));

        ProbeSample {
            time,
            virtual_memory_bytes,
            resident_memory_bytes,
        }
    }

    fn pid(&self) -> u32 {
        self.pid.as_u32()
    }
}

/// Measured timing and resource usage for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub file_path: PathBuf,
    pub pid: u32,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
    pub virtual_memory_bytes: u64,
    pub resident_memory_bytes: u64,
    pub cpu_affinity: BTreeSet<usize>,
    /// Chunk reads that faulted and were replaced by an empty batch
    #[serde(default)]
    pub degraded_chunks: usize,
}

impl Telemetry {
    /// Build a record from the samples taken around the work.
    ///
    /// Memory comes from the closing sample.
    pub fn from_samples(
        file_path: PathBuf,
        pid: u32,
        cpu_affinity: BTreeSet<usize>,
        start: &ProbeSample,
        end: &ProbeSample,
        degraded_chunks: usize,
    ) -> Self {
        let micros = (end.time - start.time).num_microseconds().unwrap_or(i64::MAX);
        Self {
            file_path,
            pid,
            start_time: start.time,
            end_time: end.time,
            duration_seconds: micros.max(0) as f64 / 1_000_000.0,
            virtual_memory_bytes: end.virtual_memory_bytes,
            resident_memory_bytes: end.resident_memory_bytes,
            cpu_affinity,
            degraded_chunks,
        }
    }

    /// File name without its directory.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    /// Affinity as `[0, 1, 2]`.
    pub fn affinity_display(&self) -> String {
        let cores: Vec<String> = self.cpu_affinity.iter().map(|c| c.to_string()).collect();
        format!("[{}]", cores.join(", "))
    }
}

/// Host description printed alongside the run summary.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub processor: String,
    pub total_memory_bytes: u64,
    pub total_swap_bytes: u64,
    pub os: String,
    pub cpu_count: usize,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();

        let processor = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            System::kernel_version().unwrap_or_default()
        );

        Self {
            processor,
            total_memory_bytes: system.total_memory(),
            total_swap_bytes: system.total_swap(),
            os: os.trim().to_string(),
            cpu_count: num_cpus::get(),
        }
    }

    /// Number of 4 KiB pages of physical memory.
    pub fn total_pages(&self) -> f64 {
        self.total_memory_bytes as f64 / 4096.0
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        writeln!(f, "Processor: {}", self.processor)?;
        writeln!(f, "RAM: {:.2} GB", self.total_memory_bytes as f64 / GIB)?;
        writeln!(f, "Swap: {:.2} GB", self.total_swap_bytes as f64 / GIB)?;
        writeln!(f, "Total pages (4 KB): {:.2}", self.total_pages())?;
        writeln!(f, "Operating system: {}", self.os)?;
        write!(f, "CPUs: {}", self.cpu_count)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic probe for tests.

    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that advances one millisecond per sample.
    pub struct TickingProbe {
        ticks: AtomicI64,
        pid: u32,
    }

    impl TickingProbe {
        pub fn new(pid: u32) -> Self {
            Self {
                ticks: AtomicI64::new(0),
                pid,
            }
        }
    }

    impl TelemetryProbe for TickingProbe {
        fn sample(&self) -> ProbeSample {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            let base = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
            ProbeSample {
                time: base + chrono::Duration::milliseconds(tick),
                virtual_memory_bytes: 4096 * (tick as u64 + 1),
                resident_memory_bytes: 1024 * (tick as u64 + 1),
            }
        }

        fn pid(&self) -> u32 {
            self.pid
        }
    }
}
