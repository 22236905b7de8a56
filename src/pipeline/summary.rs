//! Run-level report assembled from per-file telemetry.

use crate::pipeline::{Mode, Telemetry};
use crate::report::{group_digits, Table};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const TIME_FORMAT: &str = "%H:%M:%S%.6f";

fn clock(time: &DateTime<Local>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// A file that contributed no telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_path: PathBuf,
    pub reason: String,
}

/// Finalized telemetry of one run. Built once all workers have reported.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: Mode,
    pub program_start_time: DateTime<Local>,
    pub program_end_time: DateTime<Local>,
    /// One record per successfully ingested file, in input order
    pub per_file_telemetry: Vec<Telemetry>,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    pub fn new(
        mode: Mode,
        program_start_time: DateTime<Local>,
        program_end_time: DateTime<Local>,
        per_file_telemetry: Vec<Telemetry>,
        failures: Vec<FileFailure>,
    ) -> Self {
        Self {
            mode,
            program_start_time,
            program_end_time,
            per_file_telemetry,
            failures,
        }
    }

    /// Earliest file load start.
    pub fn first_load_start(&self) -> Option<DateTime<Local>> {
        self.per_file_telemetry.iter().map(|t| t.start_time).min()
    }

    /// Latest file load end.
    pub fn last_load_end(&self) -> Option<DateTime<Local>> {
        self.per_file_telemetry.iter().map(|t| t.end_time).max()
    }

    pub fn total_seconds(&self) -> f64 {
        let micros = (self.program_end_time - self.program_start_time)
            .num_microseconds()
            .unwrap_or(i64::MAX);
        micros.max(0) as f64 / 1_000_000.0
    }

    /// `<mode>_summary_<HHMMSS>.csv`, stamped with the program end time.
    pub fn summary_file_name(&self) -> String {
        format!(
            "{}_summary_{}.csv",
            self.mode.label(),
            self.program_end_time.format("%H%M%S")
        )
    }

    pub fn render(&self) -> String {
        let optional = |time: Option<DateTime<Local>>| time.as_ref().map(clock).unwrap_or_else(|| "-".to_string());

        let mut out = String::new();
        let _ = writeln!(out, "{} {}", "Mode:".cyan().bold(), self.mode);
        let _ = writeln!(out, "{} {}", "Program start:".magenta().bold(), clock(&self.program_start_time));
        let _ = writeln!(out, "{} {}", "First file load start:".magenta().bold(), optional(self.first_load_start()));
        let _ = writeln!(out, "{} {}", "Last file load end:".magenta().bold(), optional(self.last_load_end()));
        let _ = writeln!(out, "{} {}", "Program end:".magenta().bold(), clock(&self.program_end_time));

        let mut table = Table::new("File load summary").columns([
            "File",
            "PID",
            "CPU",
            "Start",
            "End",
            "Duration (s)",
            "Virtual memory (bytes)",
            "RSS (bytes)",
        ]);
        for t in &self.per_file_telemetry {
            table.add_row([
                t.file_name(),
                t.pid.to_string(),
                t.affinity_display(),
                clock(&t.start_time),
                clock(&t.end_time),
                format!("{:.6}", t.duration_seconds),
                group_digits(t.virtual_memory_bytes),
                group_digits(t.resident_memory_bytes),
            ]);
        }
        let _ = writeln!(out, "{}", table);

        let degraded: usize = self.per_file_telemetry.iter().map(|t| t.degraded_chunks).sum();
        if degraded > 0 {
            let _ = writeln!(out, "{} {} chunk reads returned no rows", "Degraded:".yellow().bold(), degraded);
        }
        for failure in &self.failures {
            let _ = writeln!(
                out,
                "{} {}: {}",
                "Failed:".red().bold(),
                failure.file_path.display(),
                failure.reason
            );
        }

        let _ = write!(
            out,
            "{} {:.6} seconds",
            "Total process time:".green().bold(),
            self.total_seconds()
        );
        out
    }

    /// Write the per-file table with the run-level columns repeated on
    /// every row. Returns the path of the written file.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create summary directory {}", dir.display()))?;
        let path = dir.join(self.summary_file_name());

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record([
            "file",
            "pid",
            "cpu",
            "start",
            "end",
            "duration_s",
            "virtual_memory_bytes",
            "rss_bytes",
            "mode",
            "program_start",
            "first_load_start",
            "last_load_end",
            "program_end",
            "total_seconds",
        ])?;

        let optional = |time: Option<DateTime<Local>>| time.as_ref().map(clock).unwrap_or_default();
        let run_columns = [
            self.mode.to_string(),
            clock(&self.program_start_time),
            optional(self.first_load_start()),
            optional(self.last_load_end()),
            clock(&self.program_end_time),
            format!("{:.6}", self.total_seconds()),
        ];

        for t in &self.per_file_telemetry {
            let file_columns = [
                t.file_name(),
                t.pid.to_string(),
                t.affinity_display(),
                clock(&t.start_time),
                clock(&t.end_time),
                format!("{:.6}", t.duration_seconds),
                t.virtual_memory_bytes.to_string(),
                t.resident_memory_bytes.to_string(),
            ];
            writer.write_record(file_columns.iter().chain(run_columns.iter()))?;
        }

        writer.flush()?;
        Ok(path)
    }
}
