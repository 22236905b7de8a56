//! Ingestion counters shared across workers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one run (or, inside a worker process, one file).
#[derive(Debug, Default)]
pub struct Metrics {
    /// Files ingested successfully
    pub files_ingested: AtomicU64,

    /// Files excluded after a pre-scan, read or worker fault
    pub files_failed: AtomicU64,

    /// Line ranges read
    pub chunks_read: AtomicU64,

    /// Line ranges that returned no rows
    pub chunks_empty: AtomicU64,

    /// Line ranges that faulted and were replaced by an empty batch
    pub chunks_degraded: AtomicU64,

    /// Data rows read (header records excluded)
    pub rows_read: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file_ingested(&self) {
        self.files_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_chunk_read(&self, rows: u64) {
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
        if rows == 0 {
            self.chunks_empty.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_chunk_degraded(&self) {
        self.chunks_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    /// Fold in the chunk and row counters a worker process reported.
    /// File counters stay with the coordinator.
    pub fn merge(&self, worker: &MetricsSnapshot) {
        self.chunks_read.fetch_add(worker.chunks_read, Ordering::Relaxed);
        self.chunks_empty.fetch_add(worker.chunks_empty, Ordering::Relaxed);
        self.chunks_degraded.fetch_add(worker.chunks_degraded, Ordering::Relaxed);
        self.rows_read.fetch_add(worker.rows_read, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            chunks_read: self.chunks_read.load(Ordering::Relaxed),
            chunks_empty: self.chunks_empty.load(Ordering::Relaxed),
            chunks_degraded: self.chunks_degraded.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub files_ingested: u64,
    pub files_failed: u64,
    pub chunks_read: u64,
    pub chunks_empty: u64,
    pub chunks_degraded: u64,
    pub rows_read: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Files: {} ingested, {} failed | Chunks: {} read, {} empty, {} degraded | Rows: {}",
            self.files_ingested,
            self.files_failed,
            self.chunks_read,
            self.chunks_empty,
            self.chunks_degraded,
            self.rows_read,
        )
    }
}
