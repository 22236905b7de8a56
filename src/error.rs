//! Error taxonomy for configuration, ingestion and worker coordination.
//!
//! Only [`ConfigError`] is fatal for a run. Ingestion and worker faults are
//! recovered by the caller and recorded as a degraded contribution.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, reported before any ingestion starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("folder does not exist or is not a directory: {0}")]
    BadDirectory(PathBuf),

    #[error("no .{extension} files found in {folder}")]
    NoMatchingFiles { folder: PathBuf, extension: String },

    #[error("--unique-process and --multi-process cannot be used at the same time")]
    ConflictingModes,

    #[error("rows_per_chunk must be > 0")]
    InvalidRowsPerChunk,

    #[error("{0} must be > 0")]
    MustBePositive(&'static str),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Faults raised while reading a file or one of its line ranges.
///
/// Serializable so worker processes can report them to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IngestError {
    /// The file could not be opened or row-counted; the file is excluded.
    #[error("pre-scan of {path} failed: {reason}")]
    PreScan { path: PathBuf, reason: String },

    /// One line range failed; it contributes an empty batch.
    #[error("reading records {start}..{end} of {path} failed: {reason}")]
    ChunkRead {
        path: PathBuf,
        start: u64,
        end: u64,
        reason: String,
    },

    /// A single-shot whole-file read failed; the file is excluded.
    #[error("reading {path} failed: {reason}")]
    Read { path: PathBuf, reason: String },
}

/// A concurrent unit that did not deliver a result at the join barrier.
#[derive(Debug, Error)]
pub enum WorkerFault {
    #[error("worker {unit} panicked: {reason}")]
    Panicked { unit: String, reason: String },

    #[error("failed to spawn worker process for {unit}: {reason}")]
    Spawn { unit: String, reason: String },

    #[error("worker process for {unit} exited with {status}")]
    ProcessFailed { unit: String, status: String },

    #[error("worker process for {unit} sent an unreadable report: {reason}")]
    BadReport { unit: String, reason: String },

    #[error("worker slot {0} was never filled")]
    Missing(usize),
}
