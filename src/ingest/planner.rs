//! Line-range planning for chunked ingestion.

use serde::{Deserialize, Serialize};

/// A contiguous span of records within one file, read by one worker.
///
/// Offsets count physical CSV records, header record included, so the
/// range with `is_first` set is the one that owns the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u64,
    pub length: u64,
    pub is_first: bool,
}

impl LineRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Split `total_rows` records into `ceil(total_rows / rows_per_chunk)`
/// ranges. An empty file yields no ranges.
///
/// # Panics
/// Panics if `rows_per_chunk` is zero (rejected by config validation).
pub fn plan_chunks(total_rows: u64, rows_per_chunk: u64) -> Vec<LineRange> {
    assert!(rows_per_chunk > 0, "rows_per_chunk must be > 0");

    let count = total_rows.div_ceil(rows_per_chunk);
    (0..count)
        .map(|i| {
            let start = i * rows_per_chunk;
            LineRange {
                start,
                length: rows_per_chunk.min(total_rows - start),
                is_first: i == 0,
            }
        })
        .collect()
}
