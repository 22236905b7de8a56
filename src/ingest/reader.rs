//! CSV record access: pre-scan counting, line-range reads and whole-file reads.
//!
//! Files are Latin-1 text. Fields are read as raw bytes and every byte is
//! mapped to the code point of the same value, so no input is rejected for
//! its encoding.

use crate::error::IngestError;
use crate::ingest::{Dataset, LineRange, Record, RowBatch};
use csv::{ByteRecord, Reader, ReaderBuilder};
use std::fs::File;
use std::path::Path;

/// Source of CSV records for the ingestion engine.
///
/// Implementations must be shareable across worker threads.
pub trait RecordSource: Send + Sync {
    /// Count the records of a file, header record included.
    fn count_records(&self, path: &Path) -> Result<u64, IngestError>;

    /// Read one line range. The first range consumes the header record.
    ///
    /// A range beyond end-of-file yields an empty batch, not an error.
    fn read_range(&self, path: &Path, range: LineRange) -> Result<RowBatch, IngestError>;

    /// Read a whole file as a single unit.
    fn read_whole(&self, path: &Path) -> Result<Dataset, IngestError>;
}

/// [`RecordSource`] over local CSV files.
#[derive(Debug, Clone)]
pub struct CsvFiles {
    buffer_capacity: usize,
}

impl Default for CsvFiles {
    fn default() -> Self {
        Self {
            buffer_capacity: 1 << 20,
        }
    }
}

impl CsvFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self, path: &Path) -> std::io::Result<Reader<File>> {
        let file = File::open(path)?;
        Ok(ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .buffer_capacity(self.buffer_capacity)
            .from_reader(file))
    }
}

impl RecordSource for CsvFiles {
    fn count_records(&self, path: &Path) -> Result<u64, IngestError> {
        let fault = |reason: String| IngestError::PreScan {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = self.open(path).map_err(|e| fault(e.to_string()))?;
        let mut record = ByteRecord::new();
        let mut count = 0u64;
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| fault(e.to_string()))?
        {
            count += 1;
        }
        Ok(count)
    }

    fn read_range(&self, path: &Path, range: LineRange) -> Result<RowBatch, IngestError> {
        let fault = |reason: String| IngestError::ChunkRead {
            path: path.to_path_buf(),
            start: range.start,
            end: range.end(),
            reason,
        };

        let mut reader = self.open(path).map_err(|e| fault(e.to_string()))?;
        let mut record = ByteRecord::new();

        for _ in 0..range.start {
            if !reader
                .read_byte_record(&mut record)
                .map_err(|e| fault(e.to_string()))?
            {
                return Ok(RowBatch::empty());
            }
        }

        let mut batch = RowBatch::empty();
        let mut remaining = range.length;

        if range.is_first && remaining > 0 {
            if !reader
                .read_byte_record(&mut record)
                .map_err(|e| fault(e.to_string()))?
            {
                return Ok(batch);
            }
            batch.header = Some(decode_latin1(&record));
            remaining -= 1;
        }

        batch.rows.reserve(remaining.min(1 << 16) as usize);
        while remaining > 0
            && reader
                .read_byte_record(&mut record)
                .map_err(|e| fault(e.to_string()))?
        {
            batch.rows.push(decode_latin1(&record));
            remaining -= 1;
        }

        Ok(batch)
    }

    fn read_whole(&self, path: &Path) -> Result<Dataset, IngestError> {
        let fault = |reason: String| IngestError::Read {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = self.open(path).map_err(|e| fault(e.to_string()))?;
        let mut record = ByteRecord::new();
        let mut dataset = Dataset::default();

        if !reader
            .read_byte_record(&mut record)
            .map_err(|e| fault(e.to_string()))?
        {
            return Ok(dataset);
        }
        dataset.header = decode_latin1(&record);

        while reader
            .read_byte_record(&mut record)
            .map_err(|e| fault(e.to_string()))?
        {
            dataset.rows.push(decode_latin1(&record));
        }

        Ok(dataset)
    }
}

fn decode_latin1(record: &ByteRecord) -> Record {
    record
        .iter()
        .map(|field| field.iter().map(|&b| char::from(b)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn range(start: u64, length: u64, is_first: bool) -> LineRange {
        LineRange { start, length, is_first }
    }

    #[test]
    fn test_count_includes_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id,name\n1,a\n2,b\n");
        assert_eq!(CsvFiles::new().count_records(&path).unwrap(), 3);
    }

    #[test]
    fn test_count_quoted_newline_is_one_record() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id,desc\n1,\"two\nlines\"\n");
        assert_eq!(CsvFiles::new().count_records(&path).unwrap(), 2);
    }

    #[test]
    fn test_count_missing_file_is_prescan_fault() {
        let err = CsvFiles::new()
            .count_records(Path::new("/nonexistent/file.csv"))
            .unwrap_err();
        assert!(matches!(err, IngestError::PreScan { .. }));
    }

    #[test]
    fn test_first_range_consumes_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id,name\n1,a\n2,b\n");

        let batch = CsvFiles::new().read_range(&path, range(0, 2, true)).unwrap();
        assert_eq!(batch.header, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(batch.rows, vec![vec!["1".to_string(), "a".to_string()]]);
    }

    #[test]
    fn test_continuation_range_has_no_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id,name\n1,a\n2,b\n");

        let batch = CsvFiles::new().read_range(&path, range(2, 1, false)).unwrap();
        assert_eq!(batch.header, None);
        assert_eq!(batch.rows, vec![vec!["2".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_range_past_end_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id\n1\n");

        let batch = CsvFiles::new().read_range(&path, range(10, 5, false)).unwrap();
        assert!(batch.is_empty());
        assert!(batch.header.is_none());
    }

    #[test]
    fn test_range_truncated_at_end_of_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"id\n1\n2\n");

        let batch = CsvFiles::new().read_range(&path, range(1, 10, false)).unwrap();
        assert_eq!(batch.rows.len(), 2);
    }

    #[test]
    fn test_range_on_missing_file_is_chunk_fault() {
        let err = CsvFiles::new()
            .read_range(Path::new("/nonexistent/file.csv"), range(0, 1, true))
            .unwrap_err();
        assert!(matches!(err, IngestError::ChunkRead { start: 0, end: 1, .. }));
    }

    #[test]
    fn test_latin1_decoding() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"title\ncaf\xe9\n");

        let dataset = CsvFiles::new().read_whole(&path).unwrap();
        assert_eq!(dataset.rows[0][0], "café");
    }

    #[test]
    fn test_read_whole_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", b"");

        let dataset = CsvFiles::new().read_whole(&path).unwrap();
        assert!(dataset.header.is_empty());
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_read_whole_header_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "b.csv", b"id,views\n");

        let dataset = CsvFiles::new().read_whole(&path).unwrap();
        assert_eq!(dataset.header.len(), 2);
        assert!(dataset.is_empty());
    }
}
