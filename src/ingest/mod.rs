//! CSV ingestion: chunk planning, record reading and per-file assembly.

mod dataset;
mod file_ingestor;
mod planner;
mod reader;

pub use dataset::{Dataset, Record, RowBatch};
pub use file_ingestor::{FileIngestor, IngestedFile};
pub use planner::{plan_chunks, LineRange};
pub use reader::{CsvFiles, RecordSource};

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixture files and instrumented record sources.

    use super::*;
    use crate::error::IngestError;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    pub fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Header plus `rows` video records alternating between 2017 and 2018.
    pub fn sample_csv(rows: usize) -> String {
        let mut out = String::from("video_id,title,views,publish_time\n");
        for i in 0..rows {
            let title = if i % 5 == 0 {
                format!("\"Title, part {}\"", i)
            } else {
                format!("Title {}", i)
            };
            let views = (i * 37 % 101) * 1000 + i;
            let year = 2017 + i % 2;
            out.push_str(&format!(
                "vid{},{},{},{}-11-13T17:13:01.000Z\n",
                i, title, views, year
            ));
        }
        out
    }

    /// Delays every read so that workers finish out of launch order.
    pub struct DelayedSource<S> {
        inner: S,
        reverse: bool,
        whole_calls: AtomicU64,
    }

    impl<S> DelayedSource<S> {
        pub fn new(inner: S, reverse: bool) -> Self {
            Self {
                inner,
                reverse,
                whole_calls: AtomicU64::new(0),
            }
        }

        fn delay_for(&self, key: u64) -> Duration {
            let ms = if self.reverse {
                40u64.saturating_sub(key * 2)
            } else {
                (key * 7) % 11
            };
            Duration::from_millis(ms)
        }
    }

    impl<S: RecordSource> RecordSource for DelayedSource<S> {
        fn count_records(&self, path: &Path) -> Result<u64, IngestError> {
            self.inner.count_records(path)
        }

        fn read_range(&self, path: &Path, range: LineRange) -> Result<RowBatch, IngestError> {
            std::thread::sleep(self.delay_for(range.start));
            self.inner.read_range(path, range)
        }

        fn read_whole(&self, path: &Path) -> Result<Dataset, IngestError> {
            let call = self.whole_calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay_for(call * 10));
            self.inner.read_whole(path)
        }
    }

    enum Fault {
        Error,
        Panic,
    }

    /// Fails or panics on the range starting at a given record.
    pub struct FaultySource<S> {
        inner: S,
        start: u64,
        fault: Fault,
    }

    impl<S> FaultySource<S> {
        pub fn failing_at(inner: S, start: u64) -> Self {
            Self { inner, start, fault: Fault::Error }
        }

        pub fn panicking_at(inner: S, start: u64) -> Self {
            Self { inner, start, fault: Fault::Panic }
        }
    }

    impl<S: RecordSource> RecordSource for FaultySource<S> {
        fn count_records(&self, path: &Path) -> Result<u64, IngestError> {
            self.inner.count_records(path)
        }

        fn read_range(&self, path: &Path, range: LineRange) -> Result<RowBatch, IngestError> {
            if range.start == self.start {
                match self.fault {
                    Fault::Error => {
                        return Err(IngestError::ChunkRead {
                            path: path.to_path_buf(),
                            start: range.start,
                            end: range.end(),
                            reason: "injected fault".to_string(),
                        })
                    }
                    Fault::Panic => panic!("injected panic at record {}", range.start),
                }
            }
            self.inner.read_range(path, range)
        }

        fn read_whole(&self, path: &Path) -> Result<Dataset, IngestError> {
            self.inner.read_whole(path)
        }
    }
}
