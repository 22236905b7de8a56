//! Chunked ingestion of a single file.
//!
//! A pre-scan counts the records, the planner splits them into line ranges,
//! and one blocking worker per range reads its slice. Batches are merged in
//! range order once the last worker has reported, so the resulting dataset
//! follows the source file no matter how the workers were scheduled.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingest::{plan_chunks, Dataset, RecordSource, RowBatch};
use crate::pipeline::{blocking, CpuControl, Metrics, Telemetry, TelemetryProbe, WorkerPool};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Dataset and telemetry produced for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedFile {
    pub dataset: Dataset,
    pub telemetry: Telemetry,
}

/// Reads one file through concurrent line-range workers.
pub struct FileIngestor {
    source: Arc<dyn RecordSource>,
    probe: Arc<dyn TelemetryProbe>,
    cpu: Arc<dyn CpuControl>,
    metrics: Arc<Metrics>,
    rows_per_chunk: u64,
    pool: WorkerPool,
}

impl FileIngestor {
    pub fn new(
        source: Arc<dyn RecordSource>,
        probe: Arc<dyn TelemetryProbe>,
        cpu: Arc<dyn CpuControl>,
        metrics: Arc<Metrics>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            source,
            probe,
            cpu,
            metrics,
            rows_per_chunk: config.rows_per_chunk as u64,
            pool: WorkerPool::with_limit(config.chunk_concurrency),
        }
    }

    /// Ingest `path`. Only a failed pre-scan is an error; faulty chunks are
    /// replaced by empty batches and counted in the telemetry.
    pub async fn ingest(&self, path: &Path) -> Result<IngestedFile, IngestError> {
        let start = self.probe.sample();

        let total_rows = {
            let source = self.source.clone();
            let owned = path.to_path_buf();
            blocking(format!("pre-scan of {}", path.display()), move || {
                source.count_records(&owned)
            })
            .await
            .map_err(|fault| IngestError::PreScan {
                path: path.to_path_buf(),
                reason: fault.to_string(),
            })??
        };

        let ranges = plan_chunks(total_rows, self.rows_per_chunk);
        tracing::debug!(
            "{}: {} records split into {} chunks of up to {}",
            path.display(),
            total_rows,
            ranges.len(),
            self.rows_per_chunk
        );

        let results = self
            .pool
            .run(ranges.clone(), |idx, range| {
                let source = self.source.clone();
                let owned = path.to_path_buf();
                blocking(format!("chunk {} of {}", idx, path.display()), move || {
                    source.read_range(&owned, range)
                })
            })
            .await;

        let mut degraded = 0;
        let mut batches = Vec::with_capacity(results.len());
        for (result, range) in results.into_iter().zip(&ranges) {
            let batch = match result {
                Ok(Ok(batch)) => {
                    self.metrics.add_chunk_read(batch.rows.len() as u64);
                    batch
                }
                Ok(Err(e)) => {
                    tracing::warn!("{}", e);
                    self.metrics.add_chunk_degraded();
                    degraded += 1;
                    RowBatch::empty()
                }
                Err(fault) => {
                    tracing::warn!(
                        "Records {}..{} of {}: {}",
                        range.start,
                        range.end(),
                        path.display(),
                        fault
                    );
                    self.metrics.add_chunk_degraded();
                    degraded += 1;
                    RowBatch::empty()
                }
            };
            batches.push(batch);
        }

        let dataset = Dataset::from_ordered_batches(batches);
        let end = self.probe.sample();

        let telemetry = Telemetry::from_samples(
            path.to_path_buf(),
            self.probe.pid(),
            self.cpu.current(),
            &start,
            &end,
            degraded,
        );

        Ok(IngestedFile { dataset, telemetry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::test_support::{sample_csv, write_csv, DelayedSource, FaultySource};
    use crate::ingest::{CsvFiles, LineRange};
    use crate::pipeline::affinity::testing::FakeCpu;
    use crate::pipeline::telemetry::testing::TickingProbe;
    use tempfile::TempDir;

    fn ingestor(source: Arc<dyn RecordSource>, rows_per_chunk: usize) -> FileIngestor {
        FileIngestor::new(
            source,
            Arc::new(TickingProbe::new(99)),
            Arc::new(FakeCpu::new(4, 0)),
            Metrics::new(),
            &IngestConfig {
                rows_per_chunk,
                chunk_concurrency: None,
            },
        )
    }

    #[tokio::test]
    async fn test_two_chunks_keep_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "A.csv", "video_id,views\nx,1\ny,2\n");

        assert_eq!(
            plan_chunks(3, 2),
            vec![
                LineRange { start: 0, length: 2, is_first: true },
                LineRange { start: 2, length: 1, is_first: false },
            ]
        );

        let ingested = ingestor(Arc::new(CsvFiles::new()), 2).ingest(&path).await.unwrap();
        assert_eq!(ingested.dataset.header, vec!["video_id", "views"]);
        assert_eq!(
            ingested.dataset.rows,
            vec![vec!["x".to_string(), "1".to_string()], vec!["y".to_string(), "2".to_string()]]
        );
        assert_eq!(ingested.telemetry.pid, 99);
        assert_eq!(ingested.telemetry.degraded_chunks, 0);
    }

    #[tokio::test]
    async fn test_header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "B.csv", "video_id,views\n");

        let ingested = ingestor(Arc::new(CsvFiles::new()), 2).ingest(&path).await.unwrap();
        assert!(ingested.dataset.is_empty());
        assert_eq!(ingested.dataset.header.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_row_file_yields_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "empty.csv", "");

        let ingested = ingestor(Arc::new(CsvFiles::new()), 2).ingest(&path).await.unwrap();
        assert_eq!(ingested.dataset, Dataset::default());
        assert!(ingested.telemetry.duration_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_prescan_fault() {
        let err = ingestor(Arc::new(CsvFiles::new()), 2)
            .ingest(Path::new("/nonexistent/data.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::PreScan { .. }));
    }

    #[tokio::test]
    async fn test_order_independent_of_completion_order() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "GBvideos.csv", &sample_csv(23));
        let reference = CsvFiles::new().read_whole(&path).unwrap();

        for rows_per_chunk in [1, 3, 5, 24] {
            for reverse in [false, true] {
                let source = Arc::new(DelayedSource::new(CsvFiles::new(), reverse));
                let ingested = ingestor(source, rows_per_chunk).ingest(&path).await.unwrap();
                assert_eq!(ingested.dataset, reference, "rows_per_chunk={}", rows_per_chunk);
            }
        }
    }

    #[tokio::test]
    async fn test_faulty_chunk_degrades_to_empty_batch() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "CAvideos.csv", &sample_csv(6));

        // records 4..6 hold vid3 and vid4
        let source = Arc::new(FaultySource::failing_at(CsvFiles::new(), 4));
        let ingested = ingestor(source, 2).ingest(&path).await.unwrap();

        assert_eq!(ingested.telemetry.degraded_chunks, 1);
        let ids: Vec<&str> = ingested.dataset.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["vid0", "vid1", "vid2", "vid5"]);
    }

    #[tokio::test]
    async fn test_panicking_chunk_degrades_to_empty_batch() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "DEvideos.csv", &sample_csv(4));

        let source = Arc::new(FaultySource::panicking_at(CsvFiles::new(), 2));
        let ingested = ingestor(source, 2).ingest(&path).await.unwrap();

        assert_eq!(ingested.telemetry.degraded_chunks, 1);
        assert_eq!(ingested.dataset.len(), 2);
    }
}
