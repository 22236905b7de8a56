//! Join-barrier worker pool.
//!
//! The same pool drives both concurrency tiers: one unit per file in the
//! orchestrator and one unit per line range inside [`FileIngestor`]. Units
//! complete in any order; results are projected back into input order.
//!
//! [`FileIngestor`]: crate::ingest::FileIngestor

use crate::error::WorkerFault;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs indexed units concurrently and waits for all of them.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    /// Maximum units in flight; `None` runs every unit at once
    concurrency: Option<usize>,
}

impl WorkerPool {
    /// Pool that starts every unit immediately.
    pub fn unbounded() -> Self {
        Self { concurrency: None }
    }

    /// Pool with at most `limit` units in flight.
    pub fn bounded(limit: usize) -> Self {
        Self {
            concurrency: Some(limit.max(1)),
        }
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(limit) => Self::bounded(limit),
            None => Self::unbounded(),
        }
    }

    /// Run `unit` over every item and return one result per item, in item
    /// order. No unit is cancelled; a unit that never finishes stalls the
    /// barrier.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, mut unit: F) -> Vec<Result<R, WorkerFault>>
    where
        F: FnMut(usize, T) -> Fut,
        Fut: Future<Output = Result<R, WorkerFault>>,
    {
        let len = items.len();
        if len == 0 {
            return Vec::new();
        }
        let limit = self.concurrency.unwrap_or(len).min(len);

        let mut slots: Vec<Option<Result<R, WorkerFault>>> = (0..len).map(|_| None).collect();

        let mut completions = stream::iter(items.into_iter().enumerate())
            .map(|(idx, item)| {
                let fut = unit(idx, item);
                async move { (idx, fut.await) }
            })
            .buffer_unordered(limit);

        while let Some((idx, result)) = completions.next().await {
            slots[idx] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| slot.unwrap_or(Err(WorkerFault::Missing(idx))))
            .collect()
    }
}

/// Run blocking work on the runtime's blocking pool, turning a panic into
/// a [`WorkerFault`].
pub async fn blocking<R, F>(unit: String, work: F) -> Result<R, WorkerFault>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WorkerFault::Panicked {
            unit,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        // later items finish first
        let delays = vec![40u64, 30, 20, 10, 0];
        let finished = Arc::new(std::sync::Mutex::new(Vec::new()));

        let results = WorkerPool::unbounded()
            .run(delays, |idx, delay| {
                let finished = finished.clone();
                blocking(format!("unit {}", idx), move || {
                    std::thread::sleep(Duration::from_millis(delay));
                    finished.lock().unwrap().push(idx);
                    idx * 10
                })
            })
            .await;

        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
        assert_eq!(finished.lock().unwrap().first(), Some(&4));
    }

    #[tokio::test]
    async fn test_panic_becomes_fault_in_its_slot() {
        let results = WorkerPool::unbounded()
            .run(vec![1, 2, 3], |idx, value| {
                blocking(format!("unit {}", idx), move || {
                    if value == 2 {
                        panic!("boom");
                    }
                    value
                })
            })
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(WorkerFault::Panicked { .. })));
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_bounded_pool_limits_in_flight() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = WorkerPool::bounded(2)
            .run((0..8).collect::<Vec<_>>(), |_, value| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                blocking("unit".to_string(), move || {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    value
                })
            })
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<Result<(), WorkerFault>> = WorkerPool::unbounded()
            .run(Vec::<u8>::new(), |_, _| async { Ok(()) })
            .await;
        assert!(results.is_empty());
    }
}
