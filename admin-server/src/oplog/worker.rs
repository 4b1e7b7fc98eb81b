//! Operation log background worker
//!
//! Consumes records from the queue and writes them in batches. A batch is
//! flushed when it reaches `batch_size` or when `batch_window` elapses
//! after the first record arrived. Exits when the queue closes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared::AppResult;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

use crate::db::operation_logs;

use super::types::OpLogRecord;

const MAX_WRITE_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Persistence target for log batches
#[async_trait]
pub trait OpLogSink: Send + Sync {
    async fn write_batch(&self, records: &[OpLogRecord]) -> AppResult<()>;
}

/// Sink writing to the sys_operation_log table
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpLogSink for PgSink {
    async fn write_batch(&self, records: &[OpLogRecord]) -> AppResult<()> {
        operation_logs::insert_batch(&self.pool, records).await
    }
}

/// Single consumer of the operation log queue
pub struct OpLogWorker {
    sink: Arc<dyn OpLogSink>,
    batch_size: usize,
    batch_window: Duration,
}

impl OpLogWorker {
    pub fn new(sink: Arc<dyn OpLogSink>, batch_size: usize, batch_window: Duration) -> Self {
        Self {
            sink,
            batch_size,
            batch_window,
        }
    }

    /// Run until the queue closes, flushing any final partial batch
    pub async fn run(self, mut rx: mpsc::Receiver<OpLogRecord>) {
        tracing::info!("Operation log worker started");

        while let Some(first) = rx.recv().await {
            let batch = self.collect_batch(first, &mut rx).await;
            self.flush(&batch).await;
        }

        tracing::info!("Operation log queue closed, worker stopping");
    }

    /// Gather up to `batch_size` records within the batch window
    async fn collect_batch(
        &self,
        first: OpLogRecord,
        rx: &mut mpsc::Receiver<OpLogRecord>,
    ) -> Vec<OpLogRecord> {
        let deadline = Instant::now() + self.batch_window;
        let mut batch = vec![first];

        while batch.len() < self.batch_size {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(record)) => batch.push(record),
                // Channel closed or window elapsed
                Ok(None) | Err(_) => break,
            }
        }
        batch
    }

    /// Write a batch with bounded retries; a batch that still fails is
    /// dropped with an error log so the worker keeps draining
    async fn flush(&self, batch: &[OpLogRecord]) {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match self.sink.write_batch(batch).await {
                Ok(()) => {
                    tracing::debug!(count = batch.len(), "Operation log batch written");
                    return;
                }
                Err(e) if attempt < MAX_WRITE_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "Operation log write failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        count = batch.len(),
                        error = %e,
                        "Operation log batch dropped after {MAX_WRITE_ATTEMPTS} attempts"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::OpLogQueue;
    use crate::oplog::queue::tests::record;
    use shared::AppError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Sink capturing batches in memory
    #[derive(Default)]
    struct MemorySink {
        batches: Mutex<Vec<Vec<OpLogRecord>>>,
    }

    #[async_trait]
    impl OpLogSink for MemorySink {
        async fn write_batch(&self, records: &[OpLogRecord]) -> AppResult<()> {
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    /// Sink failing the first `fail_times` writes
    struct FlakySink {
        inner: MemorySink,
        fail_times: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl OpLogSink for FlakySink {
        async fn write_batch(&self, records: &[OpLogRecord]) -> AppResult<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                return Err(AppError::database("simulated outage"));
            }
            self.inner.write_batch(records).await
        }
    }

    #[tokio::test]
    async fn test_batches_flush_and_worker_exits_on_close() {
        let sink = Arc::new(MemorySink::default());
        let worker = OpLogWorker::new(
            Arc::clone(&sink) as Arc<dyn OpLogSink>,
            10,
            Duration::from_millis(20),
        );

        let (queue, rx) = OpLogQueue::new(16);
        for i in 0..3 {
            queue.push(record(&format!("/api/v1/r{i}")));
        }
        drop(queue);

        // Queue closed, run() drains and returns
        worker.run(rx).await;

        let batches = sink.batches.lock().unwrap();
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_full_batch_flushes_without_waiting_for_window() {
        let sink = Arc::new(MemorySink::default());
        let worker = OpLogWorker::new(
            Arc::clone(&sink) as Arc<dyn OpLogSink>,
            2,
            // Window far longer than the test runs
            Duration::from_secs(30),
        );

        let (queue, rx) = OpLogQueue::new(16);
        for i in 0..4 {
            queue.push(record(&format!("/r{i}")));
        }
        drop(queue);

        worker.run(rx).await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let sink = Arc::new(FlakySink {
            inner: MemorySink::default(),
            fail_times: 2,
            attempts: AtomicU32::new(0),
        });
        let worker = OpLogWorker::new(
            Arc::clone(&sink) as Arc<dyn OpLogSink>,
            10,
            Duration::from_millis(10),
        );

        let (queue, rx) = OpLogQueue::new(16);
        queue.push(record("/r"));
        drop(queue);

        worker.run(rx).await;

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sink.inner.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_failure_drops_batch_and_continues() {
        let sink = Arc::new(FlakySink {
            inner: MemorySink::default(),
            fail_times: MAX_WRITE_ATTEMPTS,
            attempts: AtomicU32::new(0),
        });
        let worker = OpLogWorker::new(
            Arc::clone(&sink) as Arc<dyn OpLogSink>,
            1,
            Duration::from_millis(10),
        );

        let (queue, rx) = OpLogQueue::new(16);
        queue.push(record("/doomed"));
        queue.push(record("/survivor"));
        drop(queue);

        worker.run(rx).await;

        // First batch exhausted its retries, the second still landed
        let batches = sink.inner.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].path, "/survivor");
    }
}
