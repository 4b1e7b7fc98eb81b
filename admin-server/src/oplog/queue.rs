//! Bounded non-blocking operation log queue
//!
//! The capture middleware pushes with `try_send`; a full queue drops the
//! record and bumps a counter instead of applying backpressure to the
//! request path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::types::OpLogRecord;

/// Producer half of the pipeline
#[derive(Clone)]
pub struct OpLogQueue {
    tx: mpsc::Sender<OpLogRecord>,
    dropped: Arc<AtomicU64>,
}

impl OpLogQueue {
    /// Create a queue with the given capacity, returning the consumer half
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OpLogRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (queue, rx)
    }

    /// Push a record without blocking; full or closed queues drop it
    pub fn push(&self, record: OpLogRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(r)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    path = %r.path,
                    total_dropped = total,
                    "Operation log queue full, record dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Operation log queue closed");
            }
        }
    }

    /// Total records dropped due to overflow since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::oplog::OpOutcome;
    use shared::util::now_millis;

    pub(crate) fn record(path: &str) -> OpLogRecord {
        OpLogRecord {
            username: Some("alice".into()),
            permission: None,
            method: "POST".into(),
            path: path.into(),
            query: None,
            body: None,
            status: 200,
            outcome: OpOutcome::Success,
            ip: "127.0.0.1".into(),
            user_agent: None,
            latency_ms: 5,
            created_at: now_millis(),
        }
    }

    #[tokio::test]
    async fn test_push_and_receive() {
        let (queue, mut rx) = OpLogQueue::new(4);
        queue.push(record("/api/v1/users"));

        let got = rx.recv().await.unwrap();
        assert_eq!(got.path, "/api/v1/users");
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_and_counts() {
        let (queue, mut rx) = OpLogQueue::new(2);
        queue.push(record("/a"));
        queue.push(record("/b"));
        queue.push(record("/c"));
        queue.push(record("/d"));

        assert_eq!(queue.dropped(), 2);

        // Earlier records survive, overflow was dropped
        assert_eq!(rx.recv().await.unwrap().path, "/a");
        assert_eq!(rx.recv().await.unwrap().path, "/b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_after_close_is_silent() {
        let (queue, rx) = OpLogQueue::new(2);
        drop(rx);

        queue.push(record("/a"));
        // Closed channel is not an overflow
        assert_eq!(queue.dropped(), 0);
    }
}
