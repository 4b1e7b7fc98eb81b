//! Operation log pipeline
//!
//! Requests are captured by middleware, redacted, pushed onto a bounded
//! non-blocking queue, and persisted in batches by a background worker.
//! The pipeline never blocks or fails a request; overflow is counted and
//! dropped.

mod capture;
mod queue;
mod redact;
mod types;
mod worker;

pub use capture::{capture_oplog, client_ip};
pub use queue::OpLogQueue;
pub use redact::Redactor;
pub use types::{AuditIdentity, OpLogRecord, OpOutcome, RequiredPermission};
pub use worker::{OpLogWorker, PgSink};
