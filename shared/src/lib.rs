//! Shared types for the admin backend
//!
//! Error codes, the unified API response envelope and small utilities
//! used by every service crate.

pub mod error;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use http;
