//! Health check

use serde::Serialize;
use shared::ApiResponse;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

/// GET /api/v1/health
pub async fn health() -> ApiResponse<Health> {
    ApiResponse::success(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
