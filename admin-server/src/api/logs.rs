//! Log query endpoints

use axum::extract::{Query, State};
use axum::routing::{delete, get};
use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use shared::{ApiResponse, AppResult};

use crate::auth::require_permission;
use crate::db;
use crate::state::AppState;

use super::Pagination;

pub fn router() -> Router<AppState> {
    let read = Router::new()
        .route("/api/v1/logs/operations", get(operations))
        .route("/api/v1/logs/operations/stats", get(operation_stats))
        .route("/api/v1/logs/logins", get(logins))
        .layer(middleware::from_fn(require_permission("sys:log:list")));

    let cleanup = Router::new()
        .route("/api/v1/logs/operations", delete(purge_operations))
        .route("/api/v1/logs/logins", delete(purge_logins))
        .layer(middleware::from_fn(require_permission("sys:log:delete")));

    read.merge(cleanup)
}

#[derive(Debug, Deserialize)]
struct OpLogQueryParams {
    username: Option<String>,
    path: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

/// GET /api/v1/logs/operations
async fn operations(
    State(state): State<AppState>,
    Query(params): Query<OpLogQueryParams>,
) -> AppResult<ApiResponse<Vec<db::operation_logs::OperationLog>>> {
    let (limit, offset) = Pagination {
        page: params.page,
        page_size: params.page_size,
    }
    .limit_offset();
    let logs = db::operation_logs::query(
        &state.pool,
        params.username.as_deref(),
        params.path.as_deref(),
        limit,
        offset,
    )
    .await?;
    Ok(ApiResponse::success(logs))
}

#[derive(Debug, Serialize)]
struct OpLogStats {
    /// Records dropped due to queue overflow since startup
    dropped: u64,
}

/// GET /api/v1/logs/operations/stats
async fn operation_stats(State(state): State<AppState>) -> AppResult<ApiResponse<OpLogStats>> {
    Ok(ApiResponse::success(OpLogStats {
        dropped: state.oplog.dropped(),
    }))
}

#[derive(Debug, Deserialize)]
struct LoginLogQueryParams {
    username: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

/// GET /api/v1/logs/logins
async fn logins(
    State(state): State<AppState>,
    Query(params): Query<LoginLogQueryParams>,
) -> AppResult<ApiResponse<Vec<db::login_logs::LoginLog>>> {
    let (limit, offset) = Pagination {
        page: params.page,
        page_size: params.page_size,
    }
    .limit_offset();
    let logs =
        db::login_logs::query(&state.pool, params.username.as_deref(), limit, offset).await?;
    Ok(ApiResponse::success(logs))
}

#[derive(Debug, Deserialize)]
struct PurgeParams {
    /// Unix timestamp millis; records older than this are deleted
    before: i64,
}

#[derive(Debug, Serialize)]
struct Purged {
    deleted: u64,
}

/// DELETE /api/v1/logs/operations?before=...
async fn purge_operations(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> AppResult<ApiResponse<Purged>> {
    let deleted = db::operation_logs::delete_before(&state.pool, params.before).await?;
    tracing::info!(deleted, before = params.before, "Operation logs purged");
    Ok(ApiResponse::success(Purged { deleted }))
}

/// DELETE /api/v1/logs/logins?before=...
async fn purge_logins(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> AppResult<ApiResponse<Purged>> {
    let deleted = db::login_logs::delete_before(&state.pool, params.before).await?;
    tracing::info!(deleted, before = params.before, "Login logs purged");
    Ok(ApiResponse::success(Purged { deleted }))
}
