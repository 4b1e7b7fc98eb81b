//! Department management endpoints
//!
//! Structural changes invalidate every cached snapshot, since any user's
//! subtree scope may have changed.

use std::collections::{HashMap, HashSet};

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use shared::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::auth::{CurrentUser, require_permission};
use crate::db;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let read = Router::new()
        .route("/api/v1/depts", get(list))
        .layer(middleware::from_fn(require_permission("sys:dept:list")));

    let write = Router::new()
        .route("/api/v1/depts", post(create))
        .route("/api/v1/depts/{id}", put(update))
        .layer(middleware::from_fn(require_permission("sys:dept:update")));

    let remove_routes = Router::new()
        .route("/api/v1/depts/{id}", delete(remove))
        .layer(middleware::from_fn(require_permission("sys:dept:delete")));

    read.merge(write).merge(remove_routes)
}

/// GET /api/v1/depts
async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<db::depts::Dept>>> {
    Ok(ApiResponse::success(db::depts::list(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
struct DeptPayload {
    name: String,
    parent_id: Option<i64>,
    #[serde(default)]
    sort_order: i32,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// POST /api/v1/depts
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<DeptPayload>,
) -> AppResult<ApiResponse<i64>> {
    if let Some(parent_id) = payload.parent_id {
        db::depts::find_by_id(&state.pool, parent_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::DeptNotFound))?;
    }

    let id = db::depts::create(
        &state.pool,
        &payload.name,
        payload.parent_id,
        payload.sort_order,
        payload.enabled,
    )
    .await?;

    state.permissions.invalidate_all();
    tracing::info!(dept_id = id, name = %payload.name, by = user.id, "Department created");
    Ok(ApiResponse::success(id))
}

/// PUT /api/v1/depts/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<DeptPayload>,
) -> AppResult<ApiResponse<()>> {
    if let Some(parent_id) = payload.parent_id {
        db::depts::find_by_id(&state.pool, parent_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::DeptNotFound))?;

        // Reparenting under the node's own subtree would loop the tree
        if would_cycle(&state, id, parent_id).await? {
            return Err(AppError::new(ErrorCode::DeptCycle));
        }
    }

    let updated = db::depts::update(
        &state.pool,
        id,
        &payload.name,
        payload.parent_id,
        payload.sort_order,
        payload.enabled,
    )
    .await?;
    if !updated {
        return Err(AppError::new(ErrorCode::DeptNotFound));
    }

    state.permissions.invalidate_all();
    tracing::info!(dept_id = id, by = user.id, "Department updated");
    Ok(ApiResponse::ok())
}

/// DELETE /api/v1/depts/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    if db::depts::has_children(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::DeptHasChildren));
    }
    if db::users::dept_in_use(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::DeptHasUsers));
    }

    if !db::depts::delete(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::DeptNotFound));
    }

    state.permissions.invalidate_all();
    tracing::info!(dept_id = id, by = user.id, "Department deleted");
    Ok(ApiResponse::ok())
}

/// Whether making `new_parent` the parent of `dept` creates a cycle,
/// i.e. `new_parent` lies inside the subtree rooted at `dept`
async fn would_cycle(state: &AppState, dept: i64, new_parent: i64) -> AppResult<bool> {
    if dept == new_parent {
        return Ok(true);
    }

    let tree = db::depts::tree(&state.pool).await?;
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for node in &tree {
        if let Some(parent) = node.parent_id {
            children.entry(parent).or_default().push(node.id);
        }
    }

    let mut seen: HashSet<i64> = HashSet::from([dept]);
    let mut stack = vec![dept];
    while let Some(id) = stack.pop() {
        if let Some(kids) = children.get(&id) {
            for &kid in kids {
                if kid == new_parent {
                    return Ok(true);
                }
                if seen.insert(kid) {
                    stack.push(kid);
                }
            }
        }
    }
    Ok(false)
}
