//! Menu management endpoints
//!
//! Menus carry the permission catalog, so any change here invalidates the
//! whole snapshot cache.

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use shared::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::auth::{CurrentUser, require_permission};
use crate::db;
use crate::state::AppState;

const MENU_KINDS: &[&str] = &["dir", "page", "action"];

pub fn router() -> Router<AppState> {
    let read = Router::new()
        .route("/api/v1/menus", get(list))
        .layer(middleware::from_fn(require_permission("sys:menu:list")));

    let write = Router::new()
        .route("/api/v1/menus", post(create))
        .route("/api/v1/menus/{id}", put(update))
        .layer(middleware::from_fn(require_permission("sys:menu:update")));

    let remove_routes = Router::new()
        .route("/api/v1/menus/{id}", delete(remove))
        .layer(middleware::from_fn(require_permission("sys:menu:delete")));

    read.merge(write).merge(remove_routes)
}

/// GET /api/v1/menus
async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<db::menus::Menu>>> {
    Ok(ApiResponse::success(db::menus::list(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
struct CreateMenu {
    name: String,
    parent_id: Option<i64>,
    kind: String,
    permission: Option<String>,
    #[serde(default)]
    sort_order: i32,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// POST /api/v1/menus
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateMenu>,
) -> AppResult<ApiResponse<i64>> {
    if !MENU_KINDS.contains(&payload.kind.as_str()) {
        return Err(AppError::validation(format!("Unknown menu kind {}", payload.kind)));
    }
    if payload.kind == "action" && payload.permission.is_none() {
        return Err(AppError::validation("Action menus require a permission identifier"));
    }
    if let Some(parent_id) = payload.parent_id {
        db::menus::find_by_id(&state.pool, parent_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::MenuNotFound))?;
    }

    let id = db::menus::create(
        &state.pool,
        &payload.name,
        payload.parent_id,
        &payload.kind,
        payload.permission.as_deref(),
        payload.sort_order,
        payload.enabled,
    )
    .await?;

    state.permissions.invalidate_all();
    tracing::info!(menu_id = id, name = %payload.name, by = user.id, "Menu created");
    Ok(ApiResponse::success(id))
}

#[derive(Debug, Deserialize)]
struct UpdateMenu {
    name: String,
    permission: Option<String>,
    #[serde(default)]
    sort_order: i32,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

/// PUT /api/v1/menus/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMenu>,
) -> AppResult<ApiResponse<()>> {
    let updated = db::menus::update(
        &state.pool,
        id,
        &payload.name,
        payload.permission.as_deref(),
        payload.sort_order,
        payload.enabled,
    )
    .await?;
    if !updated {
        return Err(AppError::new(ErrorCode::MenuNotFound));
    }

    state.permissions.invalidate_all();
    tracing::info!(menu_id = id, by = user.id, "Menu updated");
    Ok(ApiResponse::ok())
}

/// DELETE /api/v1/menus/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    if db::menus::has_children(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::MenuHasChildren));
    }

    if !db::menus::delete(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::MenuNotFound));
    }

    state.permissions.invalidate_all();
    tracing::info!(menu_id = id, by = user.id, "Menu deleted");
    Ok(ApiResponse::ok())
}
