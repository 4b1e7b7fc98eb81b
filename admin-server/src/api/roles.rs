//! Role management endpoints

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use shared::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::auth::{CurrentUser, require_permission};
use crate::db;
use crate::rbac::ScopeMode;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let read = Router::new()
        .route("/api/v1/roles", get(list))
        .route("/api/v1/roles/{id}", get(get_by_id))
        .route("/api/v1/roles/{id}/menus", get(menus))
        .layer(middleware::from_fn(require_permission("sys:role:list")));

    let write = Router::new()
        .route("/api/v1/roles", post(create))
        .route("/api/v1/roles/{id}", put(update))
        .route("/api/v1/roles/{id}/menus", put(set_menus))
        .layer(middleware::from_fn(require_permission("sys:role:update")));

    let remove_routes = Router::new()
        .route("/api/v1/roles/{id}", delete(remove))
        .layer(middleware::from_fn(require_permission("sys:role:delete")));

    read.merge(write).merge(remove_routes)
}

/// GET /api/v1/roles
async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<db::roles::Role>>> {
    Ok(ApiResponse::success(db::roles::list(&state.pool).await?))
}

/// GET /api/v1/roles/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<db::roles::Role>> {
    let role = db::roles::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::RoleNotFound))?;
    Ok(ApiResponse::success(role))
}

/// GET /api/v1/roles/{id}/menus
async fn menus(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<Vec<i64>>> {
    db::roles::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::RoleNotFound))?;
    Ok(ApiResponse::success(db::roles::menu_ids(&state.pool, id).await?))
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    name: String,
    remark: Option<String>,
    scope_mode: i16,
    #[serde(default)]
    scope_dept_ids: Vec<i64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn validate_scope(payload: &RolePayload) -> AppResult<ScopeMode> {
    let mode = ScopeMode::from_db(payload.scope_mode)
        .ok_or_else(|| AppError::validation(format!("Unknown scope mode {}", payload.scope_mode)))?;
    if mode == ScopeMode::Custom && payload.scope_dept_ids.is_empty() {
        return Err(AppError::new(ErrorCode::CustomScopeNeedsDepts));
    }
    Ok(mode)
}

/// POST /api/v1/roles
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<RolePayload>,
) -> AppResult<ApiResponse<i64>> {
    let mode = validate_scope(&payload)?;
    if db::roles::name_taken(&state.pool, &payload.name, None).await? {
        return Err(AppError::new(ErrorCode::RoleNameExists));
    }

    let id = db::roles::create(
        &state.pool,
        &payload.name,
        payload.remark.as_deref(),
        mode.as_db(),
        payload.enabled,
    )
    .await?;

    if mode == ScopeMode::Custom {
        db::roles::set_scope_depts(&state.pool, id, &payload.scope_dept_ids).await?;
    }

    tracing::info!(role_id = id, name = %payload.name, by = user.id, "Role created");
    Ok(ApiResponse::success(id))
}

/// PUT /api/v1/roles/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<RolePayload>,
) -> AppResult<ApiResponse<()>> {
    let mode = validate_scope(&payload)?;
    if db::roles::name_taken(&state.pool, &payload.name, Some(id)).await? {
        return Err(AppError::new(ErrorCode::RoleNameExists));
    }

    let updated = db::roles::update(
        &state.pool,
        id,
        &payload.name,
        payload.remark.as_deref(),
        mode.as_db(),
        payload.enabled,
    )
    .await?;
    if !updated {
        return Err(AppError::new(ErrorCode::RoleNotFound));
    }

    let scope_depts = if mode == ScopeMode::Custom {
        payload.scope_dept_ids.as_slice()
    } else {
        &[]
    };
    db::roles::set_scope_depts(&state.pool, id, scope_depts).await?;

    // Everyone holding this role gets a fresh snapshot on next request
    let holders = db::roles::user_ids(&state.pool, id).await?;
    state.permissions.invalidate_users(&holders);

    tracing::info!(role_id = id, by = user.id, "Role updated");
    Ok(ApiResponse::ok())
}

#[derive(Debug, Deserialize)]
struct SetMenus {
    menu_ids: Vec<i64>,
}

/// PUT /api/v1/roles/{id}/menus
async fn set_menus(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<SetMenus>,
) -> AppResult<ApiResponse<()>> {
    db::roles::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::RoleNotFound))?;

    for menu_id in &payload.menu_ids {
        db::menus::find_by_id(&state.pool, *menu_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::MenuNotFound))?;
    }

    db::roles::set_menus(&state.pool, id, &payload.menu_ids).await?;

    let holders = db::roles::user_ids(&state.pool, id).await?;
    state.permissions.invalidate_users(&holders);

    tracing::info!(role_id = id, by = user.id, menus = payload.menu_ids.len(), "Role menus set");
    Ok(ApiResponse::ok())
}

/// DELETE /api/v1/roles/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    if db::roles::in_use(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::RoleInUse));
    }

    if !db::roles::delete(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::RoleNotFound));
    }

    tracing::info!(role_id = id, by = user.id, "Role deleted");
    Ok(ApiResponse::ok())
}
