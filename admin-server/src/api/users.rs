//! User management endpoints

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use shared::util::hash_password;
use shared::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::auth::{CurrentUser, require_permission};
use crate::db;
use crate::db::users::NewUser;
use crate::state::AppState;

use super::Pagination;

pub fn router() -> Router<AppState> {
    let read = Router::new()
        .route("/api/v1/users", get(list))
        .route("/api/v1/users/{id}", get(get_by_id))
        .layer(middleware::from_fn(require_permission("sys:user:list")));

    let create_routes = Router::new()
        .route("/api/v1/users", post(create))
        .layer(middleware::from_fn(require_permission("sys:user:create")));

    let update_routes = Router::new()
        .route("/api/v1/users/{id}", put(update))
        .route("/api/v1/users/{id}/password", put(set_password))
        .route("/api/v1/users/{id}/roles", put(set_roles))
        .layer(middleware::from_fn(require_permission("sys:user:update")));

    let delete_routes = Router::new()
        .route("/api/v1/users/{id}", delete(remove))
        .layer(middleware::from_fn(require_permission("sys:user:delete")));

    read.merge(create_routes).merge(update_routes).merge(delete_routes)
}

/// GET /api/v1/users
///
/// Rows are filtered by the caller's data scope.
async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<db::users::User>>> {
    let (limit, offset) = page.limit_offset();
    let users = db::users::list(&state.pool, user.scope(), user.id, limit, offset).await?;
    Ok(ApiResponse::success(users))
}

/// GET /api/v1/users/{id}
async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<db::users::User>> {
    let target = db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    // Out-of-scope rows look absent, not forbidden
    if !user.scope().allows(user.id, target.id, target.dept_id) {
        return Err(AppError::new(ErrorCode::UserNotFound));
    }
    Ok(ApiResponse::success(target))
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    username: String,
    nickname: Option<String>,
    password: String,
    dept_id: Option<i64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// POST /api/v1/users
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateUser>,
) -> AppResult<ApiResponse<i64>> {
    if payload.username.is_empty() || payload.password.len() < 8 {
        return Err(AppError::validation(
            "Username required and password must be at least 8 characters",
        ));
    }
    if db::users::username_taken(&state.pool, &payload.username).await? {
        return Err(AppError::new(ErrorCode::UsernameExists));
    }
    if let Some(dept_id) = payload.dept_id {
        db::depts::find_by_id(&state.pool, dept_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::DeptNotFound))?;
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::crypto(format!("Password hashing failed: {e}")))?;

    let id = db::users::create(
        &state.pool,
        NewUser {
            username: &payload.username,
            nickname: payload.nickname.as_deref(),
            password_hash: &password_hash,
            dept_id: payload.dept_id,
            enabled: payload.enabled,
            created_by: user.id,
        },
    )
    .await?;

    tracing::info!(user_id = id, username = %payload.username, by = user.id, "User created");
    Ok(ApiResponse::success(id))
}

#[derive(Debug, Deserialize)]
struct UpdateUser {
    nickname: Option<String>,
    dept_id: Option<i64>,
    enabled: bool,
}

/// PUT /api/v1/users/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUser>,
) -> AppResult<ApiResponse<()>> {
    if let Some(dept_id) = payload.dept_id {
        db::depts::find_by_id(&state.pool, dept_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::DeptNotFound))?;
    }

    let updated = db::users::update(
        &state.pool,
        id,
        payload.nickname.as_deref(),
        payload.dept_id,
        payload.enabled,
    )
    .await?;
    if !updated {
        return Err(AppError::new(ErrorCode::UserNotFound));
    }

    // Department or enabled flag may have changed the user's scope
    state.permissions.invalidate_user(id);
    tracing::info!(user_id = id, by = user.id, "User updated");
    Ok(ApiResponse::ok())
}

#[derive(Debug, Deserialize)]
struct SetPassword {
    password: String,
}

/// PUT /api/v1/users/{id}/password
async fn set_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<SetPassword>,
) -> AppResult<ApiResponse<()>> {
    if payload.password.len() < 8 {
        return Err(AppError::validation("Password must be at least 8 characters"));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::crypto(format!("Password hashing failed: {e}")))?;

    if !db::users::set_password(&state.pool, id, &password_hash).await? {
        return Err(AppError::new(ErrorCode::UserNotFound));
    }
    tracing::info!(user_id = id, by = user.id, "Password changed");
    Ok(ApiResponse::ok())
}

#[derive(Debug, Deserialize)]
struct SetRoles {
    role_ids: Vec<i64>,
}

/// PUT /api/v1/users/{id}/roles
async fn set_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<SetRoles>,
) -> AppResult<ApiResponse<()>> {
    db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    for role_id in &payload.role_ids {
        db::roles::find_by_id(&state.pool, *role_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::RoleNotFound))?;
    }

    db::users::set_roles(&state.pool, id, &payload.role_ids).await?;

    // Invalidate before responding so the next request sees the new roles
    state.permissions.invalidate_user(id);
    tracing::info!(user_id = id, by = user.id, roles = ?payload.role_ids, "Roles assigned");
    Ok(ApiResponse::ok())
}

/// DELETE /api/v1/users/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    if id == user.id {
        return Err(AppError::invalid_request("Cannot delete your own account"));
    }

    if !db::users::delete(&state.pool, id).await? {
        return Err(AppError::new(ErrorCode::UserNotFound));
    }

    state.permissions.invalidate_user(id);
    tracing::info!(user_id = id, by = user.id, "User deleted");
    Ok(ApiResponse::ok())
}
