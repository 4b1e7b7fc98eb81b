//! Authentication endpoints

use axum::extract::{Extension, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use shared::util::verify_password;
use shared::{ApiResponse, AppError, AppResult};

use crate::auth::{Claims, CurrentUser};
use crate::loginlog;
use crate::oplog::client_ip;
use crate::state::AppState;
use crate::{db, rbac::DataScope};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    /// Unix timestamp seconds
    expires_at: i64,
}

/// POST /api/v1/auth/login
///
/// A disabled account can still authenticate; it is rejected with 403 at
/// authorization time, so the distinction between "bad password" and
/// "disabled" is not leaked here.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let ip = client_ip(&headers);
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let credentials = db::users::find_credentials(&state.pool, &payload.username).await?;

    let Some(credentials) = credentials else {
        loginlog::record(
            state.pool.clone(),
            payload.username.clone(),
            false,
            ip,
            user_agent,
            Some("unknown user".into()),
        );
        return Err(AppError::invalid_credentials());
    };

    if !verify_password(&payload.password, &credentials.password_hash) {
        loginlog::record(
            state.pool.clone(),
            payload.username.clone(),
            false,
            ip,
            user_agent,
            Some("wrong password".into()),
        );
        return Err(AppError::invalid_credentials());
    }

    let issued = state.tokens.issue(credentials.id)?;

    tracing::info!(user_id = credentials.id, username = %payload.username, "Login");
    loginlog::record(
        state.pool.clone(),
        payload.username,
        true,
        ip,
        user_agent,
        None,
    );

    Ok(ApiResponse::success(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// POST /api/v1/auth/logout
///
/// Revokes the current session; the token stops verifying immediately.
async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    user: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.tokens.revoke(&claims).await?;
    tracing::info!(user_id = user.id, username = %user.username, "Logout");
    Ok(ApiResponse::ok())
}

#[derive(Debug, Serialize)]
struct Profile {
    id: i64,
    username: String,
    dept_id: Option<i64>,
    superuser: bool,
    permissions: Vec<String>,
    /// "all" | "depts" | "self"
    scope: &'static str,
    scope_depts: Option<Vec<i64>>,
}

/// GET /api/v1/auth/me
async fn me(user: CurrentUser) -> AppResult<ApiResponse<Profile>> {
    let mut permissions: Vec<String> = user.snapshot.permissions.iter().cloned().collect();
    permissions.sort();

    let (scope, scope_depts) = match user.scope() {
        DataScope::All => ("all", None),
        DataScope::Depts(depts) => ("depts", Some(depts.iter().copied().collect())),
        DataScope::SelfOnly => ("self", None),
    };

    Ok(ApiResponse::success(Profile {
        id: user.id,
        username: user.username.clone(),
        dept_id: user.dept_id,
        superuser: user.superuser,
        permissions,
        scope,
        scope_depts,
    }))
}
