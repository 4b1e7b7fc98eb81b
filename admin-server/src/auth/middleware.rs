//! Authentication and authorization middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::AppError;

use crate::oplog::{AuditIdentity, RequiredPermission};
use crate::state::AppState;
use crate::{auth::TokenService, db};

use super::extractor::CurrentUser;

/// Paths that never require a token
const PUBLIC_PATHS: &[&str] = &["/api/v1/auth/login", "/api/v1/health"];

/// Authentication middleware
///
/// Extracts and verifies the bearer token, loads the live user row (so
/// disabling a user takes effect immediately), resolves the permission
/// snapshot and injects [`CurrentUser`] into request extensions.
///
/// A disabled user's token still verifies; the denial happens here with
/// 403, not at login.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();

    // CORS preflight
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    // Non-API routes fall through to their own 404
    if !path.starts_with("/api/") {
        return Ok(next.run(req).await);
    }

    if PUBLIC_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => TokenService::extract_from_header(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
        None => {
            tracing::warn!(uri = %req.uri(), "Missing authorization header");
            return Err(AppError::not_authenticated());
        }
    };

    let claims = state.tokens.verify(token).await?;
    let user_id = claims.user_id()?;

    // Token subject no longer exists: the account was deleted
    let user = db::users::find_auth(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::invalid_token("Unknown user"))?;

    if !user.enabled {
        tracing::warn!(user_id, username = %user.username, "Disabled account denied");
        return Err(AppError::account_disabled());
    }

    // A password change invalidates every token issued before it
    if claims.iat * 1000 < user.password_changed_at {
        tracing::info!(user_id, "Token predates password change");
        return Err(AppError::session_revoked());
    }

    let snapshot = state.permissions.snapshot(&user).await?;

    let identity = AuditIdentity {
        user_id: user.id,
        username: user.username.clone(),
    };

    // Logout needs the session id from the verified claims
    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        dept_id: user.dept_id,
        superuser: user.superuser,
        snapshot,
    });

    // Best-effort activity bump off the request path
    {
        let pool = state.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = db::users::touch_last_active(&pool, user_id).await {
                tracing::debug!(user_id, "last_active update failed: {e}");
            }
        });
    }

    let mut response = next.run(req).await;
    // Expose the caller to the outer capture middleware
    response.extensions_mut().insert(identity);
    Ok(response)
}

/// Permission check middleware
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/api/v1/users", get(handler::list))
///     .layer(middleware::from_fn(require_permission("sys:user:list")));
/// ```
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>
+ Clone {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let user = req
                .extensions()
                .get::<CurrentUser>()
                .ok_or_else(AppError::not_authenticated)?;

            if !user.has_permission(permission) {
                tracing::warn!(
                    user_id = user.id,
                    username = %user.username,
                    required = permission,
                    "Permission denied"
                );
                // Denied attempts still carry the attempted permission so
                // the capture middleware can record it
                let mut response = AppError::permission_denied(format!(
                    "Permission denied: {permission}"
                ))
                .into_response();
                response
                    .extensions_mut()
                    .insert(RequiredPermission(permission));
                return Ok(response);
            }

            let mut response = next.run(req).await;
            response
                .extensions_mut()
                .insert(RequiredPermission(permission));
            Ok(response)
        })
    }
}
