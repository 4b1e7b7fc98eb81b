//! Authenticated user extractor

use std::sync::Arc;

use axum::extract::FromRequestParts;
use http::request::Parts;
use shared::AppError;

use crate::rbac::{DataScope, PermissionSnapshot};

/// Authenticated caller, injected by the auth middleware
///
/// Handlers take it as an extractor:
///
/// ```ignore
/// async fn handler(user: CurrentUser) -> AppResult<Json<...>> {
///     if user.has_permission("sys:user:list") { ... }
/// }
/// ```
#[derive(Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub dept_id: Option<i64>,
    pub superuser: bool,
    pub snapshot: Arc<PermissionSnapshot>,
}

impl CurrentUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.snapshot.has_permission(permission)
    }

    pub fn scope(&self) -> &DataScope {
        &self.snapshot.scope
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(AppError::not_authenticated)
    }
}
