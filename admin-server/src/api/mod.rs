//! HTTP API

mod auth;
mod depts;
mod health;
mod logs;
mod menus;
mod roles;
mod users;

use axum::{Router, middleware, routing::get};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::oplog::capture_oplog;
use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health))
        .merge(auth::router())
        .merge(users::router())
        .merge(roles::router())
        .merge(depts::router())
        .merge(menus::router())
        .merge(logs::router())
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        // Capture sits outside auth so it sees denied requests too
        .layer(middleware::from_fn_with_state(state.clone(), capture_oplog))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Common pagination query parameters
#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    pub fn limit_offset(&self) -> (i64, i64) {
        let size = self.page_size.unwrap_or(20).clamp(1, 200);
        let page = self.page.unwrap_or(1).max(1);
        (size, (page - 1) * size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination {
            page: None,
            page_size: None,
        };
        assert_eq!(p.limit_offset(), (20, 0));
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination {
            page: Some(0),
            page_size: Some(100_000),
        };
        assert_eq!(p.limit_offset(), (200, 0));

        let p = Pagination {
            page: Some(3),
            page_size: Some(50),
        };
        assert_eq!(p.limit_offset(), (50, 100));
    }
}
