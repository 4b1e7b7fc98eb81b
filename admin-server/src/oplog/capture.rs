//! Request capture middleware
//!
//! Outermost layer on the API router. Buffers small JSON request bodies,
//! redacts them, and pushes a record onto the queue after the response is
//! produced. Never fails the request it observes.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::HeaderMap;
use shared::util::now_millis;
use tokio::time::Instant;

use crate::state::AppState;

use super::types::{AuditIdentity, OpLogRecord, OpOutcome, RequiredPermission};

/// JSON bodies larger than this are passed through unrecorded
const BODY_CAPTURE_LIMIT: usize = 64 * 1024;

/// Recorded body text is clipped to this many bytes
const BODY_STORE_LIMIT: usize = 10 * 1024;

pub async fn capture_oplog(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    // Login attempts go to the login log instead; health checks are noise
    if req.method() == http::Method::OPTIONS
        || !path.starts_with("/api/")
        || state.oplog_excluded.iter().any(|p| path.starts_with(p))
    {
        return next.run(req).await;
    }

    let started = Instant::now();
    let method = req.method().to_string();
    let path = path.to_string();
    let query = req.uri().query().map(str::to_string);
    let ip = client_ip(req.headers());
    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let (req, body) = capture_body(&state, req).await;

    let response = next.run(req).await;

    let status = response.status().as_u16();
    if matches!(status, 401 | 403) && !state.oplog_log_denied {
        return response;
    }

    let username = response
        .extensions()
        .get::<AuditIdentity>()
        .map(|id| id.username.clone());
    let permission = response
        .extensions()
        .get::<RequiredPermission>()
        .map(|p| p.0.to_string());

    state.oplog.push(OpLogRecord {
        username,
        permission,
        method,
        path,
        query,
        body,
        status: status as i16,
        outcome: OpOutcome::from_status(status),
        ip,
        user_agent,
        latency_ms: started.elapsed().as_millis() as i64,
        created_at: now_millis(),
    });

    response
}

/// Buffer and redact a small JSON body, rebuilding the request around the
/// buffered bytes. Anything else passes through untouched.
async fn capture_body(state: &AppState, req: Request) -> (Request, Option<serde_json::Value>) {
    let is_json = req
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let small_enough = req
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= BODY_CAPTURE_LIMIT);

    if !is_json || !small_enough {
        return (req, None);
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, BODY_CAPTURE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // Body unreadable, surface that downstream instead of here
            tracing::debug!("Request body read failed during capture: {e}");
            return (Request::from_parts(parts, Body::empty()), None);
        }
    };

    let captured = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .map(|mut value| {
            state.redactor.redact(&mut value);
            clip(value)
        });

    (Request::from_parts(parts, Body::from(bytes)), captured)
}

/// Clip an oversized redacted body to a bounded string
fn clip(value: serde_json::Value) -> serde_json::Value {
    let text = value.to_string();
    if text.len() <= BODY_STORE_LIMIT {
        return value;
    }
    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i < BODY_STORE_LIMIT)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    serde_json::Value::String(format!("{}...[truncated]", &text[..cut]))
}

/// Client address from the forwarding headers
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
