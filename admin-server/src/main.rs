//! admin-server: authorization and audit backend
//!
//! Long-running service that:
//! - Authenticates users with revocable JWT sessions
//! - Resolves role-based permissions and data scopes with a TTL cache
//! - Captures every API request into an async operation log pipeline
//! - Records login attempts with coarse region and client detection

mod api;
mod auth;
mod config;
mod crypto;
mod db;
mod loginlog;
mod oplog;
mod rbac;
mod state;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use oplog::{OpLogWorker, PgSink};
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting admin-server (env: {})", config.environment);

    let (state, oplog_rx) = AppState::new(&config).await?;

    // Operation log consumer
    let worker = OpLogWorker::new(
        Arc::new(PgSink::new(state.pool.clone())),
        config.oplog_batch_size,
        Duration::from_millis(config.oplog_batch_window_ms),
    );
    let worker_handle = tokio::spawn(worker.run(oplog_rx));

    // Periodic revocation store sweep (every 5 minutes)
    let revocation = Arc::clone(&state.revocation);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            revocation.sweep();
        }
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("admin-server listening on {addr}");

    axum::serve(listener, app).await?;

    worker_handle.await?;
    Ok(())
}
