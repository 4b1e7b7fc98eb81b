//! Application state

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::auth::{MemoryRevocationStore, TokenService};
use crate::config::Config;
use crate::crypto::MasterKey;
use crate::db::rbac::PgRbacSource;
use crate::oplog::{OpLogQueue, OpLogRecord, Redactor};
use crate::rbac::PermissionService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// JWT issue/verify with session revocation
    pub tokens: Arc<TokenService>,
    /// Revocation store, exposed for the periodic sweep
    pub revocation: Arc<MemoryRevocationStore>,
    /// Permission snapshot resolution and cache
    pub permissions: Arc<PermissionService>,
    /// Operation log producer handle
    pub oplog: OpLogQueue,
    /// Sensitive field redaction for captured bodies
    pub redactor: Arc<Redactor>,
    /// Path prefixes never captured by the operation log
    pub oplog_excluded: Arc<Vec<String>>,
    /// Whether 401/403 responses are recorded in the operation log
    pub oplog_log_denied: bool,
}

impl AppState {
    /// Create application state; the caller spawns the returned worker input
    pub async fn new(config: &Config) -> Result<(Self, mpsc::Receiver<OpLogRecord>), BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let master_key = match MasterKey::from_base64(&config.master_key_b64) {
            Ok(key) => key,
            Err(e) if config.environment == "development" => {
                tracing::warn!(
                    "MASTER_KEY_B64 invalid ({e}), generating ephemeral development key"
                );
                MasterKey::generate()
            }
            Err(e) => return Err(e),
        };

        let revocation = Arc::new(MemoryRevocationStore::new());
        let tokens = Arc::new(TokenService::new(
            &config.jwt_secret,
            config.jwt_expiration_minutes,
            Arc::clone(&revocation) as Arc<dyn crate::auth::RevocationStore>,
        ));

        let permissions = Arc::new(PermissionService::new(
            Arc::new(PgRbacSource::new(pool.clone())),
            Duration::from_secs(config.perm_cache_ttl_secs),
        ));

        let (oplog, oplog_rx) = OpLogQueue::new(config.oplog_queue_capacity);

        let state = Self {
            pool,
            tokens,
            revocation,
            permissions,
            oplog,
            redactor: Arc::new(Redactor::new(
                master_key,
                &config.oplog_masked_fields,
                &config.oplog_encrypted_fields,
            )),
            oplog_excluded: Arc::new(config.oplog_excluded_prefixes.clone()),
            oplog_log_denied: config.oplog_log_denied,
        };
        Ok((state, oplog_rx))
    }
}
