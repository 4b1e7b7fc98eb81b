//! Admin server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Admin server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT signing secret (HS256)
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    pub jwt_expiration_minutes: i64,
    /// Permission snapshot cache TTL in seconds
    pub perm_cache_ttl_secs: u64,
    /// Operation log queue capacity
    pub oplog_queue_capacity: usize,
    /// Operation log batch size per flush
    pub oplog_batch_size: usize,
    /// Operation log batch window in milliseconds
    pub oplog_batch_window_ms: u64,
    /// Record operation logs for 401/403 responses
    pub oplog_log_denied: bool,
    /// Path prefixes never captured by the operation log
    pub oplog_excluded_prefixes: Vec<String>,
    /// Body fields replaced with an unrecoverable mask
    pub oplog_masked_fields: Vec<String>,
    /// Body fields encrypted with the master key
    pub oplog_encrypted_fields: Vec<String>,
    /// Master key for sensitive field encryption, base64-encoded 32 bytes
    pub master_key_b64: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Comma-separated list env var with a default
    fn csv_list(name: &str, default: &[&str]) -> Vec<String> {
        match std::env::var(name) {
            Ok(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1440),
            perm_cache_ttl_secs: std::env::var("PERM_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            oplog_queue_capacity: std::env::var("OPLOG_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            oplog_batch_size: std::env::var("OPLOG_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            oplog_batch_window_ms: std::env::var("OPLOG_BATCH_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),
            oplog_log_denied: std::env::var("OPLOG_LOG_DENIED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            oplog_excluded_prefixes: Self::csv_list(
                "OPLOG_EXCLUDED_PREFIXES",
                &["/api/v1/auth/login", "/api/v1/health"],
            ),
            oplog_masked_fields: Self::csv_list(
                "OPLOG_MASKED_FIELDS",
                &["password", "old_password", "new_password", "token", "secret"],
            ),
            oplog_encrypted_fields: Self::csv_list(
                "OPLOG_ENCRYPTED_FIELDS",
                &["phone", "email", "id_card"],
            ),
            master_key_b64: Self::require_secret("MASTER_KEY_B64", &environment)?,
            environment,
        })
    }
}
