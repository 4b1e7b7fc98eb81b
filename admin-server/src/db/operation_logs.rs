//! Operation log table operations

use shared::AppResult;
use sqlx::PgPool;

use crate::oplog::OpLogRecord;

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct OperationLog {
    pub id: i64,
    pub username: Option<String>,
    pub permission: Option<String>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<serde_json::Value>,
    pub status: i16,
    /// "success" | "business_error" | "exception"
    pub outcome: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub latency_ms: i64,
    pub created_at: i64,
}

/// Insert a batch of records with a single multi-row statement
pub async fn insert_batch(pool: &PgPool, records: &[OpLogRecord]) -> AppResult<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut usernames: Vec<Option<&str>> = Vec::with_capacity(records.len());
    let mut permissions: Vec<Option<&str>> = Vec::with_capacity(records.len());
    let mut methods: Vec<&str> = Vec::with_capacity(records.len());
    let mut paths: Vec<&str> = Vec::with_capacity(records.len());
    let mut queries: Vec<Option<&str>> = Vec::with_capacity(records.len());
    let mut bodies: Vec<Option<serde_json::Value>> = Vec::with_capacity(records.len());
    let mut statuses: Vec<i16> = Vec::with_capacity(records.len());
    let mut outcomes: Vec<&str> = Vec::with_capacity(records.len());
    let mut ips: Vec<&str> = Vec::with_capacity(records.len());
    let mut user_agents: Vec<Option<&str>> = Vec::with_capacity(records.len());
    let mut latencies: Vec<i64> = Vec::with_capacity(records.len());
    let mut created: Vec<i64> = Vec::with_capacity(records.len());

    for r in records {
        usernames.push(r.username.as_deref());
        permissions.push(r.permission.as_deref());
        methods.push(&r.method);
        paths.push(&r.path);
        queries.push(r.query.as_deref());
        bodies.push(r.body.clone());
        statuses.push(r.status);
        outcomes.push(r.outcome.as_str());
        ips.push(&r.ip);
        user_agents.push(r.user_agent.as_deref());
        latencies.push(r.latency_ms);
        created.push(r.created_at);
    }

    sqlx::query(
        "INSERT INTO sys_operation_log \
         (username, permission, method, path, query, body, status, outcome, ip, \
          user_agent, latency_ms, created_at) \
         SELECT * FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[], $4::TEXT[], $5::TEXT[], \
          $6::JSONB[], $7::SMALLINT[], $8::TEXT[], $9::TEXT[], $10::TEXT[], \
          $11::BIGINT[], $12::BIGINT[])",
    )
    .bind(&usernames)
    .bind(&permissions)
    .bind(&methods)
    .bind(&paths)
    .bind(&queries)
    .bind(&bodies)
    .bind(&statuses)
    .bind(&outcomes)
    .bind(&ips)
    .bind(&user_agents)
    .bind(&latencies)
    .bind(&created)
    .execute(pool)
    .await?;
    Ok(())
}

/// Query logs, newest first (paginated)
pub async fn query(
    pool: &PgPool,
    username: Option<&str>,
    path_prefix: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<OperationLog>> {
    let rows = sqlx::query_as(
        "SELECT id, username, permission, method, path, query, body, status, outcome, ip, \
         user_agent, latency_ms, created_at \
         FROM sys_operation_log \
         WHERE ($1::TEXT IS NULL OR username = $1) \
           AND ($2::TEXT IS NULL OR path LIKE $2 || '%') \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(username)
    .bind(path_prefix)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete records older than the given timestamp, returning the count
pub async fn delete_before(pool: &PgPool, before_millis: i64) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM sys_operation_log WHERE created_at < $1")
        .bind(before_millis)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
