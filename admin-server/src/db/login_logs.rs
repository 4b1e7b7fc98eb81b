//! Login log table operations

use shared::AppResult;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct LoginLog {
    pub id: i64,
    pub username: String,
    pub success: bool,
    pub ip: String,
    pub region: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub message: Option<String>,
    pub created_at: i64,
}

pub struct NewLoginLog<'a> {
    pub username: &'a str,
    pub success: bool,
    pub ip: &'a str,
    pub region: Option<&'a str>,
    pub browser: Option<&'a str>,
    pub os: Option<&'a str>,
    pub message: Option<&'a str>,
    pub created_at: i64,
}

pub async fn insert(pool: &PgPool, entry: NewLoginLog<'_>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO sys_login_log \
         (username, success, ip, region, browser, os, message, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(entry.username)
    .bind(entry.success)
    .bind(entry.ip)
    .bind(entry.region)
    .bind(entry.browser)
    .bind(entry.os)
    .bind(entry.message)
    .bind(entry.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn query(
    pool: &PgPool,
    username: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<LoginLog>> {
    let rows = sqlx::query_as(
        "SELECT id, username, success, ip, region, browser, os, message, created_at \
         FROM sys_login_log \
         WHERE ($1::TEXT IS NULL OR username = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(username)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete records older than the given timestamp, returning the count
pub async fn delete_before(pool: &PgPool, before_millis: i64) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM sys_login_log WHERE created_at < $1")
        .bind(before_millis)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
