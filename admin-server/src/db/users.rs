//! User table operations

use shared::AppResult;
use shared::util::now_millis;
use sqlx::PgPool;

use crate::rbac::{AuthUser, DataScope};

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub dept_id: Option<i64>,
    pub superuser: bool,
    pub enabled: bool,
    pub created_by: Option<i64>,
    pub last_active_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct AuthRow {
    id: i64,
    username: String,
    dept_id: Option<i64>,
    superuser: bool,
    enabled: bool,
    password_changed_at: i64,
}

/// Fetch the fields needed by the auth middleware
///
/// Always reads the live row so that disabling a user takes effect on
/// their very next request.
pub async fn find_auth(pool: &PgPool, user_id: i64) -> AppResult<Option<AuthUser>> {
    let row: Option<AuthRow> = sqlx::query_as(
        "SELECT id, username, dept_id, superuser, enabled, password_changed_at \
         FROM sys_user WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| AuthUser {
        id: r.id,
        username: r.username,
        dept_id: r.dept_id,
        superuser: r.superuser,
        enabled: r.enabled,
        password_changed_at: r.password_changed_at,
    }))
}

#[derive(Debug, sqlx::FromRow)]
pub struct Credentials {
    pub id: i64,
    pub password_hash: String,
    pub enabled: bool,
}

pub async fn find_credentials(pool: &PgPool, username: &str) -> AppResult<Option<Credentials>> {
    let row = sqlx::query_as(
        "SELECT id, password_hash, enabled FROM sys_user WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> AppResult<Option<User>> {
    let row = sqlx::query_as(
        "SELECT id, username, nickname, dept_id, superuser, enabled, created_by, \
         last_active_at, created_at, updated_at \
         FROM sys_user WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List users visible under the viewer's data scope (paginated)
pub async fn list(
    pool: &PgPool,
    scope: &DataScope,
    viewer_id: i64,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<User>> {
    const COLS: &str = "id, username, nickname, dept_id, superuser, enabled, created_by, \
                        last_active_at, created_at, updated_at";

    let rows = match scope {
        DataScope::All => {
            sqlx::query_as(&format!(
                "SELECT {COLS} FROM sys_user ORDER BY id LIMIT $1 OFFSET $2"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        DataScope::Depts(depts) => {
            let dept_ids: Vec<i64> = depts.iter().copied().collect();
            sqlx::query_as(&format!(
                "SELECT {COLS} FROM sys_user WHERE dept_id = ANY($1) \
                 ORDER BY id LIMIT $2 OFFSET $3"
            ))
            .bind(dept_ids)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        DataScope::SelfOnly => {
            sqlx::query_as(&format!("SELECT {COLS} FROM sys_user WHERE id = $1"))
                .bind(viewer_id)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub nickname: Option<&'a str>,
    pub password_hash: &'a str,
    pub dept_id: Option<i64>,
    pub enabled: bool,
    pub created_by: i64,
}

pub async fn create(pool: &PgPool, user: NewUser<'_>) -> AppResult<i64> {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sys_user (username, nickname, password_hash, dept_id, superuser, enabled, \
         created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7, $7) RETURNING id",
    )
    .bind(user.username)
    .bind(user.nickname)
    .bind(user.password_hash)
    .bind(user.dept_id)
    .bind(user.enabled)
    .bind(user.created_by)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    nickname: Option<&str>,
    dept_id: Option<i64>,
    enabled: bool,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE sys_user SET nickname = $2, dept_id = $3, enabled = $4, updated_at = $5 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(nickname)
    .bind(dept_id)
    .bind(enabled)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the password hash and stamp the change, which invalidates
/// every token issued before it
pub async fn set_password(pool: &PgPool, id: i64, password_hash: &str) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE sys_user SET password_hash = $2, password_changed_at = $3, updated_at = $3 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(password_hash)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sys_user WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn username_taken(pool: &PgPool, username: &str) -> AppResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sys_user WHERE username = $1)")
            .bind(username)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

pub async fn dept_in_use(pool: &PgPool, dept_id: i64) -> AppResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sys_user WHERE dept_id = $1)")
            .bind(dept_id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Replace a user's role assignments
pub async fn set_roles(pool: &PgPool, user_id: i64, role_ids: &[i64]) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sys_user_role WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for role_id in role_ids {
        sqlx::query("INSERT INTO sys_user_role (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Best-effort activity timestamp bump, errors are ignored by callers
pub async fn touch_last_active(pool: &PgPool, user_id: i64) -> AppResult<()> {
    sqlx::query("UPDATE sys_user SET last_active_at = $2 WHERE id = $1")
        .bind(user_id)
        .bind(now_millis())
        .execute(pool)
        .await?;
    Ok(())
}
