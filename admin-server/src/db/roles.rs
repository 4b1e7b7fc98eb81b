//! Role table operations

use shared::AppResult;
use shared::util::now_millis;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub remark: Option<String>,
    /// Data scope mode, see [`crate::rbac::ScopeMode`]
    pub scope_mode: i16,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> AppResult<Option<Role>> {
    let row = sqlx::query_as(
        "SELECT id, name, remark, scope_mode, enabled, created_at, updated_at \
         FROM sys_role WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &PgPool) -> AppResult<Vec<Role>> {
    let rows = sqlx::query_as(
        "SELECT id, name, remark, scope_mode, enabled, created_at, updated_at \
         FROM sys_role ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    remark: Option<&str>,
    scope_mode: i16,
    enabled: bool,
) -> AppResult<i64> {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sys_role (name, remark, scope_mode, enabled, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) RETURNING id",
    )
    .bind(name)
    .bind(remark)
    .bind(scope_mode)
    .bind(enabled)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    name: &str,
    remark: Option<&str>,
    scope_mode: i16,
    enabled: bool,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE sys_role SET name = $2, remark = $3, scope_mode = $4, enabled = $5, \
         updated_at = $6 WHERE id = $1",
    )
    .bind(id)
    .bind(name)
    .bind(remark)
    .bind(scope_mode)
    .bind(enabled)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sys_role WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn name_taken(pool: &PgPool, name: &str, exclude_id: Option<i64>) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM sys_role WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn in_use(pool: &PgPool, role_id: i64) -> AppResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sys_user_role WHERE role_id = $1)")
            .bind(role_id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Ids of all users holding a role (for cache invalidation)
pub async fn user_ids(pool: &PgPool, role_id: i64) -> AppResult<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT user_id FROM sys_user_role WHERE role_id = $1")
            .bind(role_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Replace a role's menu grants
pub async fn set_menus(pool: &PgPool, role_id: i64, menu_ids: &[i64]) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sys_role_menu WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
    for menu_id in menu_ids {
        sqlx::query("INSERT INTO sys_role_menu (role_id, menu_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(menu_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Replace a role's custom data scope departments
pub async fn set_scope_depts(pool: &PgPool, role_id: i64, dept_ids: &[i64]) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sys_role_dept WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
    for dept_id in dept_ids {
        sqlx::query("INSERT INTO sys_role_dept (role_id, dept_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(dept_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn menu_ids(pool: &PgPool, role_id: i64) -> AppResult<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT menu_id FROM sys_role_menu WHERE role_id = $1 ORDER BY menu_id")
            .bind(role_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
