//! Menu table operations
//!
//! Menus double as the permission catalog: a menu row of kind `action`
//! carries the permission identifier its grants confer.

use shared::AppResult;
use shared::util::now_millis;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct Menu {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    /// "dir" | "page" | "action"
    pub kind: String,
    /// Permission identifier such as `sys:user:list`, set on actions
    pub permission: Option<String>,
    pub sort_order: i32,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> AppResult<Option<Menu>> {
    let row = sqlx::query_as(
        "SELECT id, name, parent_id, kind, permission, sort_order, enabled, \
         created_at, updated_at FROM sys_menu WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &PgPool) -> AppResult<Vec<Menu>> {
    let rows = sqlx::query_as(
        "SELECT id, name, parent_id, kind, permission, sort_order, enabled, \
         created_at, updated_at FROM sys_menu ORDER BY sort_order, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    parent_id: Option<i64>,
    kind: &str,
    permission: Option<&str>,
    sort_order: i32,
    enabled: bool,
) -> AppResult<i64> {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sys_menu (name, parent_id, kind, permission, sort_order, enabled, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING id",
    )
    .bind(name)
    .bind(parent_id)
    .bind(kind)
    .bind(permission)
    .bind(sort_order)
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
    permission: Option<&str>,
    sort_order: i32,
    enabled: bool,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE sys_menu SET name = $2, permission = $3, sort_order = $4, enabled = $5, \
         updated_at = $6 WHERE id = $1",
    )
    .bind(id)
    .bind(name)
    .bind(permission)
    .bind(sort_order)
    .bind(enabled)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sys_menu WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn has_children(pool: &PgPool, id: i64) -> AppResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sys_menu WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}
