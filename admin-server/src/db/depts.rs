//! Department table operations

use shared::AppResult;
use shared::util::now_millis;
use sqlx::PgPool;

use crate::rbac::DeptNode;

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct Dept {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub sort_order: i32,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> AppResult<Option<Dept>> {
    let row = sqlx::query_as(
        "SELECT id, name, parent_id, sort_order, enabled, created_at, updated_at \
         FROM sys_dept WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &PgPool) -> AppResult<Vec<Dept>> {
    let rows = sqlx::query_as(
        "SELECT id, name, parent_id, sort_order, enabled, created_at, updated_at \
         FROM sys_dept ORDER BY sort_order, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The full tree in the shape the scope resolver needs
pub async fn tree(pool: &PgPool) -> AppResult<Vec<DeptNode>> {
    let rows: Vec<(i64, Option<i64>, bool)> =
        sqlx::query_as("SELECT id, parent_id, enabled FROM sys_dept")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .into_iter()
        .map(|(id, parent_id, enabled)| DeptNode {
            id,
            parent_id,
            enabled,
        })
        .collect())
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    parent_id: Option<i64>,
    sort_order: i32,
    enabled: bool,
) -> AppResult<i64> {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sys_dept (name, parent_id, sort_order, enabled, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) RETURNING id",
    )
    .bind(name)
    .bind(parent_id)
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
    parent_id: Option<i64>,
    sort_order: i32,
    enabled: bool,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE sys_dept SET name = $2, parent_id = $3, sort_order = $4, enabled = $5, \
         updated_at = $6 WHERE id = $1",
    )
    .bind(id)
    .bind(name)
    .bind(parent_id)
    .bind(sort_order)
    .bind(enabled)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sys_dept WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn has_children(pool: &PgPool, id: i64) -> AppResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sys_dept WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}
