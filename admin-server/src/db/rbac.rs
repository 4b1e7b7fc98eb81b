//! Database-backed RBAC source

use std::collections::HashSet;

use async_trait::async_trait;
use shared::AppResult;
use sqlx::PgPool;

use crate::rbac::{DeptNode, RbacSource, RoleGrant, ScopeMode};

use super::depts;

/// [`RbacSource`] reading from PostgreSQL
pub struct PgRbacSource {
    pool: PgPool,
}

impl PgRbacSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RbacSource for PgRbacSource {
    async fn active_roles(&self, user_id: i64) -> AppResult<Vec<RoleGrant>> {
        let rows: Vec<(i64, i16)> = sqlx::query_as(
            "SELECT r.id, r.scope_mode FROM sys_role r \
             JOIN sys_user_role ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 AND r.enabled",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grants = Vec::with_capacity(rows.len());
        for (role_id, raw_mode) in rows {
            // Unknown modes are treated as the narrowest scope
            let scope_mode = ScopeMode::from_db(raw_mode).unwrap_or(ScopeMode::SelfOnly);

            let custom_dept_ids = if scope_mode == ScopeMode::Custom {
                let ids: Vec<(i64,)> =
                    sqlx::query_as("SELECT dept_id FROM sys_role_dept WHERE role_id = $1")
                        .bind(role_id)
                        .fetch_all(&self.pool)
                        .await?;
                ids.into_iter().map(|(id,)| id).collect()
            } else {
                Vec::new()
            };

            grants.push(RoleGrant {
                role_id,
                scope_mode,
                custom_dept_ids,
            });
        }
        Ok(grants)
    }

    async fn role_permissions(&self, role_ids: &[i64]) -> AppResult<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT m.permission FROM sys_menu m \
             JOIN sys_role_menu rm ON rm.menu_id = m.id \
             WHERE rm.role_id = ANY($1) AND m.enabled AND m.permission IS NOT NULL",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    async fn departments(&self) -> AppResult<Vec<DeptNode>> {
        depts::tree(&self.pool).await
    }
}
