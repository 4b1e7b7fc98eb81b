//! Permission snapshot resolution
//!
//! Builds a [`PermissionSnapshot`] for a user: the union of menu
//! permissions across all active roles, plus the combined data scope.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use shared::AppResult;

use super::scope::{DataScope, ScopeMode};

/// User fields needed for authentication and scope resolution
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub dept_id: Option<i64>,
    pub superuser: bool,
    pub enabled: bool,
    /// Millis timestamp of the last password change; tokens issued
    /// before it are rejected
    pub password_changed_at: i64,
}

/// A role assignment with its data scope configuration
#[derive(Debug, Clone)]
pub struct RoleGrant {
    pub role_id: i64,
    pub scope_mode: ScopeMode,
    /// Populated only for [`ScopeMode::Custom`]
    pub custom_dept_ids: Vec<i64>,
}

/// A department tree node
#[derive(Debug, Clone)]
pub struct DeptNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub enabled: bool,
}

/// Source of RBAC data, backed by the database in production
#[async_trait]
pub trait RbacSource: Send + Sync {
    /// Role assignments of a user, restricted to enabled roles
    async fn active_roles(&self, user_id: i64) -> AppResult<Vec<RoleGrant>>;

    /// Permission identifiers granted by a set of roles, via enabled menus
    async fn role_permissions(&self, role_ids: &[i64]) -> AppResult<HashSet<String>>;

    /// The full department tree
    async fn departments(&self) -> AppResult<Vec<DeptNode>>;
}

/// Resolved permissions and data scope for one user
#[derive(Debug, Clone)]
pub struct PermissionSnapshot {
    pub permissions: HashSet<String>,
    pub scope: DataScope,
    pub role_ids: Vec<i64>,
    pub superuser: bool,
}

impl PermissionSnapshot {
    /// Superusers hold every permission implicitly
    pub fn has_permission(&self, permission: &str) -> bool {
        self.superuser || self.permissions.contains(permission)
    }
}

/// Resolve a fresh snapshot for a user
pub async fn resolve_snapshot(
    source: &dyn RbacSource,
    user: &AuthUser,
) -> AppResult<Arc<PermissionSnapshot>> {
    if user.superuser {
        return Ok(Arc::new(PermissionSnapshot {
            permissions: HashSet::new(),
            scope: DataScope::All,
            role_ids: Vec::new(),
            superuser: true,
        }));
    }

    let roles = source.active_roles(user.id).await?;
    let role_ids: Vec<i64> = roles.iter().map(|r| r.role_id).collect();

    let permissions = if role_ids.is_empty() {
        HashSet::new()
    } else {
        source.role_permissions(&role_ids).await?
    };

    let scope = combine_scopes(source, user, &roles).await?;

    Ok(Arc::new(PermissionSnapshot {
        permissions,
        scope,
        role_ids,
        superuser: false,
    }))
}

/// Combine per-role scope modes into one effective scope
///
/// Any role with `All` short-circuits to unrestricted. Otherwise the
/// department grants of every role union together, and a user whose roles
/// grant no department at all falls back to self-only.
async fn combine_scopes(
    source: &dyn RbacSource,
    user: &AuthUser,
    roles: &[RoleGrant],
) -> AppResult<DataScope> {
    if roles.iter().any(|r| r.scope_mode == ScopeMode::All) {
        return Ok(DataScope::All);
    }

    let mut depts: BTreeSet<i64> = BTreeSet::new();
    let mut subtree: Option<BTreeSet<i64>> = None;

    for role in roles {
        match role.scope_mode {
            ScopeMode::All => unreachable!("handled above"),
            ScopeMode::SelfOnly => {}
            ScopeMode::Custom => depts.extend(role.custom_dept_ids.iter().copied()),
            ScopeMode::Own => {
                if let Some(d) = user.dept_id {
                    depts.insert(d);
                }
            }
            ScopeMode::OwnAndBelow => {
                if let Some(d) = user.dept_id {
                    if subtree.is_none() {
                        subtree = Some(dept_subtree(&source.departments().await?, d));
                    }
                    if let Some(ref s) = subtree {
                        depts.extend(s.iter().copied());
                    }
                }
            }
        }
    }

    if depts.is_empty() {
        Ok(DataScope::SelfOnly)
    } else {
        Ok(DataScope::Depts(depts))
    }
}

/// Ids of a department and all its enabled descendants
fn dept_subtree(tree: &[DeptNode], root: i64) -> BTreeSet<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for node in tree.iter().filter(|n| n.enabled) {
        if let Some(parent) = node.parent_id {
            children.entry(parent).or_default().push(node.id);
        }
    }

    let mut result = BTreeSet::from([root]);
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(kids) = children.get(&id) {
            for &kid in kids {
                if result.insert(kid) {
                    stack.push(kid);
                }
            }
        }
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source with call counters for cache tests
    pub struct MemorySource {
        pub roles: HashMap<i64, Vec<RoleGrant>>,
        pub perms: HashMap<i64, Vec<&'static str>>,
        pub depts: Vec<DeptNode>,
        pub role_calls: AtomicUsize,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self {
                roles: HashMap::new(),
                perms: HashMap::new(),
                // 1 <- 2 <- 3, 1 <- 4, 5 disabled child of 1
                depts: vec![
                    dept(1, None, true),
                    dept(2, Some(1), true),
                    dept(3, Some(2), true),
                    dept(4, Some(1), true),
                    dept(5, Some(1), false),
                ],
                role_calls: AtomicUsize::new(0),
            }
        }
    }

    pub fn dept(id: i64, parent_id: Option<i64>, enabled: bool) -> DeptNode {
        DeptNode {
            id,
            parent_id,
            enabled,
        }
    }

    pub fn grant(role_id: i64, scope_mode: ScopeMode, custom: &[i64]) -> RoleGrant {
        RoleGrant {
            role_id,
            scope_mode,
            custom_dept_ids: custom.to_vec(),
        }
    }

    pub fn user(id: i64, dept_id: Option<i64>, superuser: bool) -> AuthUser {
        AuthUser {
            id,
            username: format!("user{id}"),
            dept_id,
            superuser,
            enabled: true,
            password_changed_at: 0,
        }
    }

    #[async_trait]
    impl RbacSource for MemorySource {
        async fn active_roles(&self, user_id: i64) -> AppResult<Vec<RoleGrant>> {
            self.role_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.roles.get(&user_id).cloned().unwrap_or_default())
        }

        async fn role_permissions(&self, role_ids: &[i64]) -> AppResult<HashSet<String>> {
            let mut out = HashSet::new();
            for id in role_ids {
                if let Some(perms) = self.perms.get(id) {
                    out.extend(perms.iter().map(|p| p.to_string()));
                }
            }
            Ok(out)
        }

        async fn departments(&self) -> AppResult<Vec<DeptNode>> {
            Ok(self.depts.clone())
        }
    }

    #[tokio::test]
    async fn test_permissions_union_across_roles() {
        let mut source = MemorySource::new();
        source.roles.insert(
            7,
            vec![
                grant(1, ScopeMode::SelfOnly, &[]),
                grant(2, ScopeMode::SelfOnly, &[]),
            ],
        );
        source.perms.insert(1, vec!["sys:user:list", "sys:user:create"]);
        source.perms.insert(2, vec!["sys:user:list", "sys:role:list"]);

        let snap = resolve_snapshot(&source, &user(7, Some(2), false))
            .await
            .unwrap();

        assert_eq!(snap.permissions.len(), 3);
        assert!(snap.has_permission("sys:user:create"));
        assert!(snap.has_permission("sys:role:list"));
        assert!(!snap.has_permission("sys:role:delete"));
    }

    #[tokio::test]
    async fn test_superuser_skips_role_lookup() {
        let source = MemorySource::new();
        let snap = resolve_snapshot(&source, &user(1, None, true)).await.unwrap();

        assert!(snap.superuser);
        assert!(snap.has_permission("anything:at:all"));
        assert_eq!(snap.scope, DataScope::All);
        assert_eq!(source.role_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_any_all_scope_wins() {
        let mut source = MemorySource::new();
        source.roles.insert(
            7,
            vec![
                grant(1, ScopeMode::SelfOnly, &[]),
                grant(2, ScopeMode::All, &[]),
            ],
        );

        let snap = resolve_snapshot(&source, &user(7, Some(2), false))
            .await
            .unwrap();
        assert_eq!(snap.scope, DataScope::All);
    }

    #[tokio::test]
    async fn test_own_and_below_expands_subtree() {
        let mut source = MemorySource::new();
        source
            .roles
            .insert(7, vec![grant(1, ScopeMode::OwnAndBelow, &[])]);

        let snap = resolve_snapshot(&source, &user(7, Some(1), false))
            .await
            .unwrap();

        // Disabled dept 5 is excluded from the subtree
        assert_eq!(snap.scope, DataScope::Depts(BTreeSet::from([1, 2, 3, 4])));
    }

    #[tokio::test]
    async fn test_own_and_below_excludes_ancestors_and_siblings() {
        let mut source = MemorySource::new();
        source
            .roles
            .insert(7, vec![grant(1, ScopeMode::OwnAndBelow, &[])]);

        // Rooted at dept 2: parent 1 and sibling 4 stay out
        let snap = resolve_snapshot(&source, &user(7, Some(2), false))
            .await
            .unwrap();
        assert_eq!(snap.scope, DataScope::Depts(BTreeSet::from([2, 3])));
    }

    #[tokio::test]
    async fn test_finite_scopes_union() {
        let mut source = MemorySource::new();
        source.roles.insert(
            7,
            vec![
                grant(1, ScopeMode::Own, &[]),
                grant(2, ScopeMode::Custom, &[40, 41]),
            ],
        );

        let snap = resolve_snapshot(&source, &user(7, Some(2), false))
            .await
            .unwrap();
        assert_eq!(snap.scope, DataScope::Depts(BTreeSet::from([2, 40, 41])));
    }

    #[tokio::test]
    async fn test_no_roles_falls_back_to_self_only() {
        let source = MemorySource::new();
        let snap = resolve_snapshot(&source, &user(7, Some(2), false))
            .await
            .unwrap();

        assert_eq!(snap.scope, DataScope::SelfOnly);
        assert!(snap.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_own_scope_without_dept_is_self_only() {
        let mut source = MemorySource::new();
        source.roles.insert(7, vec![grant(1, ScopeMode::Own, &[])]);

        let snap = resolve_snapshot(&source, &user(7, None, false))
            .await
            .unwrap();
        assert_eq!(snap.scope, DataScope::SelfOnly);
    }
}
