//! Permission snapshot cache
//!
//! Snapshots are cached per user with a TTL. Mutation endpoints call the
//! invalidation methods before responding, so a follow-up request never
//! sees the stale snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use shared::AppResult;

use super::resolver::{AuthUser, PermissionSnapshot, RbacSource, resolve_snapshot};

struct CacheEntry {
    snapshot: Arc<PermissionSnapshot>,
    cached_at: Instant,
}

/// Resolves and caches permission snapshots
pub struct PermissionService {
    source: Arc<dyn RbacSource>,
    cache: DashMap<i64, CacheEntry>,
    ttl: Duration,
}

impl PermissionService {
    pub fn new(source: Arc<dyn RbacSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Get the snapshot for a user, resolving on miss or expiry
    pub async fn snapshot(&self, user: &AuthUser) -> AppResult<Arc<PermissionSnapshot>> {
        if let Some(entry) = self.cache.get(&user.id) {
            if entry.cached_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.snapshot));
            }
        }

        let snapshot = resolve_snapshot(self.source.as_ref(), user).await?;
        self.cache.insert(
            user.id,
            CacheEntry {
                snapshot: Arc::clone(&snapshot),
                cached_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }

    /// Drop the cached snapshot of one user
    pub fn invalidate_user(&self, user_id: i64) {
        self.cache.remove(&user_id);
    }

    /// Drop the cached snapshots of a set of users (role membership changed)
    pub fn invalidate_users(&self, user_ids: &[i64]) {
        for id in user_ids {
            self.cache.remove(id);
        }
    }

    /// Drop every cached snapshot (department tree or menu changed)
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::ScopeMode;
    use crate::rbac::resolver::tests::{MemorySource, grant, user};
    use std::sync::atomic::Ordering;

    fn source_with_role() -> MemorySource {
        let mut source = MemorySource::new();
        source.roles.insert(7, vec![grant(1, ScopeMode::Own, &[])]);
        source.perms.insert(1, vec!["sys:user:list"]);
        source
    }

    #[tokio::test]
    async fn test_snapshot_is_cached() {
        let source = Arc::new(source_with_role());
        let svc = PermissionService::new(Arc::clone(&source) as Arc<dyn RbacSource>, Duration::from_secs(60));
        let u = user(7, Some(2), false);

        svc.snapshot(&u).await.unwrap();
        svc.snapshot(&u).await.unwrap();

        assert_eq!(source.role_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reresolved() {
        let source = Arc::new(source_with_role());
        let svc = PermissionService::new(Arc::clone(&source) as Arc<dyn RbacSource>, Duration::from_millis(0));
        let u = user(7, Some(2), false);

        svc.snapshot(&u).await.unwrap();
        svc.snapshot(&u).await.unwrap();

        assert_eq!(source.role_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_user_forces_reresolve() {
        let source = Arc::new(source_with_role());
        let svc = PermissionService::new(Arc::clone(&source) as Arc<dyn RbacSource>, Duration::from_secs(60));
        let u = user(7, Some(2), false);

        svc.snapshot(&u).await.unwrap();
        svc.invalidate_user(7);
        svc.snapshot(&u).await.unwrap();

        assert_eq!(source.role_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let source = Arc::new(source_with_role());
        let svc = PermissionService::new(Arc::clone(&source) as Arc<dyn RbacSource>, Duration::from_secs(60));
        let u = user(7, Some(2), false);

        svc.snapshot(&u).await.unwrap();
        svc.invalidate_all();
        svc.snapshot(&u).await.unwrap();

        assert_eq!(source.role_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_users_is_selective() {
        let source = Arc::new(source_with_role());
        let svc = PermissionService::new(Arc::clone(&source) as Arc<dyn RbacSource>, Duration::from_secs(60));
        let u = user(7, Some(2), false);

        svc.snapshot(&u).await.unwrap();
        svc.invalidate_users(&[8, 9]);
        svc.snapshot(&u).await.unwrap();

        // User 7 untouched, still served from cache
        assert_eq!(source.role_calls.load(Ordering::SeqCst), 1);
    }
}
