//! Session revocation store
//!
//! Revoked session ids are kept until the token they belong to would have
//! expired anyway, so the store stays bounded by the token lifetime.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use shared::AppResult;
use shared::util::now_millis;

/// Store of revoked session ids with per-entry TTL
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a session id as revoked for `ttl`
    async fn revoke(&self, session_id: &str, ttl: Duration) -> AppResult<()>;

    /// Check whether a session id has been revoked
    async fn is_revoked(&self, session_id: &str) -> AppResult<bool>;
}

/// In-process revocation store backed by a concurrent map
///
/// Expired entries are dropped lazily on lookup and eagerly by [`sweep`],
/// which the server runs on a timer.
///
/// [`sweep`]: MemoryRevocationStore::sweep
#[derive(Default)]
pub struct MemoryRevocationStore {
    /// session id -> expiry timestamp (millis)
    entries: DashMap<String, i64>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all expired entries
    pub fn sweep(&self) {
        let now = now_millis();
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, session_id: &str, ttl: Duration) -> AppResult<()> {
        let expires_at = now_millis() + ttl.as_millis() as i64;
        self.entries.insert(session_id.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> AppResult<bool> {
        // The shard read guard must end before remove() takes the write
        // lock on the same shard
        let live = self
            .entries
            .get(session_id)
            .map(|entry| *entry.value() > now_millis());

        match live {
            Some(true) => Ok(true),
            Some(false) => {
                self.entries.remove(session_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke_and_check() {
        let store = MemoryRevocationStore::new();
        store
            .revoke("sid-1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.is_revoked("sid-1").await.unwrap());
        assert!(!store.is_revoked("sid-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_revoked() {
        let store = MemoryRevocationStore::new();
        store
            .revoke("sid-1", Duration::from_millis(0))
            .await
            .unwrap();

        assert!(!store.is_revoked("sid-1").await.unwrap());
        // Lazy removal on lookup
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_store_usable_after_expired_lookup() {
        let store = MemoryRevocationStore::new();
        store
            .revoke("sid-1", Duration::from_millis(0))
            .await
            .unwrap();

        // The lookup that drops the lapsed entry must not wedge the shard
        assert!(!store.is_revoked("sid-1").await.unwrap());
        store
            .revoke("sid-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.is_revoked("sid-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_drops_expired() {
        let store = MemoryRevocationStore::new();
        store
            .revoke("old", Duration::from_millis(0))
            .await
            .unwrap();
        store
            .revoke("live", Duration::from_secs(60))
            .await
            .unwrap();

        store.sweep();
        assert_eq!(store.len(), 1);
        assert!(store.is_revoked("live").await.unwrap());
    }
}
