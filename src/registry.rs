//! Content-addressed link registry with a collision-aware write path.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::store::{LinkRecord, LinkStore};
use crate::verify::{self, VerificationStatus};

/// Result of the pre-write admission check.
#[derive(Debug)]
pub enum Admission {
    /// The key already holds this exact URL; the caller returns the
    /// existing link instead of writing a duplicate.
    Existing(LinkRecord),
    /// The key is free and the registry has room.
    Vacant,
}

/// Read/write/delete operations over the remote store.
///
/// The registry holds no local cache of authoritative state. Writes to
/// the same key are protected only by the read-before-write protocol in
/// [`Registry::admit`], which is best effort, not linearizable; the
/// capacity and dedup checks each cost a full namespace read per write,
/// the dominant scaling limit of the whole service.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn LinkStore>,
    entries_limit: usize,
}

impl Registry {
    pub fn new(store: Arc<dyn LinkStore>, entries_limit: usize) -> Self {
        Self {
            store,
            entries_limit,
        }
    }

    /// Read-through lookup. Transport failures are treated as a miss by
    /// callers but stay distinguishable in the logs.
    pub async fn lookup(&self, key: &str) -> Option<LinkRecord> {
        match self.store.get(key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(key, error = %e, "lookup failed upstream, treating as absent");
                None
            }
        }
    }

    /// Checks whether a write for `key` may proceed.
    ///
    /// An occupied key with a matching URL is a dedup hit. An occupied
    /// key with a different URL is a hash-collision fault: overwriting
    /// would corrupt another user's link, so the write is rejected with
    /// a distinct error. A vacant key is then checked against the entry
    /// limit before anything is mutated.
    pub async fn admit(&self, key: &str, normalized_url: &str) -> Result<Admission, ApiError> {
        if let Some(existing) = self.lookup(key).await {
            if existing.long_url == normalized_url {
                return Ok(Admission::Existing(existing));
            }
            warn!(key, "short-key collision between distinct URLs");
            return Err(ApiError::Collision(key.to_string()));
        }

        match self.store.get_all().await {
            Ok(entries) if entries.len() >= self.entries_limit => Err(ApiError::Capacity),
            Ok(_) => Ok(Admission::Vacant),
            Err(e) => {
                // An unreadable namespace cannot prove the registry is
                // full; the write itself will still fail loudly if the
                // store is down.
                warn!(error = %e, "capacity check failed upstream, skipping");
                Ok(Admission::Vacant)
            }
        }
    }

    /// Persists a fresh, unverified record under `key`.
    pub async fn create(&self, key: &str, normalized_url: &str) -> Result<LinkRecord, ApiError> {
        let record = LinkRecord::new(normalized_url.to_string());
        let echoed = self.store.put(key, &record).await?;
        if echoed.long_url != record.long_url {
            return Err(ApiError::Upstream(format!(
                "store echoed a different record writing {}",
                key
            )));
        }
        info!(key, "link registered");
        Ok(echoed)
    }

    /// Idempotent delete; `true` only when a record existed and was
    /// removed.
    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        if self.lookup(key).await.is_none() {
            return Ok(false);
        }
        self.store.delete(key).await?;
        info!(key, "link deleted");
        Ok(true)
    }

    /// Full key-to-record dump for the admin listing.
    pub async fn dump(&self) -> Result<HashMap<String, LinkRecord>, ApiError> {
        self.store.get_all().await
    }

    /// Runs the verification state machine against the stored record.
    pub async fn verify(&self, key: &str) -> VerificationStatus {
        verify::verify(self.store.as_ref(), key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLinkStore;
    use async_trait::async_trait;

    fn registry_with(store: Arc<MemoryLinkStore>, limit: usize) -> Registry {
        Registry::new(store, limit)
    }

    /// Store whose writes never land, as during an upstream outage.
    struct UnreachableLinkStore;

    #[async_trait]
    impl LinkStore for UnreachableLinkStore {
        async fn get(&self, _key: &str) -> Result<Option<LinkRecord>, ApiError> {
            Ok(None)
        }

        async fn get_all(&self) -> Result<HashMap<String, LinkRecord>, ApiError> {
            Ok(HashMap::new())
        }

        async fn put(&self, _key: &str, _record: &LinkRecord) -> Result<LinkRecord, ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }

        async fn set_verified(&self, _key: &str) -> Result<(), ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_admit_vacant_then_dedup() {
        let store = Arc::new(MemoryLinkStore::new());
        let registry = registry_with(store.clone(), 50);

        let admission = registry.admit("aaaaa11111", "https://example.com/").await;
        assert!(matches!(admission, Ok(Admission::Vacant)));

        registry
            .create("aaaaa11111", "https://example.com/")
            .await
            .unwrap();

        let admission = registry.admit("aaaaa11111", "https://example.com/").await;
        match admission {
            Ok(Admission::Existing(record)) => {
                assert_eq!(record.long_url, "https://example.com/");
            }
            other => panic!("expected dedup hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_collision_is_rejected_not_overwritten() {
        let store = Arc::new(MemoryLinkStore::new());
        let registry = registry_with(store.clone(), 50);

        registry
            .create("shared12345", "https://a.example.com/")
            .await
            .unwrap();

        let admission = registry
            .admit("shared12345", "https://b.example.com/")
            .await;
        assert!(matches!(admission, Err(ApiError::Collision(_))));

        // The first writer's record must be untouched.
        let record = registry.lookup("shared12345").await.unwrap();
        assert_eq!(record.long_url, "https://a.example.com/");
    }

    #[tokio::test]
    async fn test_capacity_blocks_before_mutation() {
        let store = Arc::new(MemoryLinkStore::new());
        let registry = registry_with(store.clone(), 2);

        registry.create("key0000001", "https://a.example.com/").await.unwrap();
        registry.create("key0000002", "https://b.example.com/").await.unwrap();

        let admission = registry.admit("key0000003", "https://c.example.com/").await;
        assert!(matches!(admission, Err(ApiError::Capacity)));
        assert_eq!(store.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_surfaces_as_upstream_error() {
        let registry = Registry::new(Arc::new(UnreachableLinkStore), 50);

        let result = registry.create("key0000001", "https://a.example.com/").await;
        assert!(matches!(result, Err(ApiError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_prior_existence() {
        let store = Arc::new(MemoryLinkStore::new());
        let registry = registry_with(store, 50);

        registry.create("gone000001", "https://a.example.com/").await.unwrap();
        assert!(registry.delete("gone000001").await.unwrap());
        assert!(!registry.delete("gone000001").await.unwrap());
    }
}
