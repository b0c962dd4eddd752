//! In-memory mock implementation of CorrelationStore for testing without NATS.

use super::mapping_key;
use super::traits::CorrelationStore;
use crate::envelope::RequesterId;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-memory correlation store.
///
/// Deadlines use `tokio::time::Instant`, so tests running with a paused clock
/// can step over a TTL with `tokio::time::advance`. Failures can be switched
/// on per operation to exercise the error paths.
pub struct MockCorrelationStore {
    entries: RwLock<HashMap<String, (RequesterId, Instant)>>,
    fail_sets: AtomicBool,
    fail_gets: AtomicBool,
    deletes: AtomicUsize,
}

impl MockCorrelationStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fail_sets: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Whether a live (unexpired) entry exists for `request_id`
    pub async fn contains(&self, request_id: &str) -> bool {
        let Some(key) = mapping_key(request_id) else {
            return false;
        };
        self.entries
            .read()
            .await
            .get(&key)
            .is_some_and(|(_, deadline)| Instant::now() < *deadline)
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Number of `delete` calls seen, whether or not the key existed
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorrelationStore for MockCorrelationStore {
    async fn set(&self, request_id: &str, requester: RequesterId, ttl: Duration) -> Result<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(anyhow!("mock store: set refused"));
        }
        let key = mapping_key(request_id)
            .ok_or_else(|| anyhow!("request id {:?} is not a valid store key", request_id))?;
        self.entries
            .write()
            .await
            .insert(key, (requester, Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<RequesterId>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(anyhow!("mock store: get refused"));
        }
        let Some(key) = mapping_key(request_id) else {
            return Ok(None);
        };
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some((requester, deadline)) if Instant::now() < *deadline => Ok(Some(*requester)),
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, request_id: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if let Some(key) = mapping_key(request_id) {
            self.entries.write().await.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MockCorrelationStore::new();
        store
            .set("r1", RequesterId(42), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(store.get("r1").await.unwrap(), Some(RequesterId(42)));
        assert!(store.contains("r1").await);

        store.delete("r1").await.unwrap();
        assert_eq!(store.get("r1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MockCorrelationStore::new();
        store.delete("never-set").await.unwrap();
        store.delete("never-set").await.unwrap();
        assert_eq!(store.delete_calls(), 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MockCorrelationStore::new();
        store
            .set("r1", RequesterId(42), Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(store.get("r1").await.unwrap(), Some(RequesterId(42)));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(store.get("r1").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_key_is_never_found() {
        let store = MockCorrelationStore::new();
        assert!(store
            .set("bad key", RequesterId(1), Duration::from_secs(5))
            .await
            .is_err());
        assert_eq!(store.get("bad key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let store = MockCorrelationStore::new();
        store.fail_sets(true);
        assert!(store
            .set("r1", RequesterId(1), Duration::from_secs(5))
            .await
            .is_err());

        store.fail_gets(true);
        assert!(store.get("r1").await.is_err());
    }
}
