//! TTL cache backed by a `HashMap`.

use async_trait::async_trait;
use promptloom_core::error::SourceError;
use promptloom_core::source::ContextCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// An in-process [`ContextCache`]. Expired entries are purged on read.
#[derive(Default, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContextCache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: take the write lock and drop it unless it was refreshed meanwhile.
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
            tracing::debug!(key, "Evicted expired cache entry");
        }
        None
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), SourceError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| SourceError::Unavailable(format!("ttl {ttl:?} out of range")))?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let cache = InMemoryCache::new();
        cache
            .set("prefs:1", b"{}".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("prefs:1").await, Some(b"{}".to_vec()));
        assert_eq!(cache.get("prefs:2").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_purged() {
        let cache = InMemoryCache::new();
        cache.set("k", vec![1, 2, 3], Duration::ZERO).await.unwrap();
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("k", vec![1], ttl).await.unwrap();
        cache.set("k", vec![2], ttl).await.unwrap();
        assert_eq!(cache.get("k").await, Some(vec![2]));
    }
}
