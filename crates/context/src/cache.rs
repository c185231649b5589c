//! Preference memoization through an injected [`ContextCache`].

use async_trait::async_trait;
use promptloom_core::error::SourceError;
use promptloom_core::memory::UserPreferences;
use promptloom_core::source::{ContextCache, PreferenceSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Cache key for a user's preferences.
pub fn preferences_key(user_id: i32) -> String {
    format!("prefs:{user_id}")
}

/// A [`PreferenceSource`] that consults a cache before the wrapped source.
///
/// Only values returned by the wrapped source are cached. Cache failures
/// never surface: a bad entry is treated as a miss and a failed write is
/// logged.
pub struct CachedPreferenceSource<'a> {
    inner: &'a dyn PreferenceSource,
    cache: &'a dyn ContextCache,
    ttl: Duration,
    hits: &'a AtomicU64,
}

impl<'a> CachedPreferenceSource<'a> {
    /// Wrap `inner`. Every cache hit increments `hits`.
    pub fn new(
        inner: &'a dyn PreferenceSource,
        cache: &'a dyn ContextCache,
        ttl: Duration,
        hits: &'a AtomicU64,
    ) -> Self {
        Self {
            inner,
            cache,
            ttl,
            hits,
        }
    }
}

#[async_trait]
impl PreferenceSource for CachedPreferenceSource<'_> {
    async fn get_preferences(&self, user_id: i32) -> Result<UserPreferences, SourceError> {
        let key = preferences_key(user_id);

        if let Some(bytes) = self.cache.get(&key).await {
            match decode(&bytes) {
                Ok(prefs) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(user_id, "Preferences served from cache");
                    return Ok(prefs);
                }
                Err(e) => warn!(user_id, error = %e, "Discarding undecodable cached preferences"),
            }
        }

        let prefs = self.inner.get_preferences(user_id).await?;

        let stored = match encode(&prefs) {
            Ok(bytes) => self.cache.set(&key, bytes, self.ttl).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            warn!(user_id, error = %e, "Failed to cache preferences");
        }

        Ok(prefs)
    }
}

fn decode(bytes: &[u8]) -> Result<UserPreferences, SourceError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn encode(prefs: &UserPreferences) -> Result<Vec<u8>, SourceError> {
    Ok(serde_json::to_vec(prefs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_memory::{InMemoryCache, InMemoryPreferenceStore};

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let store = InMemoryPreferenceStore::new();
        store.set(1, UserPreferences::default()).await;
        let cache = InMemoryCache::new();
        let hits = AtomicU64::new(0);
        let cached = CachedPreferenceSource::new(&store, &cache, TTL, &hits);

        let first = cached.get_preferences(1).await.unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        // Change the store; the cached copy must still be served.
        store.set(1, UserPreferences::empty()).await;
        let second = cached.get_preferences(1).await.unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn undecodable_entry_is_a_serialization_error() {
        let err = decode(b"{\"timezone\": 42}").unwrap_err();
        assert!(matches!(err, SourceError::Serialization(_)));

        let bytes = encode(&UserPreferences::default()).unwrap();
        assert_eq!(decode(&bytes).unwrap(), UserPreferences::default());
    }

    #[tokio::test]
    async fn source_errors_are_not_cached() {
        let store = InMemoryPreferenceStore::new();
        let cache = InMemoryCache::new();
        let hits = AtomicU64::new(0);
        let cached = CachedPreferenceSource::new(&store, &cache, TTL, &hits);

        assert!(cached.get_preferences(7).await.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn corrupt_entry_falls_through_to_source() {
        let store = InMemoryPreferenceStore::new();
        store.set(1, UserPreferences::default()).await;
        let cache = InMemoryCache::new();
        cache.set(&preferences_key(1), b"garbage".to_vec(), TTL).await.unwrap();
        let hits = AtomicU64::new(0);
        let cached = CachedPreferenceSource::new(&store, &cache, TTL, &hits);

        let prefs = cached.get_preferences(1).await.unwrap();
        assert_eq!(prefs, UserPreferences::default());
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        // The fresh value replaced the corrupt entry.
        assert!(cached.get_preferences(1).await.is_ok());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
