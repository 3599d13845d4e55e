use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CacheBackend, CacheError};

/// In-process cache with per-key expiry.
///
/// Suitable for a single instance only: entries are not shared between
/// processes and are lost on restart.
#[derive(Default)]
pub struct MemoryCache {
    closed: AtomicBool,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Unavailable("cache shut down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn connect(&self) -> Result<(), CacheError> {
        self.ensure_open()
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        self.ensure_open()?;
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl_seconds))
            .ok_or_else(|| CacheError::Command(format!("ttl out of range: {ttl_seconds}s")))?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_open()?;
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.entries.lock().clear();
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "true", 60).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("true"));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_hidden_and_purged() {
        let cache = MemoryCache::new();
        cache.set_ex("gone", "true", 0).await.unwrap();
        cache.set_ex("kept", "true", 60).await.unwrap();

        assert_eq!(cache.get("gone").await.unwrap(), None);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("kept").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let cache = MemoryCache::new();

        assert!(matches!(
            cache.set_ex("k", "true", u64::MAX).await,
            Err(CacheError::Command(_))
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "true", 60).await.unwrap();
        cache.shutdown().await;

        assert!(cache.is_empty());
        assert!(matches!(cache.connect().await, Err(CacheError::Unavailable(_))));
        assert!(matches!(cache.get("k").await, Err(CacheError::Unavailable(_))));
    }
}
