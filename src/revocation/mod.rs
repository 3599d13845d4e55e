//! Revocation store
//!
//! Records "this credential is revoked" in a best-effort cache until the
//! credential's natural expiry. The store never fails its caller because the
//! cache is unreachable: writes report `false`, reads fall back to the
//! configured [`FailPolicy`], and both log a warning.

mod memory;
mod redis_cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CacheBackendKind, CacheConfig, FailPolicy};
use crate::tokens::revocation_key;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

/// TTL written when a credential is already expired at logout time
pub const MIN_REVOCATION_TTL_SECS: u64 = 60;

/// Backoff between the first attempt and the single retry of a cache call
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
    #[error("Cache operation timed out")]
    Timeout,
    #[error("Cache command failed: {0}")]
    Command(String),
}

/// A key-value cache with per-key expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Establish the connection if needed. Must be cheap once connected.
    async fn connect(&self) -> Result<(), CacheError>;

    /// Store `value` under `key` for `ttl_seconds`.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Release the connection. Later calls report unavailable.
    async fn shutdown(&self);

    /// Drop expired entries, for backends without native expiry. Returns the number removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Available,
    Disabled,
    Unavailable,
}

impl StoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Available => "available",
            StoreStatus::Disabled => "disabled",
            StoreStatus::Unavailable => "unavailable",
        }
    }
}

/// TTL for a revocation entry of a credential expiring at `expires_at`.
///
/// The remaining lifetime, or [`MIN_REVOCATION_TTL_SECS`] when the credential
/// is already expired, so a token expiring between receipt and write still
/// gets an entry.
pub fn revocation_ttl(expires_at: i64, now: i64) -> u64 {
    let remaining = expires_at - now;
    if remaining <= 0 {
        MIN_REVOCATION_TTL_SECS
    } else {
        remaining as u64
    }
}

#[derive(Clone)]
pub struct RevocationStore {
    backend: Option<Arc<dyn CacheBackend>>,
    op_timeout: Duration,
    policy: FailPolicy,
}

impl std::fmt::Debug for RevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationStore")
            .field("enabled", &self.backend.is_some())
            .field("op_timeout", &self.op_timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RevocationStore {
    pub fn new(backend: Arc<dyn CacheBackend>, policy: FailPolicy, op_timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            op_timeout,
            policy,
        }
    }

    /// A store that skips every operation.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            op_timeout: Duration::ZERO,
            policy: FailPolicy::FailOpen,
        }
    }

    /// Build the store described by the cache configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            tracing::info!("Revocation store disabled; logout will not invalidate tokens");
            return Self::disabled();
        }

        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisCache::new(config)),
            CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
        };
        Self::new(backend, config.policy, config.op_timeout())
    }

    pub fn backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.backend.as_ref()
    }

    /// Establish the cache connection ahead of the first request.
    pub async fn connect(&self) -> StoreStatus {
        let Some(backend) = &self.backend else {
            return StoreStatus::Disabled;
        };
        match tokio::time::timeout(self.op_timeout, backend.connect()).await {
            Ok(Ok(())) => StoreStatus::Available,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Revocation store unavailable; continuing without it");
                StoreStatus::Unavailable
            }
            Err(_) => {
                tracing::warn!("Revocation store connect timed out; continuing without it");
                StoreStatus::Unavailable
            }
        }
    }

    /// Current reachability, for health reporting.
    pub async fn status(&self) -> StoreStatus {
        self.connect().await
    }

    /// Mark `token` revoked for `ttl_seconds`. Returns whether the write reached the cache.
    pub async fn put(&self, token: &str, ttl_seconds: u64) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        let key = revocation_key(token);

        match self
            .with_retry(|| backend.set_ex(&key, "true", ttl_seconds))
            .await
        {
            Ok(()) => {
                tracing::debug!(ttl_seconds, "Revocation entry written");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write revocation entry");
                false
            }
        }
    }

    /// Look up whether `token` is revoked.
    ///
    /// Transport failures resolve through the fail policy: `Absent` under
    /// fail-open, `Present` under fail-closed.
    pub async fn get(&self, token: &str) -> RevocationStatus {
        let Some(backend) = &self.backend else {
            return RevocationStatus::Absent;
        };
        let key = revocation_key(token);

        match self.with_retry(|| backend.get(&key)).await {
            Ok(Some(_)) => RevocationStatus::Present,
            Ok(None) => RevocationStatus::Absent,
            Err(e) => {
                tracing::warn!(error = %e, policy = ?self.policy, "Revocation lookup failed");
                match self.policy {
                    FailPolicy::FailOpen => RevocationStatus::Absent,
                    FailPolicy::FailClosed => RevocationStatus::Present,
                }
            }
        }
    }

    pub async fn shutdown(&self) {
        if let Some(backend) = &self.backend {
            backend.shutdown().await;
        }
    }

    /// Run `op` with the per-operation timeout, retrying once after a short backoff.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CacheError>>,
    {
        let mut last_error = CacheError::Timeout;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            match tokio::time::timeout(self.op_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                // The backend is in its reconnect backoff; retrying now would not help
                Ok(Err(e @ CacheError::Unavailable(_))) => return Err(e),
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = CacheError::Timeout,
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend failing the first `failures` calls with a command error
    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        inner: MemoryCache,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                inner: MemoryCache::new(),
            }
        }

        fn fail_now(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) < self.failures
        }
    }

    #[async_trait]
    impl CacheBackend for Flaky {
        async fn connect(&self) -> Result<(), CacheError> {
            Ok(())
        }

        async fn set_ex(&self, key: &str, value: &str, ttl: u64) -> Result<(), CacheError> {
            if self.fail_now() {
                return Err(CacheError::Command("connection reset".to_string()));
            }
            self.inner.set_ex(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            if self.fail_now() {
                return Err(CacheError::Command("connection reset".to_string()));
            }
            self.inner.get(key).await
        }

        async fn shutdown(&self) {}
    }

    fn store_with(backend: Arc<dyn CacheBackend>, policy: FailPolicy) -> RevocationStore {
        RevocationStore::new(backend, policy, Duration::from_millis(200))
    }

    #[test]
    fn test_revocation_ttl() {
        assert_eq!(revocation_ttl(1_000 + 3600, 1_000), 3600);
        assert_eq!(revocation_ttl(1_001, 1_000), 1);
        assert_eq!(revocation_ttl(1_000, 1_000), MIN_REVOCATION_TTL_SECS);
        assert_eq!(revocation_ttl(500, 1_000), MIN_REVOCATION_TTL_SECS);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = store_with(Arc::new(MemoryCache::new()), FailPolicy::FailOpen);

        assert_eq!(store.get("tok").await, RevocationStatus::Absent);
        assert!(store.put("tok", 60).await);
        assert_eq!(store.get("tok").await, RevocationStatus::Present);
        assert_eq!(store.get("other").await, RevocationStatus::Absent);
    }

    #[tokio::test]
    async fn test_disabled_store_skips_everything() {
        let store = RevocationStore::disabled();

        assert!(!store.put("tok", 60).await);
        assert_eq!(store.get("tok").await, RevocationStatus::Absent);
        assert_eq!(store.connect().await, StoreStatus::Disabled);
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let backend = Arc::new(Flaky::new(1));
        let store = store_with(backend.clone(), FailPolicy::FailOpen);

        assert!(store.put("tok", 60).await);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_at_most_one_retry() {
        let backend = Arc::new(Flaky::new(usize::MAX));
        let store = store_with(backend.clone(), FailPolicy::FailOpen);

        assert!(!store.put("tok", 60).await);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fail_policy_on_lookup_error() {
        let open = store_with(Arc::new(Flaky::new(usize::MAX)), FailPolicy::FailOpen);
        assert_eq!(open.get("tok").await, RevocationStatus::Absent);

        let closed = store_with(Arc::new(Flaky::new(usize::MAX)), FailPolicy::FailClosed);
        assert_eq!(closed.get("tok").await, RevocationStatus::Present);
    }

    #[tokio::test]
    async fn test_shutdown_makes_store_unavailable() {
        let store = store_with(Arc::new(MemoryCache::new()), FailPolicy::FailOpen);
        assert!(store.put("tok", 60).await);

        store.shutdown().await;
        assert_eq!(store.status().await, StoreStatus::Unavailable);
        assert!(!store.put("tok", 60).await);
        assert_eq!(store.get("tok").await, RevocationStatus::Absent);
    }
}
