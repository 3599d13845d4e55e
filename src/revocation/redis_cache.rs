use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, IntoConnectionInfo};
use tokio::sync::Mutex;

use super::{CacheBackend, CacheError};
use crate::config::CacheConfig;

/// Upper bound of the handshake backoff after repeated connect failures
const MAX_RECONNECT_BACKOFF_MS: u64 = 2000;

enum ConnState {
    Closed,
    Failed { attempts: u32, retry_at: Instant },
    Idle,
    Ready(ConnectionManager),
}

/// Redis-backed cache with a lazily established, shared connection.
///
/// The first caller performs the handshake while holding the state lock, so
/// concurrent first requests never open duplicate connections. After a
/// failed handshake every call reports unavailable until the backoff window
/// has passed; only then does one caller try again.
pub struct RedisCache {
    connect_timeout: Duration,
    host: String,
    op_timeout: Duration,
    password: Option<String>,
    port: u16,
    state: Mutex<ConnState>,
}

impl RedisCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            host: config.host.clone(),
            op_timeout: config.op_timeout(),
            password: config.password.clone(),
            port: config.port,
            state: Mutex::new(ConnState::Idle),
        }
    }

    fn client(&self) -> Result<Client, CacheError> {
        let mut info = (self.host.as_str(), self.port)
            .into_connection_info()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        info.redis.password = self.password.clone();
        Client::open(info).map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    /// Handshake budget. Never longer than one operation, so the caller's
    /// operation timeout cannot fire while a handshake is still running.
    fn handshake_timeout(&self) -> Duration {
        self.connect_timeout.min(self.op_timeout)
    }

    async fn open(&self) -> Result<ConnectionManager, CacheError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(self.handshake_timeout())
            .set_response_timeout(self.op_timeout);

        let client = self.client()?;
        tokio::time::timeout(
            self.handshake_timeout(),
            client.get_connection_manager_with_config(config),
        )
        .await
        .map_err(|_| CacheError::Unavailable("connect timed out".to_string()))?
        .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    /// Shared connection, connecting on first use.
    ///
    /// The attempt is recorded as failed before the handshake starts. If the
    /// caller drops this future mid-handshake, the backoff still applies and
    /// the next call does not open another connection straight away.
    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let mut state = self.state.lock().await;

        let attempts = match &*state {
            ConnState::Ready(conn) => return Ok(conn.clone()),
            ConnState::Closed => {
                return Err(CacheError::Unavailable("connection closed".to_string()))
            }
            ConnState::Failed { retry_at, .. } if Instant::now() < *retry_at => {
                return Err(CacheError::Unavailable(
                    "waiting to reconnect after failed handshake".to_string(),
                ))
            }
            ConnState::Failed { attempts, .. } => attempts.saturating_add(1),
            ConnState::Idle => 1,
        };

        *state = ConnState::Failed {
            attempts,
            retry_at: Instant::now() + self.handshake_timeout() + reconnect_backoff(attempts),
        };

        match self.open().await {
            Ok(conn) => {
                tracing::info!(host = %self.host, port = self.port, "Connected to Redis");
                *state = ConnState::Ready(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                let backoff = reconnect_backoff(attempts);
                tracing::warn!(
                    error = %e,
                    attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "Redis unavailable; continuing without revocation checks"
                );
                *state = ConnState::Failed {
                    attempts,
                    retry_at: Instant::now() + backoff,
                };
                Err(e)
            }
        }
    }

    #[cfg(test)]
    async fn failed_attempts(&self) -> u32 {
        match &*self.state.lock().await {
            ConnState::Failed { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

/// Delay before the next handshake after `attempts` consecutive failures.
fn reconnect_backoff(attempts: u32) -> Duration {
    Duration::from_millis((u64::from(attempts) * 100).min(MAX_RECONNECT_BACKOFF_MS))
}

fn command_error(e: redis::RedisError) -> CacheError {
    if e.is_timeout() {
        CacheError::Timeout
    } else {
        CacheError::Command(e.to_string())
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn connect(&self) -> Result<(), CacheError> {
        self.connection().await.map(|_| ())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, ConnState::Ready(_)) {
            tracing::info!("Closing Redis connection");
        }
        *state = ConnState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unreachable_config() -> CacheConfig {
        CacheConfig {
            connect_timeout_ms: 200,
            host: "127.0.0.1".to_string(),
            // Nothing listens on the reserved port 1
            port: 1,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_reconnect_backoff_is_bounded() {
        assert_eq!(reconnect_backoff(1), Duration::from_millis(100));
        assert_eq!(reconnect_backoff(5), Duration::from_millis(500));
        assert_eq!(reconnect_backoff(20), Duration::from_millis(2000));
        assert_eq!(reconnect_backoff(u32::MAX), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_failed_handshake_is_not_retried_per_call() {
        let cache = RedisCache::new(&unreachable_config());

        assert!(matches!(
            cache.connect().await,
            Err(CacheError::Unavailable(_))
        ));
        assert_eq!(cache.failed_attempts().await, 1);

        // Inside the backoff window: no new handshake, attempts unchanged
        assert!(cache.get("k").await.is_err());
        assert!(cache.set_ex("k", "true", 60).await.is_err());
        assert_eq!(cache.failed_attempts().await, 1);
    }

    #[tokio::test]
    async fn test_cancelled_handshake_backs_off() {
        // Accepts connections and never answers, so the AUTH exchange hangs
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let cache = RedisCache::new(&CacheConfig {
            connect_timeout_ms: 1_000,
            host: "127.0.0.1".to_string(),
            op_timeout_ms: 2_000,
            password: Some("secret".to_string()),
            port,
            ..CacheConfig::default()
        });

        // The caller gives up long before the handshake would
        let attempt = tokio::time::timeout(Duration::from_millis(100), cache.connect()).await;
        assert!(attempt.is_err());
        assert_eq!(cache.failed_attempts().await, 1);

        // Later calls are refused without another handshake
        for _ in 0..3 {
            assert!(matches!(
                cache.get("k").await,
                Err(CacheError::Unavailable(_))
            ));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(cache.failed_attempts().await, 1);
    }

    #[test]
    fn test_handshake_never_outlives_an_operation() {
        let cache = RedisCache::new(&CacheConfig {
            connect_timeout_ms: 1_000,
            op_timeout_ms: 200,
            ..CacheConfig::default()
        });
        assert_eq!(cache.handshake_timeout(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_shutdown_closes() {
        let cache = RedisCache::new(&unreachable_config());
        cache.shutdown().await;

        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
