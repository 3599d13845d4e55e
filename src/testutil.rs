//! Shared test helpers for `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use tempfile::TempDir;

use crate::config::{CacheConfig, Config, ServerConfig, TokenConfig};
use crate::revocation::{MemoryCache, RevocationStore};
use crate::storage::Database;
use crate::tokens::PasswordHasher;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard. Keep the guard alive
/// for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` suitable for unit tests (in-memory revocation store).
pub fn test_config() -> Config {
    Config {
        cache: CacheConfig {
            backend: crate::config::CacheBackendKind::Memory,
            ..CacheConfig::default()
        },
        production: false,
        server: ServerConfig::default(),
        tokens: TokenConfig {
            jwt_secret: "test-secret".to_string(),
            ttl_seconds: 3600,
        },
    }
}

/// Build a full `Arc<AppState>` around the given database with an in-memory revocation store.
pub fn test_state(db: Database) -> Arc<AppState> {
    let config = test_config();
    let revocations = RevocationStore::new(
        Arc::new(MemoryCache::new()),
        config.cache.policy,
        config.cache.op_timeout(),
    );
    let passwords = PasswordHasher::insecure_fast().unwrap();
    Arc::new(AppState::new(config, db, passwords, revocations).unwrap())
}
