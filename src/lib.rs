//! contacts-api - A small contacts REST backend with revocable JWT sessions
//!
//! This crate provides:
//! - User registration and login issuing signed, short-lived JWTs
//! - Logout backed by a Redis revocation list with TTLs aligned to token expiry
//! - Fail-open (or optionally fail-closed) behavior when the cache is unreachable
//! - Per-user contacts CRUD behind a bearer-token auth gate
//! - redb embedded database (ACID, MVCC, crash-safe)

pub mod api;
pub mod config;
pub mod expiration;
pub mod revocation;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use config::Config;
use revocation::RevocationStore;
use storage::Database;
use tokens::{PasswordHasher, TokenCodec, TokenError};

/// Shared application state
pub struct AppState {
    pub codec: TokenCodec,
    pub config: Config,
    pub db: Database,
    pub passwords: PasswordHasher,
    pub revocations: RevocationStore,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        passwords: PasswordHasher,
        revocations: RevocationStore,
    ) -> Result<Self, TokenError> {
        let codec = TokenCodec::new(&config.tokens.jwt_secret, config.tokens.ttl_seconds)?;
        Ok(Self {
            codec,
            config,
            db,
            passwords,
            revocations,
        })
    }
}
