use std::time::Duration;

use thiserror::Error;

/// Longest accepted token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
    #[error("JWT_SECRET is not configured")]
    MissingJwtSecret,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    /// Production mode hides internal error details from responses.
    pub production: bool,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Origin allowed by CORS (the frontend dev server by default)
    pub front_origin: String,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub jwt_secret: String,
    pub ttl_seconds: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    #[default]
    Redis,
}

/// What the revocation check answers when the cache cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailPolicy {
    /// Treat the token as not revoked. Keeps the API available while the cache is down.
    #[default]
    FailOpen,
    /// Treat the token as revoked. Logout is always enforced, at the cost of availability.
    FailClosed,
}

#[derive(Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub connect_timeout_ms: u64,
    /// Feature flag: when false every revocation operation is skipped.
    pub enabled: bool,
    pub host: String,
    pub op_timeout_ms: u64,
    pub password: Option<String>,
    pub policy: FailPolicy,
    pub port: u16,
    /// Interval of the expired-entry sweep for the memory backend
    pub sweep_interval_seconds: u64,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("backend", &self.backend)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("op_timeout_ms", &self.op_timeout_ms)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("policy", &self.policy)
            .field("port", &self.port)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            data_dir: "./data".to_string(),
            front_origin: "http://localhost:5173".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            connect_timeout_ms: 250,
            enabled: true,
            host: "127.0.0.1".to_string(),
            op_timeout_ms: 500,
            password: None,
            policy: FailPolicy::FailOpen,
            port: 6379,
            sweep_interval_seconds: 60,
        }
    }
}

impl CacheConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{port}")))
            .unwrap_or_else(|| ServerConfig::default().bind_address);
        let data_dir = var("DATA_DIR").unwrap_or_else(|| ServerConfig::default().data_dir);
        let front_origin =
            var("FRONT_ORIGIN").unwrap_or_else(|| ServerConfig::default().front_origin);

        let production = var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::MissingJwtSecret)?;
        let ttl_seconds = match var("JWT_EXPIRES_IN") {
            Some(raw) => parse_duration_secs(&raw).ok_or_else(|| {
                ConfigError::ValidationError(format!("JWT_EXPIRES_IN is not a duration: {raw}"))
            })?,
            None => 3600,
        };

        let defaults = CacheConfig::default();
        let port = match var("REDIS_PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("REDIS_PORT is not a port number: {raw}"))
            })?,
            None => defaults.port,
        };
        let backend = match var("REVOCATION_BACKEND").map(|s| s.to_lowercase()).as_deref() {
            None | Some("redis") => CacheBackendKind::Redis,
            Some("memory") => CacheBackendKind::Memory,
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "REVOCATION_BACKEND must be 'redis' or 'memory', got '{other}'"
                )))
            }
        };
        let policy = match var("REVOCATION_POLICY").map(|s| s.to_lowercase()).as_deref() {
            None | Some("fail-open") => FailPolicy::FailOpen,
            Some("fail-closed") => FailPolicy::FailClosed,
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "REVOCATION_POLICY must be 'fail-open' or 'fail-closed', got '{other}'"
                )))
            }
        };
        let connect_timeout_ms = match var("REDIS_CONNECT_TIMEOUT_MS") {
            Some(raw) => parse_millis("REDIS_CONNECT_TIMEOUT_MS", &raw)?,
            None => defaults.connect_timeout_ms,
        };
        let op_timeout_ms = match var("REDIS_OP_TIMEOUT_MS") {
            Some(raw) => parse_millis("REDIS_OP_TIMEOUT_MS", &raw)?,
            None => defaults.op_timeout_ms,
        };
        let disabled = var("DISABLE_REDIS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let config = Config {
            cache: CacheConfig {
                backend,
                connect_timeout_ms,
                enabled: !disabled,
                host: var("REDIS_HOST").unwrap_or(defaults.host),
                op_timeout_ms,
                password: var("REDIS_PASSWORD"),
                policy,
                port,
                sweep_interval_seconds: defaults.sweep_interval_seconds,
            },
            production,
            server: ServerConfig {
                bind_address,
                data_dir,
                front_origin,
            },
            tokens: TokenConfig {
                jwt_secret,
                ttl_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "JWT_EXPIRES_IN must be greater than 0".to_string(),
            ));
        }

        if self.tokens.ttl_seconds > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "JWT_EXPIRES_IN must be at most {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }

        if self.cache.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "REDIS_CONNECT_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        // A handshake must finish inside the budget of the operation that triggers it
        if self.cache.connect_timeout_ms >= self.cache.op_timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "REDIS_CONNECT_TIMEOUT_MS ({}) must be less than REDIS_OP_TIMEOUT_MS ({})",
                self.cache.connect_timeout_ms, self.cache.op_timeout_ms
            )));
        }

        if self.cache.policy == FailPolicy::FailClosed && !self.cache.enabled {
            tracing::warn!(
                "REVOCATION_POLICY=fail-closed has no effect while DISABLE_REDIS=true; \
                 logout will not be enforced."
            );
        }

        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} is not a number of milliseconds: {raw}"))
    })
}

/// Parse `3600`, `90s`, `15m`, `1h` or `7d` into seconds.
fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    value.checked_mul(multiplier)
}
