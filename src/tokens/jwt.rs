//! Signed, time-bounded credentials (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Failed to sign token: {0}")]
    Encoding(String),
    #[error("Token expired")]
    Expired,
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("No signing secret configured")]
    MissingSecret,
}

/// The identity a credential is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub username: String,
}

/// Decoded credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry (seconds since the Unix epoch)
    pub exp: i64,
    /// Issued-at (seconds since the Unix epoch)
    pub iat: i64,
    pub id: String,
    pub username: String,
}

impl Claims {
    pub fn subject(&self) -> Subject {
        Subject {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Issues and verifies credentials with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_seconds: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| TokenError::Encoding(format!("lifetime out of range: {ttl_seconds}s")))?;
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// Issue a credential for `subject`, valid from now for the configured lifetime.
    pub fn issue(&self, subject: &Subject) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a credential as if it had been created at `issued_at`.
    pub fn issue_at(&self, subject: &Subject, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".to_string()))?;
        let claims = Claims {
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            id: subject.id.clone(),
            username: subject.username.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature and, unless `allow_expired` is set, expiry.
    ///
    /// `allow_expired` exists for logout, which needs the expiry claim of a
    /// token that may already be past it. The signature is always checked.
    pub fn verify(&self, token: &str, allow_expired: bool) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = !allow_expired;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> Subject {
        Subject {
            id: "user-1".to_string(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = TokenCodec::new("secret", 3600).unwrap();
        let token = codec.issue(&subject()).unwrap();

        let claims = codec.verify(&token, false).unwrap();
        assert_eq!(claims.subject(), subject());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenCodec::new("", 3600),
            Err(TokenError::MissingSecret)
        ));
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let issuer = TokenCodec::new("secret-a", 3600).unwrap();
        let verifier = TokenCodec::new("secret-b", 3600).unwrap();
        let token = issuer.issue(&subject()).unwrap();

        assert!(matches!(
            verifier.verify(&token, false),
            Err(TokenError::BadSignature)
        ));
        // Bypassing expiry never bypasses the signature
        assert!(matches!(
            verifier.verify(&token, true),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new("secret", 60).unwrap();
        let token = codec
            .issue_at(&subject(), Utc::now() - Duration::hours(1))
            .unwrap();

        assert!(matches!(codec.verify(&token, false), Err(TokenError::Expired)));

        let claims = codec.verify(&token, true).unwrap();
        assert!(claims.exp < Utc::now().timestamp());
    }

    #[test]
    fn test_lifetime_out_of_range() {
        assert!(matches!(
            TokenCodec::new("secret", u64::MAX),
            Err(TokenError::Encoding(_))
        ));

        // Representable lifetime, but the expiry would pass the last valid date
        let codec = TokenCodec::new("secret", 100_000_000 * 86_400).unwrap();
        assert!(matches!(
            codec.issue(&subject()),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new("secret", 3600).unwrap();
        for token in ["", "not-a-jwt", "a.b.c"] {
            assert!(matches!(
                codec.verify(token, false),
                Err(TokenError::Malformed(_))
            ));
        }
    }
}
