//! Auth gate
//!
//! Admits a request only when it carries a bearer credential that verifies
//! and has not been revoked. Checks run in a fixed order and the first
//! failure wins: missing, then invalid/expired, then revoked. An expired
//! token is therefore always reported as expired, never as revoked.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;

use super::response::ApiError;
use crate::revocation::{RevocationStatus, RevocationStore};
use crate::tokens::{Claims, TokenCodec};
use crate::AppState;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token revoked")]
    Revoked,
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        ApiError::unauthorized(rejection.to_string())
    }
}

/// Identity of an admitted caller, attached to the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
        }
    }
}

/// The credential of an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Decide whether `token` is admitted.
pub async fn admit(
    codec: &TokenCodec,
    revocations: &RevocationStore,
    token: Option<&str>,
) -> Result<Claims, Rejection> {
    let token = token.ok_or(Rejection::MissingToken)?;

    let claims = codec.verify(token, false).map_err(|e| {
        tracing::debug!(error = %e, "Rejected credential");
        Rejection::InvalidToken
    })?;

    if revocations.get(token).await == RevocationStatus::Present {
        tracing::debug!(user_id = %claims.id, "Rejected revoked credential");
        return Err(Rejection::Revoked);
    }

    Ok(claims)
}

/// Middleware guarding routes that require an authenticated caller.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).map(str::to_owned);
    let claims = admit(&state.codec, &state.revocations, token.as_deref()).await?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailPolicy;
    use crate::revocation::MemoryCache;
    use crate::tokens::Subject;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    fn codec() -> TokenCodec {
        TokenCodec::new("gate-secret", 3600).unwrap()
    }

    fn store() -> RevocationStore {
        RevocationStore::new(
            Arc::new(MemoryCache::new()),
            FailPolicy::FailOpen,
            StdDuration::from_millis(200),
        )
    }

    fn subject() -> Subject {
        Subject {
            id: "user-1".to_string(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_admits_valid_token() {
        let codec = codec();
        let token = codec.issue(&subject()).unwrap();

        let claims = admit(&codec, &store(), Some(&token)).await.unwrap();
        assert_eq!(claims.subject(), subject());
    }

    #[tokio::test]
    async fn test_rejection_order() {
        let codec = codec();
        let store = store();

        assert_eq!(
            admit(&codec, &store, None).await,
            Err(Rejection::MissingToken)
        );
        assert_eq!(
            admit(&codec, &store, Some("garbage")).await,
            Err(Rejection::InvalidToken)
        );

        let token = codec.issue(&subject()).unwrap();
        assert!(store.put(&token, 60).await);
        assert_eq!(
            admit(&codec, &store, Some(&token)).await,
            Err(Rejection::Revoked)
        );
    }

    #[tokio::test]
    async fn test_expired_and_revoked_reports_expired() {
        let codec = codec();
        let store = store();
        let token = codec
            .issue_at(&subject(), Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(store.put(&token, 60).await);

        assert_eq!(
            admit(&codec, &store, Some(&token)).await,
            Err(Rejection::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_disabled_store_admits_revoked_token() {
        let codec = codec();
        let token = codec.issue(&subject()).unwrap();
        let store = RevocationStore::disabled();
        store.put(&token, 60).await;

        assert!(admit(&codec, &store, Some(&token)).await.is_ok());
    }
}
