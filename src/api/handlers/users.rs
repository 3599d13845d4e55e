use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::internal_error;
use crate::api::middleware::{bearer_token, Rejection};
use crate::api::response::{ApiError, AppJson, Envelope};
use crate::api::validation::{login_rules, parse_body, register_rules};
use crate::revocation::revocation_ttl;
use crate::storage::DatabaseError;
use crate::tokens::Subject;
use crate::AppState;

/// Same message for unknown user and wrong password
const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    /// Whether the revocation entry reached the cache
    pub revoked: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<Value>,
) -> Result<(StatusCode, Json<Envelope<RegisterResponse>>), ApiError> {
    let req: CredentialsRequest = parse_body(body, &register_rules())?;

    let hasher = state.passwords.clone();
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| internal_error(&state, "Failed to create user", e))?
        .map_err(|e| internal_error(&state, "Failed to create user", e))?;

    let user = match state.db.create_user(&req.username, &password_hash) {
        Ok(user) => user,
        Err(DatabaseError::Conflict(_)) => {
            return Err(ApiError::conflict("Username already taken. Choose another."))
        }
        Err(e) => return Err(internal_error(&state, "Failed to create user", e)),
    };

    tracing::info!(user_id = %user.id, "Registered user");

    Ok(Envelope::created(RegisterResponse {
        message: "User created".to_string(),
        user: UserResponse {
            id: user.id,
            username: user.username,
        },
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    let req: CredentialsRequest = parse_body(body, &login_rules())?;

    let user = state
        .db
        .get_user_by_username(&req.username)
        .map_err(|e| internal_error(&state, "Failed to log in", e))?;

    // Unknown users still pay for a hash verification
    let hasher = state.passwords.clone();
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => hasher.verify_dummy(&password),
    })
    .await
    .map_err(|e| internal_error(&state, "Failed to log in", e))?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::debug!("Rejected login attempt");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    let subject = Subject {
        id: user.id,
        username: user.username,
    };
    let token = state
        .codec
        .issue(&subject)
        .map_err(|e| internal_error(&state, "Failed to log in", e))?;

    tracing::debug!(user_id = %subject.id, "Issued token");

    Ok(Envelope::success(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: UserResponse {
            id: subject.id,
            username: subject.username,
        },
    }))
}

/// Revoke the presented credential until it would have expired.
///
/// Succeeds even when the revocation store could not record the entry;
/// `revoked` in the response tells the two outcomes apart.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<LogoutResponse>>, ApiError> {
    let token = bearer_token(&headers).ok_or(Rejection::MissingToken)?;

    // Expired tokens may still log out; the signature is checked regardless
    let claims = state.codec.verify(token, true).map_err(|e| {
        tracing::debug!(error = %e, "Rejected logout credential");
        ApiError::unauthorized("Invalid token")
    })?;

    let ttl = revocation_ttl(claims.exp, Utc::now().timestamp());
    let revoked = state.revocations.put(token, ttl).await;

    tracing::info!(user_id = %claims.id, revoked, ttl_seconds = ttl, "User logged out");

    let message = if revoked {
        "Logged out. Token revoked."
    } else {
        "Logged out (revocation store unavailable; token was not revoked)."
    };

    Ok(Envelope::success(LogoutResponse {
        message: message.to_string(),
        revoked,
    }))
}
