use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, Envelope};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `available`, `unavailable` or `disabled`
    pub revocation: String,
    pub status: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Envelope<HealthResponse>> {
    let revocation = state.revocations.status().await;
    Envelope::success(HealthResponse {
        revocation: revocation.as_str().to_string(),
        status: "healthy".to_string(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
