use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

// ============================================================================
// Success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub success: bool,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Json<Envelope<T>> {
        Json(Envelope {
            data,
            success: true,
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Envelope<T>>) {
        (StatusCode::CREATED, Self::success(data))
    }
}

/// Payload of responses that only carry a human-readable message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Failure envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Field-level messages for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    /// Internal error detail, only outside production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub error: String,
    pub success: bool,
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    /// Duplicate value for a unique field (400)
    Conflict(String),
    /// Unexpected failure (500); `detail` is set only outside production
    Internal {
        detail: Option<String>,
        message: String,
    },
    /// Absent, or not owned by the caller (404)
    NotFound(String),
    /// Missing, invalid, expired or revoked credential, or bad login (401)
    Unauthorized(String),
    /// Malformed or missing input fields (400)
    Validation(Vec<String>),
}

pub const VALIDATION_FAILED: &str = "Field validation failed";

impl ApiError {
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Conflict(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(messages) => ErrorBody {
                data: Some(messages),
                details: None,
                error: VALIDATION_FAILED.to_string(),
                success: false,
            },
            ApiError::Internal { detail, message } => ErrorBody {
                data: None,
                details: detail,
                error: message,
                success: false,
            },
            ApiError::Conflict(message)
            | ApiError::NotFound(message)
            | ApiError::Unauthorized(message) => ErrorBody {
                data: None,
                details: None,
                error: message,
                success: false,
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// `Json` extractor whose rejections use the failure envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
