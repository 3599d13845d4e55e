mod contacts;
mod health;
mod users;

use std::fmt::Display;

use crate::api::response::ApiError;
use crate::AppState;

pub use contacts::{create_contact, delete_contact, get_contact, list_contacts, update_contact};
pub use health::{health, not_found};
pub use users::{login, logout, register};

/// Log an unexpected failure and map it to a 500, hiding the detail in production.
fn internal_error(state: &AppState, context: &str, error: impl Display) -> ApiError {
    tracing::error!(error = %error, "{context}");
    ApiError::Internal {
        detail: (!state.config.production).then(|| error.to_string()),
        message: context.to_string(),
    }
}
