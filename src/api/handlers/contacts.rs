use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::internal_error;
use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, AppJson, Envelope, MessageResponse};
use crate::api::validation::{contact_rules, parse_body};
use crate::storage::models::Contact;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub created_at: String,
    pub id: String,
    pub name: String,
    pub phone: String,
    pub updated_at: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateContactResponse {
    pub contact: ContactResponse,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Envelope<Vec<ContactResponse>>>, ApiError> {
    let contacts = state
        .db
        .list_contacts(&user.id)
        .map_err(|e| internal_error(&state, "Failed to list contacts", e))?;

    Ok(Envelope::success(
        contacts.iter().map(contact_to_response).collect(),
    ))
}

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(body): AppJson<Value>,
) -> Result<(StatusCode, Json<Envelope<CreateContactResponse>>), ApiError> {
    let req: ContactRequest = parse_body(body, &contact_rules())?;

    let contact = state
        .db
        .create_contact(&user.id, &req.name, &req.phone)
        .map_err(|e| internal_error(&state, "Failed to create contact", e))?;

    tracing::debug!(
        id = %contact.id,
        user_id = %user.id,
        username = %user.username,
        "Created contact"
    );

    Ok(Envelope::created(CreateContactResponse {
        contact: contact_to_response(&contact),
    }))
}

pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ContactResponse>>, ApiError> {
    let contact = state
        .db
        .get_contact(&user.id, &id)
        .map_err(|e| internal_error(&state, "Failed to fetch contact", e))?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;

    Ok(Envelope::success(contact_to_response(&contact)))
}

pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<Envelope<ContactResponse>>, ApiError> {
    let req: ContactRequest = parse_body(body, &contact_rules())?;

    let contact = state
        .db
        .update_contact(&user.id, &id, &req.name, &req.phone)
        .map_err(|e| internal_error(&state, "Failed to update contact", e))?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;

    tracing::debug!(
        id = %id,
        user_id = %user.id,
        username = %user.username,
        "Updated contact"
    );
    Ok(Envelope::success(contact_to_response(&contact)))
}

pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<MessageResponse>>, ApiError> {
    let deleted = state
        .db
        .delete_contact(&user.id, &id)
        .map_err(|e| internal_error(&state, "Failed to delete contact", e))?;

    if !deleted {
        return Err(ApiError::not_found("Contact not found"));
    }

    tracing::debug!(
        id = %id,
        user_id = %user.id,
        username = %user.username,
        "Deleted contact"
    );
    Ok(Envelope::success(MessageResponse::new("Contact deleted")))
}

// ============================================================================
// Helpers
// ============================================================================

fn contact_to_response(contact: &Contact) -> ContactResponse {
    ContactResponse {
        created_at: contact.created_at.to_rfc3339(),
        id: contact.id.clone(),
        name: contact.name.clone(),
        phone: contact.phone.clone(),
        updated_at: contact.updated_at.to_rfc3339(),
        user_id: contact.user_id.clone(),
    }
}
