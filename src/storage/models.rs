use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// When the account was created
    pub created_at: DateTime<Utc>,
    pub id: String,
    /// Argon2 PHC string; the plaintext password is never stored
    pub password_hash: String,
    /// Unique login name
    pub username: String,
}

/// A contact owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub created_at: DateTime<Utc>,
    pub id: String,
    pub name: String,
    pub phone: String,
    pub updated_at: DateTime<Utc>,
    /// Owner of the contact
    pub user_id: String,
}
