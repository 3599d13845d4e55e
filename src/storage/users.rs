use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::User;
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Create a user. A taken username is reported as `DatabaseError::Conflict`.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DatabaseError> {
        debug_assert!(!username.is_empty(), "username must not be empty");

        let user = User {
            created_at: Utc::now(),
            id: uuid::Uuid::new_v4().to_string(),
            password_hash: password_hash.to_string(),
            username: username.to_string(),
        };

        let write_txn = self.begin_write()?;
        {
            let mut names = write_txn.open_table(USERNAMES)?;
            if names.get(username)?.is_some() {
                return Err(DatabaseError::Conflict("username".to_string()));
            }
            names.insert(username, user.id.as_str())?;

            let mut table = write_txn.open_table(USERS)?;
            let data = rmp_serde::to_vec_named(&user)?;
            table.insert(user.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(user)
    }

    /// Get a user by login name (resolves username -> id -> user)
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let names = read_txn.open_table(USERNAMES)?;
        let users = read_txn.open_table(USERS)?;

        let id = match names.get(username)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        match users.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }
}
