use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Contact;
use super::tables::*;

impl Database {
    // ========================================================================
    // Contact operations
    // ========================================================================

    /// Store a new contact for `user_id`
    pub fn create_contact(
        &self,
        user_id: &str,
        name: &str,
        phone: &str,
    ) -> Result<Contact, DatabaseError> {
        debug_assert!(!user_id.is_empty(), "contact user_id must not be empty");

        let now = Utc::now();
        let contact = Contact {
            created_at: now,
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            updated_at: now,
            user_id: user_id.to_string(),
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTACTS)?;
            let data = rmp_serde::to_vec_named(&contact)?;
            table.insert(contact.id.as_str(), data.as_slice())?;

            // Update user_contacts index
            let mut index_table = write_txn.open_table(USER_CONTACTS)?;
            let mut ids: Vec<String> = index_table
                .get(user_id)?
                .map(|v| rmp_serde::from_slice(v.value()))
                .transpose()?
                .unwrap_or_default();

            ids.push(contact.id.clone());
            let index_data = rmp_serde::to_vec_named(&ids)?;
            index_table.insert(user_id, index_data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(contact)
    }

    /// Get a contact, only if it belongs to `user_id`
    pub fn get_contact(&self, user_id: &str, id: &str) -> Result<Option<Contact>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CONTACTS)?;

        let contact: Option<Contact> = match table.get(id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        Ok(contact.filter(|c| c.user_id == user_id))
    }

    /// All contacts of `user_id`, in creation order
    pub fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(USER_CONTACTS)?;
        let contacts_table = read_txn.open_table(CONTACTS)?;

        let ids: Vec<String> = match index_table.get(user_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut contacts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(data) = contacts_table.get(id.as_str())? {
                let contact: Contact = rmp_serde::from_slice(data.value())?;
                contacts.push(contact);
            }
        }

        Ok(contacts)
    }

    /// Replace name and phone of a contact owned by `user_id`.
    ///
    /// Returns `None` when the contact does not exist or belongs to someone else.
    pub fn update_contact(
        &self,
        user_id: &str,
        id: &str,
        name: &str,
        phone: &str,
    ) -> Result<Option<Contact>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing: Option<Contact> = {
            let table = write_txn.open_table(CONTACTS)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice::<Contact>(data.value())?),
                None => None,
            };
            result
        };

        let updated = match existing.filter(|c| c.user_id == user_id) {
            Some(mut contact) => {
                contact.name = name.to_string();
                contact.phone = phone.to_string();
                contact.updated_at = Utc::now();

                let data = rmp_serde::to_vec_named(&contact)?;
                let mut table = write_txn.open_table(CONTACTS)?;
                table.insert(id, data.as_slice())?;
                Some(contact)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a contact owned by `user_id`. Returns whether anything was removed.
    pub fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owned = {
            let table = write_txn.open_table(CONTACTS)?;
            let result = match table.get(id)? {
                Some(data) => rmp_serde::from_slice::<Contact>(data.value())?.user_id == user_id,
                None => false,
            };
            result
        };

        if owned {
            {
                let mut table = write_txn.open_table(CONTACTS)?;
                table.remove(id)?;
            }

            // Update user_contacts index
            let ids: Option<Vec<String>> = {
                let index_table = write_txn.open_table(USER_CONTACTS)?;
                let result = match index_table.get(user_id)? {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                };
                result
            };

            if let Some(mut ids) = ids {
                ids.retain(|v| v != id);
                let mut index_table = write_txn.open_table(USER_CONTACTS)?;
                if ids.is_empty() {
                    index_table.remove(user_id)?;
                } else {
                    let index_data = rmp_serde::to_vec_named(&ids)?;
                    index_table.insert(user_id, index_data.as_slice())?;
                }
            }
        }

        write_txn.commit()?;
        Ok(owned)
    }
}
