use redb::TableDefinition;

/// Users: user_id -> User (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: username -> user_id
pub const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Contacts: contact_id -> Contact (msgpack)
pub const CONTACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("contacts");

/// Secondary index: user_id -> Vec<contact_id> (msgpack, for listing a user's contacts)
pub const USER_CONTACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("user_contacts");
