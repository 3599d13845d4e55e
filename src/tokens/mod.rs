pub mod fingerprint;
pub mod jwt;
pub mod password;

pub use fingerprint::{fingerprint, revocation_key};
pub use jwt::{Claims, Subject, TokenCodec, TokenError};
pub use password::{PasswordError, PasswordHasher};
