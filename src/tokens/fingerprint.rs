use sha2::{Digest, Sha256};

/// Cache key prefix for revoked credentials
pub const REVOCATION_KEY_PREFIX: &str = "blacklist:jwt:";

/// SHA-256 of the raw credential string, hex encoded.
///
/// Computed over the encoded token rather than its claims, so two tokens
/// with identical payloads never share a fingerprint.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cache key under which a credential's revocation marker is stored
pub fn revocation_key(token: &str) -> String {
    format!("{REVOCATION_KEY_PREFIX}{}", fingerprint(token))
}
