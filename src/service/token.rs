use crate::models::link::TOKEN_LENGTH;
use sha2::{Digest, Sha256};

/// Fresh opaque credential: 128 random bits, hex encoded.
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; TOKEN_LENGTH / 2]>())
}

/// Digest stored in place of the raw token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check done before any store lookup.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn share_url(base_url: &str, path: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}?token={}", base, path, token)
}
