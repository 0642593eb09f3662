//! Opaque bearer and single-use tokens.
//!
//! Raw tokens are handed to the client (session header, email link);
//! only their SHA-256 digest is kept server-side.

use base64::Engine;
use sha2::{Digest, Sha256};

/// Raw token entropy in bytes.
pub const TOKEN_BYTES: usize = 32;

/// Generate a random token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Lowercase hex of the token digest, as stored in the database.
pub fn hash_token_hex(token: &str) -> String {
    hash_token(token)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
