use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::RngCore;
use zeroize::Zeroize;

use super::CryptoError;

pub const DEFAULT_PBKDF2_ROUNDS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

/// Hash a password with PBKDF2-SHA256 and return the PHC string
/// (`$pbkdf2-sha256$i=...,l=32$<salt>$<hash>`).
pub fn hash_password(password: &str, rounds: u32) -> Result<String, CryptoError> {
    let mut salt_bytes = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;
    salt_bytes.zeroize();

    let params = Params {
        rounds,
        output_length: HASH_LENGTH,
    };
    let hash = Pbkdf2
        .hash_password_customized(
            password.as_bytes(),
            Some(Algorithm::Pbkdf2Sha256.ident()),
            None,
            params,
            salt.as_salt(),
        )
        .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string. Round count and salt
/// are read from the stored hash; comparison is constant-time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(stored).map_err(|_| CryptoError::CorruptedHash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
}
