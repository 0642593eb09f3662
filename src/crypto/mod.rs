pub mod password;
pub mod tokens;

pub use password::*;
pub use tokens::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Stored password hash is corrupted")]
    CorruptedHash,
}
