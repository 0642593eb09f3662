//! Account lifecycle: sign-up, login, email verification, password reset.
//!
//! All operations are synchronous over a borrowed `Connection` and run on
//! the blocking pool from the HTTP layer. Raw tokens only ever exist in the
//! outgoing email and the client's request; the database keeps the SHA-256
//! hex digest with an expiry, and consuming a token clears it.

pub mod account;
pub mod validation;

pub use account::*;
pub use validation::*;

use thiserror::Error;

use crate::config::AppConfig;
use crate::crypto::CryptoError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("An account with this {0} already exists")]
    AccountExists(&'static str),

    #[error("Invalid username/email or password")]
    InvalidCredentials,

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Token is invalid or has expired")]
    InvalidToken,

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The slice of configuration the account operations need.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub public_url: String,
    pub require_email_verification: bool,
    pub password_hash_rounds: u32,
}

impl From<&AppConfig> for AuthSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            public_url: config.public_url.clone(),
            require_email_verification: config.require_email_verification,
            password_hash_rounds: config.password_hash_rounds,
        }
    }
}
