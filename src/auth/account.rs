use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::{validate_new_password, validate_signup, AuthError, AuthSettings, SignupRequest};
use crate::crypto::{generate_token, hash_password, hash_token_hex, verify_password};
use crate::db::{self, DatabaseError};
use crate::mail::{self, Mailer, RESET_TTL_HOURS, VERIFICATION_TTL_HOURS};
use crate::models::{AccountInfo, NewUser, User};

#[derive(Debug, Clone, Serialize)]
pub struct SignupOutcome {
    pub account: AccountInfo,
    pub verification_email_sent: bool,
}

/// Create an account and its empty profile, then email a verification link.
/// A delivery failure is logged and reported in the outcome; the account
/// is still created.
pub fn signup(
    conn: &Connection,
    mailer: &dyn Mailer,
    settings: &AuthSettings,
    req: &SignupRequest,
    now: NaiveDateTime,
) -> Result<SignupOutcome, AuthError> {
    let req = SignupRequest {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password: req.password.clone(),
        confirm_password: req.confirm_password.clone(),
    };
    validate_signup(&req)?;

    if db::username_taken(conn, &req.username)? {
        return Err(AuthError::AccountExists("username"));
    }
    if db::email_taken(conn, &req.email)? {
        return Err(AuthError::AccountExists("email"));
    }

    let user = NewUser {
        id: Uuid::new_v4(),
        username: req.username.clone(),
        email: req.email.clone(),
        password_hash: hash_password(&req.password, settings.password_hash_rounds)?,
        created_at: now,
    };

    match db::create_user_with_profile(conn, &user) {
        Ok(()) => {}
        // Lost a race with a concurrent sign-up for the same name or address.
        Err(DatabaseError::ConstraintViolation(msg)) => {
            let field = if msg.contains("email") { "email" } else { "username" };
            return Err(AuthError::AccountExists(field));
        }
        Err(e) => return Err(e.into()),
    }

    let token = issue_verification_token(conn, &user.id, now)?;
    let email = mail::verification_email(&settings.public_url, &user.email, &user.username, &token);
    let verification_email_sent = match mailer.send(&email) {
        Ok(()) => mailer.delivers(),
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Verification email failed");
            false
        }
    };

    tracing::info!(user_id = %user.id, "Account created");

    Ok(SignupOutcome {
        account: AccountInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            email_verified: false,
        },
        verification_email_sent,
    })
}

/// Authenticate by username or email. Unknown identifiers and wrong
/// passwords produce the same error.
pub fn login(
    conn: &Connection,
    settings: &AuthSettings,
    identifier: &str,
    password: &str,
    now: NaiveDateTime,
) -> Result<User, AuthError> {
    let Some(mut user) = db::find_user_by_login(conn, identifier)? else {
        tracing::info!("Login failed: unknown identifier");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    if settings.require_email_verification && !user.email_verified {
        return Err(AuthError::EmailNotVerified);
    }

    db::record_login(conn, &user.id, &now)?;
    user.last_login_at = Some(now);
    tracing::info!(user_id = %user.id, "Login succeeded");
    Ok(user)
}

/// Consume a verification token and mark the account verified.
pub fn verify_email(conn: &Connection, token: &str, now: NaiveDateTime) -> Result<Uuid, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let user_id = db::consume_verification_token(conn, &hash_token_hex(token), &now)?
        .ok_or(AuthError::InvalidToken)?;
    tracing::info!(user_id = %user_id, "Email verified");
    Ok(user_id)
}

/// Send a fresh verification link. Silent for unknown or already verified
/// addresses.
pub fn resend_verification(
    conn: &Connection,
    mailer: &dyn Mailer,
    settings: &AuthSettings,
    email: &str,
    now: NaiveDateTime,
) -> Result<(), AuthError> {
    let Some(user) = db::find_user_by_email(conn, email)? else {
        return Ok(());
    };
    if user.email_verified {
        return Ok(());
    }

    let token = issue_verification_token(conn, &user.id, now)?;
    let message = mail::verification_email(&settings.public_url, &user.email, &user.username, &token);
    if let Err(e) = mailer.send(&message) {
        tracing::error!(user_id = %user.id, error = %e, "Verification email failed");
    }
    Ok(())
}

/// Start a password reset. Always succeeds so that callers cannot test
/// which addresses are registered.
pub fn request_password_reset(
    conn: &Connection,
    mailer: &dyn Mailer,
    settings: &AuthSettings,
    email: &str,
    now: NaiveDateTime,
) -> Result<(), AuthError> {
    let Some(user) = db::find_user_by_email(conn, email)? else {
        tracing::info!("Password reset requested for unknown address");
        return Ok(());
    };

    let token = generate_token();
    let expires_at = now + Duration::hours(RESET_TTL_HOURS);
    db::set_reset_token(conn, &user.id, &hash_token_hex(&token), &expires_at)?;

    let message = mail::reset_email(&settings.public_url, &user.email, &user.username, &token);
    if let Err(e) = mailer.send(&message) {
        tracing::error!(user_id = %user.id, error = %e, "Password reset email failed");
    }
    Ok(())
}

/// Finish a password reset: validate the new password, consume the token
/// and store the new hash.
pub fn confirm_password_reset(
    conn: &Connection,
    settings: &AuthSettings,
    token: &str,
    new_password: &str,
    confirm_password: &str,
    now: NaiveDateTime,
) -> Result<Uuid, AuthError> {
    validate_new_password(new_password, confirm_password)?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    let new_hash = hash_password(new_password, settings.password_hash_rounds)?;
    let user_id = db::consume_reset_token(conn, &hash_token_hex(token), &now, &new_hash)?
        .ok_or(AuthError::InvalidToken)?;
    tracing::info!(user_id = %user_id, "Password reset completed");
    Ok(user_id)
}

fn issue_verification_token(
    conn: &Connection,
    user_id: &Uuid,
    now: NaiveDateTime,
) -> Result<String, AuthError> {
    let token = generate_token();
    let expires_at = now + Duration::hours(VERIFICATION_TTL_HOURS);
    db::set_verification_token(conn, user_id, &hash_token_hex(&token), &expires_at)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::mail::RecordingMailer;

    fn settings() -> AuthSettings {
        AuthSettings {
            public_url: "http://localhost:8000".into(),
            require_email_verification: true,
            password_hash_rounds: 1_000,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-03-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn signup_request(username: &str, email: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            email: email.into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
        }
    }

    /// Sign up and verify, returning the user id.
    fn verified_user(conn: &Connection, mailer: &RecordingMailer) -> Uuid {
        let outcome = signup(conn, mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();
        let token = mailer.last_token().unwrap();
        verify_email(conn, &token, now()).unwrap();
        outcome.account.id
    }

    #[test]
    fn signup_sends_verification_email() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();

        let outcome = signup(&conn, &mailer, &settings(), &signup_request(" jane ", "jane@example.org"), now()).unwrap();
        assert_eq!(outcome.account.username, "jane");
        assert!(outcome.verification_email_sent);

        let sent = mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@example.org");
        assert!(sent[0].body.contains("http://localhost:8000/verify?token="));
    }

    #[test]
    fn signup_stores_only_token_hash() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();

        let token = mailer.last_token().unwrap();
        let stored: String = conn
            .query_row("SELECT verification_token_hash FROM users", [], |r| r.get(0))
            .unwrap();
        assert_ne!(stored, token);
        assert_eq!(stored, hash_token_hex(&token));
    }

    #[test]
    fn signup_survives_mail_failure() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::failing();
        let outcome = signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();
        assert!(!outcome.verification_email_sent);
        assert!(db::find_user_by_login(&conn, "jane").unwrap().is_some());
    }

    #[test]
    fn duplicate_username_or_email_rejected() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();

        let err = signup(&conn, &mailer, &settings(), &signup_request("Jane", "other@example.org"), now()).unwrap_err();
        assert!(matches!(err, AuthError::AccountExists("username")));

        let err = signup(&conn, &mailer, &settings(), &signup_request("john", "JANE@example.org"), now()).unwrap_err();
        assert!(matches!(err, AuthError::AccountExists("email")));
    }

    #[test]
    fn short_password_rejected_before_any_write() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        let mut req = signup_request("jane", "jane@example.org");
        req.password = "12345".into();
        req.confirm_password = "12345".into();

        assert!(matches!(
            signup(&conn, &mailer, &settings(), &req, now()),
            Err(AuthError::Validation(_))
        ));
        assert!(db::find_user_by_login(&conn, "jane").unwrap().is_none());
        assert!(mailer.messages().is_empty());
    }

    #[test]
    fn unverified_login_blocked_when_required() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();

        let err = login(&conn, &settings(), "jane", "hunter22", now()).unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));

        let relaxed = AuthSettings {
            require_email_verification: false,
            ..settings()
        };
        assert!(login(&conn, &relaxed, "jane", "hunter22", now()).is_ok());
    }

    #[test]
    fn login_by_username_or_email_records_timestamp() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        let id = verified_user(&conn, &mailer);

        let user = login(&conn, &settings(), "jane", "hunter22", now()).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.last_login_at, Some(now()));
        assert!(login(&conn, &settings(), "JANE@example.org", "hunter22", now()).is_ok());
    }

    #[test]
    fn bad_identifier_and_bad_password_look_identical() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        verified_user(&conn, &mailer);

        let unknown = login(&conn, &settings(), "nobody", "hunter22", now()).unwrap_err();
        let wrong = login(&conn, &settings(), "jane", "wrong-pass", now()).unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn verification_token_single_use() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();
        let token = mailer.last_token().unwrap();

        verify_email(&conn, &token, now()).unwrap();
        assert!(matches!(verify_email(&conn, &token, now()), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_verification_token_rejected() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();
        let token = mailer.last_token().unwrap();

        let later = now() + Duration::hours(VERIFICATION_TTL_HOURS) + Duration::seconds(1);
        assert!(matches!(verify_email(&conn, &token, later), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_tokens_rejected() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(verify_email(&conn, "", now()), Err(AuthError::InvalidToken)));
        assert!(matches!(verify_email(&conn, "not-a-token", now()), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn resend_issues_new_token_and_invalidates_old() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        signup(&conn, &mailer, &settings(), &signup_request("jane", "jane@example.org"), now()).unwrap();
        let first = mailer.last_token().unwrap();

        resend_verification(&conn, &mailer, &settings(), "jane@example.org", now()).unwrap();
        let second = mailer.last_token().unwrap();
        assert_ne!(first, second);
        assert!(verify_email(&conn, &first, now()).is_err());
        assert!(verify_email(&conn, &second, now()).is_ok());
    }

    #[test]
    fn resend_silent_for_unknown_or_verified() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        verified_user(&conn, &mailer);
        let before = mailer.messages().len();

        resend_verification(&conn, &mailer, &settings(), "jane@example.org", now()).unwrap();
        resend_verification(&conn, &mailer, &settings(), "ghost@example.org", now()).unwrap();
        assert_eq!(mailer.messages().len(), before);
    }

    #[test]
    fn reset_request_for_unknown_email_succeeds_silently() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        request_password_reset(&conn, &mailer, &settings(), "ghost@example.org", now()).unwrap();
        assert!(mailer.messages().is_empty());
    }

    #[test]
    fn reset_flow_changes_password_once() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        verified_user(&conn, &mailer);

        request_password_reset(&conn, &mailer, &settings(), "jane@example.org", now()).unwrap();
        let token = mailer.last_token().unwrap();
        assert!(mailer.messages().last().unwrap().body.contains("/reset-password?token="));

        confirm_password_reset(&conn, &settings(), &token, "n3w-pass", "n3w-pass", now()).unwrap();
        assert!(login(&conn, &settings(), "jane", "n3w-pass", now()).is_ok());
        assert!(matches!(
            login(&conn, &settings(), "jane", "hunter22", now()),
            Err(AuthError::InvalidCredentials)
        ));

        let again = confirm_password_reset(&conn, &settings(), &token, "other-pass", "other-pass", now());
        assert!(matches!(again, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_reset_token_rejected() {
        let conn = open_memory_database().unwrap();
        let mailer = RecordingMailer::default();
        verified_user(&conn, &mailer);
        request_password_reset(&conn, &mailer, &settings(), "jane@example.org", now()).unwrap();
        let token = mailer.last_token().unwrap();

        let later = now() + Duration::hours(RESET_TTL_HOURS) + Duration::seconds(1);
        let result = confirm_password_reset(&conn, &settings(), &token, "n3w-pass", "n3w-pass", later);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
        assert!(login(&conn, &settings(), "jane", "hunter22", now()).is_ok());
    }

    #[test]
    fn reset_confirm_validates_password_first() {
        let conn = open_memory_database().unwrap();
        let result = confirm_password_reset(&conn, &settings(), "whatever", "short", "short", now());
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }
}
