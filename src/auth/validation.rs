use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::AuthError;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").expect("valid regex"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").expect("valid regex")
});

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if USERNAME_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Username must be 3-50 characters: letters, digits, '_', '.' or '-'".into(),
        ))
    }
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.len() <= 254 && EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email address".into()))
    }
}

/// Length and confirmation check shared by sign-up and password reset.
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if password != confirm {
        return Err(AuthError::Validation("Passwords do not match".into()));
    }
    Ok(())
}

/// Validate a sign-up form. Username and email are expected trimmed.
pub fn validate_signup(req: &SignupRequest) -> Result<(), AuthError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_new_password(&req.password, &req.confirm_password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: password.into(),
        }
    }

    #[test]
    fn valid_signup_accepted() {
        assert!(validate_signup(&request("jane.doe", "jane@example.org", "s3cret!")).is_ok());
    }

    #[test]
    fn short_password_always_rejected() {
        for pw in ["", "a", "12345", "ééééé", "     ", "漢字漢字漢"] {
            let err = validate_signup(&request("jane", "jane@example.org", pw)).unwrap_err();
            assert!(matches!(err, AuthError::Validation(ref m) if m.contains("at least 6")), "{pw:?}");
        }
    }

    #[test]
    fn password_length_counts_characters_not_bytes() {
        // 6 characters, 12 bytes
        assert!(validate_new_password("éééééé", "éééééé").is_ok());
    }

    #[test]
    fn mismatched_confirmation_rejected() {
        let mut req = request("jane", "jane@example.org", "secret1");
        req.confirm_password = "secret2".into();
        let err = validate_signup(&req).unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("jane doe").is_err());
        assert!(validate_username("jane@doe").is_err());
        assert!(validate_username("jane_doe-1.x").is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("jane@example.org").is_ok());
        assert!(validate_email("jane.doe+scan@mail.example.co.uk").is_ok());
        assert!(validate_email("jane@").is_err());
        assert!(validate_email("jane.example.org").is_err());
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("ja ne@example.org").is_err());
    }
}
