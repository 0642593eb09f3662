use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{NewUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, email_verified, created_at, last_login_at";

struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    email_verified: i32,
    created_at: String,
    last_login_at: Option<String>,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            email_verified: row.get(4)?,
            created_at: row.get(5)?,
            last_login_at: row.get(6)?,
        })
    }

    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: parse_uuid("users.id", &self.id)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            email_verified: self.email_verified != 0,
            created_at: parse_ts("users.created_at", &self.created_at)?,
            last_login_at: self
                .last_login_at
                .map(|s| parse_ts("users.last_login_at", &s))
                .transpose()?,
        })
    }
}

/// Insert the account and its empty profile row in one transaction.
pub fn create_user_with_profile(conn: &Connection, user: &NewUser) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (id, username, email, password_hash, email_verified, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.password_hash,
            format_ts(&user.created_at),
        ],
    )?;
    tx.execute(
        "INSERT INTO user_profiles (user_id) VALUES (?1)",
        params![user.id.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

fn query_user(
    conn: &Connection,
    where_clause: &str,
    value: &str,
) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {where_clause}");
    let row = conn
        .query_row(&sql, params![value], UserRow::from_row)
        .optional()?;
    row.map(UserRow::into_user).transpose()
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    query_user(conn, "id = ?1", &id.to_string())
}

/// Look up an account by username or email (both case-insensitive).
pub fn find_user_by_login(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<User>, DatabaseError> {
    query_user(conn, "username = ?1 OR email = ?1", identifier.trim())
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    query_user(conn, "email = ?1", email.trim())
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Store a fresh verification token hash, replacing any previous one.
pub fn set_verification_token(
    conn: &Connection,
    user_id: &Uuid,
    token_hash: &str,
    expires_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET verification_token_hash = ?2, verification_expires_at = ?3 WHERE id = ?1",
        params![user_id.to_string(), token_hash, format_ts(expires_at)],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}

/// Consume a verification token: match, expiry check, clear and mark the
/// account verified in a single statement. `None` if no live token matched.
pub fn consume_verification_token(
    conn: &Connection,
    token_hash: &str,
    now: &NaiveDateTime,
) -> Result<Option<Uuid>, DatabaseError> {
    let id: Option<String> = conn
        .query_row(
            "UPDATE users
             SET email_verified = 1, verification_token_hash = NULL, verification_expires_at = NULL
             WHERE verification_token_hash = ?1 AND verification_expires_at > ?2
             RETURNING id",
            params![token_hash, format_ts(now)],
            |row| row.get(0),
        )
        .optional()?;
    id.map(|s| parse_uuid("users.id", &s)).transpose()
}

pub fn set_reset_token(
    conn: &Connection,
    user_id: &Uuid,
    token_hash: &str,
    expires_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET reset_token_hash = ?2, reset_expires_at = ?3 WHERE id = ?1",
        params![user_id.to_string(), token_hash, format_ts(expires_at)],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}

/// Consume a reset token and store the new password hash atomically.
pub fn consume_reset_token(
    conn: &Connection,
    token_hash: &str,
    now: &NaiveDateTime,
    new_password_hash: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let id: Option<String> = conn
        .query_row(
            "UPDATE users
             SET password_hash = ?3, reset_token_hash = NULL, reset_expires_at = NULL
             WHERE reset_token_hash = ?1 AND reset_expires_at > ?2
             RETURNING id",
            params![token_hash, format_ts(now), new_password_hash],
            |row| row.get(0),
        )
        .optional()?;
    id.map(|s| parse_uuid("users.id", &s)).transpose()
}

pub fn record_login(conn: &Connection, user_id: &Uuid, at: &NaiveDateTime) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
        params![user_id.to_string(), format_ts(at)],
    )?;
    Ok(())
}
