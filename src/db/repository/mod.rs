//! Repository layer: entity-scoped database operations as free functions
//! over a borrowed `Connection`.

mod profile;
mod report;
mod user;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

pub use profile::*;
pub use report::*;
pub use user::*;

/// Storage format for every timestamp column. Lexicographic order matches
/// chronological order, which the token expiry checks rely on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(field: &str, raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| {
        DatabaseError::CorruptedValue {
            field: field.into(),
            value: raw.into(),
        }
    })
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::CorruptedValue {
        field: field.into(),
        value: raw.into(),
    })
}
