use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{ProfileUpdate, UserProfile};

pub fn get_profile(conn: &Connection, user_id: &Uuid) -> Result<Option<UserProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT first_name, last_name, dob, patient_id, gender, phone, medical_history, medications
             FROM user_profiles WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(UserProfile {
                    user_id: *user_id,
                    first_name: row.get(0)?,
                    last_name: row.get(1)?,
                    dob: row.get(2)?,
                    patient_id: row.get(3)?,
                    gender: row.get(4)?,
                    phone: row.get(5)?,
                    medical_history: row.get(6)?,
                    medications: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

/// Insert or replace the user's profile row.
pub fn upsert_profile(
    conn: &Connection,
    user_id: &Uuid,
    update: &ProfileUpdate,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO user_profiles
            (user_id, first_name, last_name, dob, patient_id, gender, phone, medical_history, medications, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            dob = excluded.dob,
            patient_id = excluded.patient_id,
            gender = excluded.gender,
            phone = excluded.phone,
            medical_history = excluded.medical_history,
            medications = excluded.medications,
            updated_at = excluded.updated_at",
        params![
            user_id.to_string(),
            update.first_name,
            update.last_name,
            update.dob,
            update.patient_id,
            update.gender,
            update.phone,
            update.medical_history,
            update.medications,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::test_support::seed_user;

    #[test]
    fn upsert_overwrites_existing_profile() {
        let conn = open_memory_database().unwrap();
        let id = seed_user(&conn, "jane");

        let update = ProfileUpdate {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            dob: "1980-04-02".into(),
            medications: "Metformin 500mg".into(),
            ..Default::default()
        };
        upsert_profile(&conn, &id, &update).unwrap();

        let profile = get_profile(&conn, &id).unwrap().unwrap();
        assert_eq!(profile.full_name(), "Jane Doe");
        assert_eq!(profile.medications, "Metformin 500mg");

        upsert_profile(&conn, &id, &ProfileUpdate::default()).unwrap();
        let cleared = get_profile(&conn, &id).unwrap().unwrap();
        assert_eq!(cleared.first_name, "");

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn profile_for_unknown_user_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_profile(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn upsert_for_unknown_user_violates_foreign_key() {
        let conn = open_memory_database().unwrap();
        let err = upsert_profile(&conn, &Uuid::new_v4(), &ProfileUpdate::default()).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
