use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum characters for short profile fields (names, ids, phone).
const MAX_SHORT_FIELD: usize = 255;
/// Maximum characters for free-text fields (history, medications).
const MAX_LONG_FIELD: usize = 10_000;

/// One profile row per user, created empty at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth, `YYYY-MM-DD` or empty.
    pub dob: String,
    pub patient_id: String,
    pub gender: String,
    pub phone: String,
    pub medical_history: String,
    pub medications: String,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Age in whole years on `today`, if the date of birth parses.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = NaiveDate::parse_from_str(self.dob.trim(), "%Y-%m-%d").ok()?;
        if dob > today {
            return None;
        }
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// Profile form payload. Missing fields become empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub patient_id: String,
    pub gender: String,
    pub phone: String,
    pub medical_history: String,
    pub medications: String,
}

impl ProfileUpdate {
    /// Trim every field and check lengths and the date format.
    pub fn validate(mut self) -> Result<Self, String> {
        for (label, value, max) in [
            ("first_name", &mut self.first_name, MAX_SHORT_FIELD),
            ("last_name", &mut self.last_name, MAX_SHORT_FIELD),
            ("dob", &mut self.dob, MAX_SHORT_FIELD),
            ("patient_id", &mut self.patient_id, MAX_SHORT_FIELD),
            ("gender", &mut self.gender, 50),
            ("phone", &mut self.phone, MAX_SHORT_FIELD),
            ("medical_history", &mut self.medical_history, MAX_LONG_FIELD),
            ("medications", &mut self.medications, MAX_LONG_FIELD),
        ] {
            *value = value.trim().to_string();
            if value.chars().count() > max {
                return Err(format!("{label} exceeds {max} characters"));
            }
        }

        if !self.dob.is_empty() && NaiveDate::parse_from_str(&self.dob, "%Y-%m-%d").is_err() {
            return Err("dob must be formatted YYYY-MM-DD".into());
        }

        Ok(self)
    }
}
