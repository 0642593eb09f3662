use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::UserProfile;

/// Maximum characters accepted for any patient field on a report.
pub const MAX_PATIENT_FIELD: usize = 500;

/// Patient block embedded in a generated report. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub patient_id: String,
    pub details: PatientDetails,
}

/// The two report-card variants: clinical indications, or age and sex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatientDetails {
    Indications { indications: String },
    Demographics { age: String, sex: String },
}

impl Default for PatientDetails {
    fn default() -> Self {
        Self::Indications {
            indications: String::new(),
        }
    }
}

impl PatientInfo {
    /// Ordered label/value pairs. Every renderer prints exactly this list.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![("Name", self.name.as_str()), ("Patient ID", self.patient_id.as_str())];
        match &self.details {
            PatientDetails::Indications { indications } => {
                fields.push(("Indications", indications.as_str()));
            }
            PatientDetails::Demographics { age, sex } => {
                fields.push(("Age", age.as_str()));
                fields.push(("Sex", sex.as_str()));
            }
        }
        fields
    }

    /// Patient block built from the account's stored profile.
    pub fn from_profile(profile: &UserProfile, today: NaiveDate) -> Self {
        Self {
            name: profile.full_name(),
            patient_id: profile.patient_id.trim().to_string(),
            details: PatientDetails::Demographics {
                age: profile
                    .age_on(today)
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
                sex: profile.gender.trim().to_string(),
            },
        }
    }
}

/// Raw patient fields as submitted with an upload. Any field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub name: Option<String>,
    pub patient_id: Option<String>,
    pub indications: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
}

impl PatientForm {
    /// Validate lengths and pick the variant. Age or sex selects the
    /// demographics card; otherwise the indications card is used.
    /// Missing fields become empty strings.
    pub fn into_patient_info(self) -> Result<PatientInfo, String> {
        let clean = |label: &str, value: Option<String>| -> Result<String, String> {
            let value = value.unwrap_or_default().trim().to_string();
            if value.chars().count() > MAX_PATIENT_FIELD {
                return Err(format!("{label} exceeds {MAX_PATIENT_FIELD} characters"));
            }
            Ok(value)
        };

        let demographics = self.age.as_deref().is_some_and(|v| !v.trim().is_empty())
            || self.sex.as_deref().is_some_and(|v| !v.trim().is_empty());

        let details = if demographics {
            PatientDetails::Demographics {
                age: clean("age", self.age)?,
                sex: clean("sex", self.sex)?,
            }
        } else {
            PatientDetails::Indications {
                indications: clean("indications", self.indications)?,
            }
        };

        Ok(PatientInfo {
            name: clean("name", self.name)?,
            patient_id: clean("patient_id", self.patient_id)?,
            details,
        })
    }
}
