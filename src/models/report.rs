use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted analysis. Reports are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub language: String,
    pub created_at: NaiveDateTime,
}

/// Listing row for the report history (content omitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub title: String,
    pub language: String,
    pub created_at: NaiveDateTime,
}
