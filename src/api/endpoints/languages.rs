//! Supported report languages.

use axum::Json;
use serde::Serialize;

use crate::analysis::{Language, DEFAULT_LANGUAGE, LANGUAGES};

#[derive(Serialize)]
pub struct LanguagesResponse {
    pub default: &'static str,
    pub languages: &'static [Language],
}

/// `GET /api/languages`
pub async fn list() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        default: DEFAULT_LANGUAGE,
        languages: LANGUAGES,
    })
}
