//! Image analysis endpoints.
//!
//! `POST /api/analysis`: multipart upload, runs the analysis, stores it in
//! the session workspace and the report history.
//! `GET /api/analysis/current`: the analysis held in the session.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{
    find_language, AnalysisRequest, AnalysisResult, AttemptState, DEFAULT_LANGUAGE,
};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::imaging::{self, ImageMetadata, UploadError};
use crate::models::{PatientForm, PatientInfo, Report};
use crate::report;
use crate::session::{RequestContext, Workspace};

/// Multipart fields of an analysis upload.
#[derive(Default)]
struct UploadForm {
    image: Option<(Vec<u8>, Option<String>)>,
    language: Option<String>,
    patient: PatientForm,
    use_profile: bool,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub report_id: Uuid,
    /// Identifier printed on exported documents.
    pub document_id: String,
    pub analysis: AnalysisResult,
    pub patient: PatientInfo,
    pub image: ImageMetadata,
}

#[derive(Serialize)]
pub struct CurrentAnalysis {
    pub report_id: Option<Uuid>,
    pub document_id: Option<String>,
    pub analysis: AnalysisResult,
    pub patient: PatientInfo,
    pub image: Option<ImageMetadata>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.image = Some((bytes.to_vec(), content_type));
            }
            "language" => form.language = Some(field.text().await?),
            "name" => form.patient.name = Some(field.text().await?),
            "patient_id" => form.patient.patient_id = Some(field.text().await?),
            "indications" => form.patient.indications = Some(field.text().await?),
            "age" => form.patient.age = Some(field.text().await?),
            "sex" => form.patient.sex = Some(field.text().await?),
            "use_profile" => {
                let value = field.text().await?;
                form.use_profile = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                );
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Title stored in the report history.
fn report_title(patient: &PatientInfo, at: NaiveDateTime) -> String {
    let stamp = at.format("%Y-%m-%d %H:%M");
    if patient.name.is_empty() {
        format!("Image analysis {stamp}")
    } else {
        format!("Image analysis {stamp} ({})", patient.name)
    }
}

/// `POST /api/analysis`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let form = read_form(multipart).await?;

    let code = form
        .language
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_ascii_lowercase();
    let language = find_language(&code)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported language: {code}")))?;

    let (bytes, declared_mime) = form.image.ok_or(UploadError::Empty)?;
    let max_bytes = ctx.app.config.max_upload_bytes;
    let image = ctx
        .blocking(move |_| Ok(imaging::inspect_upload(bytes, declared_mime.as_deref(), max_bytes)?))
        .await?;

    let patient = if form.use_profile {
        let user_id = caller.user_id;
        let profile = ctx
            .with_db(move |_, conn| Ok(db::get_profile(conn, &user_id)?))
            .await?
            .unwrap_or_default();
        PatientInfo::from_profile(&profile, chrono::Local::now().date_naive())
    } else {
        form.patient.into_patient_info().map_err(ApiError::BadRequest)?
    };

    let request = AnalysisRequest {
        image: image.bytes.clone(),
        mime: image.mime.clone(),
        metadata: image.metadata.clone(),
        language,
    };
    let outcome = ctx
        .app
        .runner
        .clone()
        .run_blocking(request)
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task: {e}")))?;

    let text = match (outcome.state, outcome.text) {
        (AttemptState::Succeeded | AttemptState::FallbackUsed, Some(text)) => text,
        _ => {
            return Err(ApiError::AnalysisFailed(
                outcome
                    .last_error
                    .unwrap_or_else(|| "no analysis produced".into()),
            ))
        }
    };

    let created_at = chrono::Local::now().naive_local();
    let analysis = AnalysisResult {
        text,
        state: outcome.state,
        attempts: outcome.attempts,
        provider: outcome.provider,
        language: language.code.to_string(),
        created_at,
    };

    let stored = Report {
        id: Uuid::new_v4(),
        user_id: caller.user_id,
        title: report_title(&patient, created_at),
        content: analysis.text.clone(),
        language: analysis.language.clone(),
        created_at,
    };
    let report_uuid = stored.id;
    ctx.with_db(move |_, conn| Ok(db::insert_report(conn, &stored)?))
        .await?;

    let document_id = report::report_id(created_at, &report_uuid);
    let response = AnalysisResponse {
        report_id: report_uuid,
        document_id: document_id.clone(),
        analysis: analysis.clone(),
        patient: patient.clone(),
        image: image.metadata.clone(),
    };

    ctx.app
        .sessions
        .with_workspace(&caller.token_hash, move |ws| {
            *ws = Workspace {
                analysis: Some(analysis),
                image: Some(image),
                patient,
                report_id: Some(document_id),
                stored_report: Some(report_uuid),
            };
        })?
        .ok_or(ApiError::Unauthorized)?;

    tracing::info!(
        user_id = %caller.user_id,
        report_id = %report_uuid,
        state = ?response.analysis.state,
        attempts = response.analysis.attempts,
        "Analysis stored"
    );

    Ok(Json(response))
}

/// `GET /api/analysis/current`
pub async fn current(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
) -> Result<Json<CurrentAnalysis>, ApiError> {
    let workspace = ctx
        .app
        .sessions
        .with_workspace(&caller.token_hash, |ws| ws.clone())?
        .ok_or(ApiError::Unauthorized)?;

    let analysis = workspace.analysis.ok_or(ApiError::NoAnalysis)?;
    Ok(Json(CurrentAnalysis {
        report_id: workspace.stored_report,
        document_id: workspace.report_id,
        analysis,
        patient: workspace.patient,
        image: workspace.image.map(|i| i.metadata),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientDetails;

    fn at() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-03-01 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn title_includes_patient_name_when_known() {
        let patient = PatientInfo {
            name: "Jane Doe".into(),
            patient_id: String::new(),
            details: PatientDetails::default(),
        };
        assert_eq!(report_title(&patient, at()), "Image analysis 2026-03-01 09:30 (Jane Doe)");
        assert_eq!(
            report_title(&PatientInfo::default(), at()),
            "Image analysis 2026-03-01 09:30"
        );
    }
}
