//! Report download.
//!
//! `GET /api/export/:format` renders the session analysis;
//! `GET /api/export/:format?report_id=` renders a persisted report.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::api::endpoints::reports::parse_report_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::imaging::UploadedImage;
use crate::models::PatientInfo;
use crate::report::{self, ExportFormat, ReportImage, ReportInput};
use crate::session::RequestContext;

#[derive(Deserialize)]
pub struct ExportQuery {
    pub report_id: Option<String>,
}

/// Owned inputs for one render, moved onto the blocking pool.
struct ExportJob {
    analysis: String,
    patient: PatientInfo,
    image: Option<UploadedImage>,
    language: String,
    generated_at: NaiveDateTime,
    report_id: String,
}

impl ExportJob {
    fn input(&self) -> ReportInput<'_> {
        ReportInput {
            analysis: &self.analysis,
            patient: &self.patient,
            image: self.image.as_ref().map(|i| ReportImage {
                bytes: &i.bytes,
                mime: &i.mime,
            }),
            language: &self.language,
            generated_at: self.generated_at,
            report_id: &self.report_id,
        }
    }
}

/// `GET /api/export/:format`
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
    Path(format): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = format.parse().map_err(ApiError::BadRequest)?;

    let workspace = ctx
        .app
        .sessions
        .with_workspace(&caller.token_hash, |ws| ws.clone())?
        .ok_or(ApiError::Unauthorized)?;

    let job = match query.report_id.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(raw) => {
            let id = parse_report_id(raw)?;
            let user_id = caller.user_id;
            let stored = ctx
                .with_db(move |_, conn| {
                    db::get_report(conn, &user_id, &id)?
                        .ok_or_else(|| ApiError::NotFound("Report not found".into()))
                })
                .await?;

            // Patient and image only survive in the session that produced the report.
            let (patient, image) = if workspace.stored_report == Some(stored.id) {
                (workspace.patient, workspace.image)
            } else {
                (PatientInfo::default(), None)
            };
            ExportJob {
                report_id: report::report_id(stored.created_at, &stored.id),
                analysis: stored.content,
                patient,
                image,
                language: stored.language,
                generated_at: stored.created_at,
            }
        }
        None => {
            let analysis = workspace.analysis.ok_or(ApiError::NoAnalysis)?;
            ExportJob {
                report_id: workspace
                    .report_id
                    .unwrap_or_else(|| format!("MR-{}", analysis.created_at.format("%Y%m%d"))),
                analysis: analysis.text,
                patient: workspace.patient,
                image: workspace.image,
                language: analysis.language,
                generated_at: analysis.created_at,
            }
        }
    };

    let file_name = format.file_name(&job.language);
    let bytes = ctx
        .blocking(move |app| Ok(report::render(format, &job.input(), &app.render_options())?))
        .await?;

    tracing::info!(
        user_id = %caller.user_id,
        format = format.extension(),
        size = bytes.len(),
        "Report exported"
    );

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|e| ApiError::Internal(format!("content-disposition: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
