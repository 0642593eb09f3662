//! Report history endpoints.
//!
//! `GET /api/reports`: newest first, content omitted
//! `GET /api/reports/:id`: one report, owner only

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{Report, ReportSummary};
use crate::session::RequestContext;

pub(crate) fn parse_report_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid report id".into()))
}

/// `GET /api/reports`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
) -> Result<Json<Vec<ReportSummary>>, ApiError> {
    let reports = ctx
        .with_db(move |_, conn| Ok(db::list_reports(conn, &caller.user_id)?))
        .await?;
    Ok(Json(reports))
}

/// `GET /api/reports/:id`. Reports of other users read as missing.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report_id = parse_report_id(&id)?;
    let report = ctx
        .with_db(move |_, conn| {
            db::get_report(conn, &caller.user_id, &report_id)?
                .ok_or_else(|| ApiError::NotFound("Report not found".into()))
        })
        .await?;
    Ok(Json(report))
}
