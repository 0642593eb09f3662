//! Profile endpoints.
//!
//! `GET /api/profile`, `PUT /api/profile`: protected, caller's own profile only.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{ProfileUpdate, UserProfile};
use crate::session::RequestContext;

/// `GET /api/profile`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = ctx
        .with_db(move |_, conn| {
            // The row is created at sign-up; an account without one reads as empty.
            Ok(db::get_profile(conn, &caller.user_id)?.unwrap_or_else(|| UserProfile {
                user_id: caller.user_id,
                ..Default::default()
            }))
        })
        .await?;
    Ok(Json(profile))
}

/// `PUT /api/profile`: validate and store the submitted form.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
    Json(form): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let update = form.validate().map_err(ApiError::BadRequest)?;

    let profile = ctx
        .with_db(move |_, conn| {
            db::upsert_profile(conn, &caller.user_id, &update)?;
            db::get_profile(conn, &caller.user_id)?
                .ok_or_else(|| ApiError::Internal("profile missing after update".into()))
        })
        .await?;

    tracing::info!(user_id = %profile.user_id, "Profile updated");
    Ok(Json(profile))
}
