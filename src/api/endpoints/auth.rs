//! Account endpoints: sign-up, login, email verification, password reset.
//!
//! `POST /api/auth/signup`, `login`, `resend-verification`,
//! `password-reset/request`, `password-reset/confirm`: unprotected
//! `GET /api/auth/verify-email?token=`: unprotected, link target from the email
//! `POST /api/auth/logout`: protected

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::{self, SignupOutcome, SignupRequest};
use crate::models::AccountInfo;
use crate::session::RequestContext;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountInfo,
    /// Idle timeout of the session, in seconds.
    pub expires_in: u64,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// `POST /api/auth/signup`: create the account and send the verification link.
pub async fn signup(
    State(ctx): State<ApiContext>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupOutcome>), ApiError> {
    let outcome = ctx
        .with_db(move |app, conn| {
            Ok(auth::signup(conn, app.mailer.as_ref(), &app.auth, &request, now())?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /api/auth/login`: verify credentials and open a session.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identifier = request.identifier.trim().to_string();
    if identifier.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username/email and password are required".into(),
        ));
    }

    let user = ctx
        .with_db(move |app, conn| {
            Ok(auth::login(conn, &app.auth, &identifier, &request.password, now())?)
        })
        .await?;

    let token = ctx.app.sessions.create(user.id, &user.username)?;

    Ok(Json(LoginResponse {
        token,
        user: AccountInfo::from(&user),
        expires_in: ctx.app.config.session_idle.as_secs(),
    }))
}

/// `GET /api/auth/verify-email?token=`: consume a verification token.
pub async fn verify_email(
    State(ctx): State<ApiContext>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.with_db(move |_, conn| Ok(auth::verify_email(conn, &query.token, now())?))
        .await?;
    Ok(Json(MessageResponse {
        message: "Email verified. You can now log in.",
    }))
}

/// `POST /api/auth/resend-verification`: always succeeds so the response
/// does not reveal which addresses are registered.
pub async fn resend_verification(
    State(ctx): State<ApiContext>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = request.email.trim().to_string();
    ctx.with_db(move |app, conn| {
        Ok(auth::resend_verification(conn, app.mailer.as_ref(), &app.auth, &email, now())?)
    })
    .await?;
    Ok(Json(MessageResponse {
        message: "If the address belongs to an unverified account, a new link has been sent.",
    }))
}

/// `POST /api/auth/password-reset/request`
pub async fn request_password_reset(
    State(ctx): State<ApiContext>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = request.email.trim().to_string();
    ctx.with_db(move |app, conn| {
        Ok(auth::request_password_reset(conn, app.mailer.as_ref(), &app.auth, &email, now())?)
    })
    .await?;
    Ok(Json(MessageResponse {
        message: "If the address is registered, a reset link has been sent.",
    }))
}

/// `POST /api/auth/password-reset/confirm`
pub async fn confirm_password_reset(
    State(ctx): State<ApiContext>,
    Json(request): Json<ResetConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.with_db(move |app, conn| {
        Ok(auth::confirm_password_reset(
            conn,
            &app.auth,
            &request.token,
            &request.new_password,
            &request.confirm_password,
            now(),
        )?)
    })
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated. You can now log in.",
    }))
}

/// `POST /api/auth/logout`: drop the session and its workspace.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<RequestContext>,
) -> Result<StatusCode, ApiError> {
    ctx.app.sessions.remove(&caller.token_hash)?;
    tracing::info!(user_id = %caller.user_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}
