//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::DatabaseError;
use crate::imaging::UploadError;
use crate::report::RenderError;
use crate::session::SessionError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No analysis in this session")]
    NoAnalysis,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::InvalidUpload(detail) => {
                (StatusCode::BAD_REQUEST, "INVALID_UPLOAD", detail.clone())
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username/email or password".to_string(),
            ),
            ApiError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                "EMAIL_NOT_VERIFIED",
                "Please verify your email address before logging in".to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                "INVALID_TOKEN",
                "Token is invalid or has expired".to_string(),
            ),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "ACCOUNT_EXISTS", detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::NoAnalysis => (
                StatusCode::CONFLICT,
                "NO_ANALYSIS",
                "No analysis available. Upload an image first".to_string(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::AnalysisFailed(detail) => {
                tracing::error!(detail, "Analysis failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "ANALYSIS_FAILED",
                    "The analysis service is unavailable, please try again later".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::BadRequest(msg),
            e @ AuthError::AccountExists(_) => ApiError::Conflict(e.to_string()),
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::EmailNotVerified => ApiError::EmailNotVerified,
            AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::Database(e) => ApiError::from(e),
            AuthError::Crypto(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => {
                ApiError::NotFound(format!("{entity_type} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::InvalidUpload(err.to_string())
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Internal(format!("render: {err}"))
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn code_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let (status, json) = code_of(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn status_and_code_table() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (ApiError::InvalidUpload("x".into()), StatusCode::BAD_REQUEST, "INVALID_UPLOAD"),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            (ApiError::EmailNotVerified, StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED"),
            (ApiError::InvalidToken, StatusCode::BAD_REQUEST, "INVALID_TOKEN"),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT, "ACCOUNT_EXISTS"),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ApiError::NoAnalysis, StatusCode::CONFLICT, "NO_ANALYSIS"),
            (ApiError::AnalysisFailed("x".into()), StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED"),
        ];
        for (err, status, code) in cases {
            let (got_status, json) = code_of(err).await;
            assert_eq!(got_status, status, "{code}");
            assert_eq!(json["error"]["code"], code);
        }
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, json) = code_of(ApiError::Internal("db path /secret".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn auth_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(AuthError::AccountExists("email")),
            ApiError::Conflict(msg) if msg.contains("email")
        ));
        assert!(matches!(
            ApiError::from(AuthError::Validation("too short".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(ApiError::from(AuthError::InvalidToken), ApiError::InvalidToken));
    }

    #[test]
    fn upload_error_maps_to_invalid_upload() {
        let err = ApiError::from(UploadError::Empty);
        assert!(matches!(err, ApiError::InvalidUpload(_)));
    }
}
