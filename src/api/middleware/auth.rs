//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! session store and injects `RequestContext` into request extensions for
//! downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Token from an `Authorization: Bearer` header, if present.
fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a live session.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `RequestContext` and marks the response `no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;

    let request_ctx = ctx
        .app
        .sessions
        .authenticate(token)?
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(request_ctx);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
