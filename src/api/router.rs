//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! - protected routes: auth validator → rate limiter keyed by user
//! - public routes: rate limiter keyed by client IP

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::app_state::AppState;

/// Room for the multipart framing and text fields around the image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(app: Arc<AppState>) -> Router {
    build_router(ApiContext::new(app))
}

fn build_router(ctx: ApiContext) -> Router {
    let upload_limit = ctx.app.config.max_upload_bytes + MULTIPART_OVERHEAD;

    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Rate limit (innermost) → Handler
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route(
            "/profile",
            get(endpoints::profile::get).put(endpoints::profile::update),
        )
        .route(
            "/analysis",
            post(endpoints::analysis::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/analysis/current", get(endpoints::analysis::current))
        .route("/reports", get(endpoints::reports::list))
        .route("/reports/:id", get(endpoints::reports::detail))
        .route("/export/:format", get(endpoints::export::download))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited only, no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/languages", get(endpoints::languages::list))
        .route("/auth/signup", post(endpoints::auth::signup))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/verify-email", get(endpoints::auth::verify_email))
        .route(
            "/auth/resend-verification",
            post(endpoints::auth::resend_verification),
        )
        .route(
            "/auth/password-reset/request",
            post(endpoints::auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(endpoints::auth::confirm_password_reset),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let mut router = Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&ctx.app.config.public_url) {
        router = router.layer(cors);
    }
    router
}

/// Allow the web client served from the public URL to call the API.
fn cors_layer(public_url: &str) -> Option<CorsLayer> {
    match HeaderValue::from_str(public_url) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        ),
        Err(_) => {
            tracing::warn!(public_url, "Public URL is not a valid origin, CORS disabled");
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}
