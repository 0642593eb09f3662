//! HTTP API.
//!
//! Exposes account management, image analysis, report history and report
//! downloads as JSON/multipart endpoints. Routes are nested under `/api/`
//! and protected by a middleware stack: Rate Limit → Auth → Handler.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
