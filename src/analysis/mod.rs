//! Image analysis through a hosted or local LLM.
//!
//! Providers turn an [`AnalysisRequest`] into free text. [`AnalysisRunner`]
//! wraps a provider with bounded retry and the metadata-only fallback.

pub mod fallback;
pub mod gemini;
pub mod language;
pub mod ollama;
pub mod provider;
pub mod runner;

pub use fallback::*;
pub use gemini::*;
pub use language::*;
pub use ollama::*;
pub use provider::*;
pub use runner::*;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::imaging::ImageMetadata;

/// Longest provider error body kept in messages and logs.
const MAX_ERROR_BODY: usize = 500;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Cannot reach LLM service at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("LLM quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::MalformedResponse(_) => true,
            LlmError::Status { status, .. } => *status >= 500,
            LlmError::QuotaExceeded(_) | LlmError::NotConfigured(_) => false,
        }
    }

    /// Classify a non-success response. Quota exhaustion is recognized by
    /// status 429 or by the provider's error code in the body.
    pub fn from_status(status: u16, body: String) -> Self {
        let body = truncate(body.trim(), MAX_ERROR_BODY);
        if status == 429
            || body.contains("RESOURCE_EXHAUSTED")
            || body.contains("insufficient_quota")
        {
            LlmError::QuotaExceeded(body)
        } else {
            LlmError::Status { status, body }
        }
    }

    /// Map a transport failure. The URL is stripped because the Gemini key
    /// travels in the query string.
    pub(crate) fn from_transport(e: reqwest::Error, target: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(timeout_secs)
        } else if e.is_connect() {
            LlmError::Connection(target.to_string())
        } else {
            LlmError::Connection(format!("{target}: {}", e.without_url()))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Read a provider response, turning non-success statuses into errors.
pub(crate) fn read_response_body(
    response: reqwest::blocking::Response,
) -> Result<String, LlmError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| LlmError::MalformedResponse(e.without_url().to_string()))?;
    if !status.is_success() {
        return Err(LlmError::from_status(status.as_u16(), body));
    }
    Ok(body)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::NotConfigured(format!("HTTP client: {e}")))
}

/// One image to analyze.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    pub mime: String,
    pub metadata: ImageMetadata,
    pub language: &'static Language,
}

/// An analysis held in the session workspace until logout.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub state: AttemptState,
    pub attempts: u32,
    pub provider: String,
    pub language: String,
    pub created_at: NaiveDateTime,
}

/// A small PNG request in English.
#[cfg(test)]
pub(crate) fn sample_request() -> AnalysisRequest {
    AnalysisRequest {
        image: crate::imaging::test_images::png(4, 4),
        mime: "image/png".into(),
        metadata: ImageMetadata {
            width: 4,
            height: 4,
            color_mode: "RGB".into(),
            format: "PNG".into(),
        },
        language: &LANGUAGES[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(LlmError::Connection("x".into()).is_retryable());
        assert!(LlmError::Timeout(5).is_retryable());
        assert!(LlmError::MalformedResponse("x".into()).is_retryable());
        assert!(LlmError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!LlmError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::QuotaExceeded("x".into()).is_retryable());
        assert!(!LlmError::NotConfigured("x".into()).is_retryable());
    }

    #[test]
    fn status_429_is_quota() {
        assert!(matches!(
            LlmError::from_status(429, "slow down".into()),
            LlmError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn quota_codes_in_body_detected() {
        let gemini = r#"{"error":{"code":403,"status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(LlmError::from_status(403, gemini.into()), LlmError::QuotaExceeded(_)));

        let openai = r#"{"error":{"type":"insufficient_quota"}}"#;
        assert!(matches!(LlmError::from_status(400, openai.into()), LlmError::QuotaExceeded(_)));
    }

    #[test]
    fn plain_status_kept() {
        match LlmError::from_status(500, "  boom ".into()) {
            LlmError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn long_error_bodies_truncated() {
        let err = LlmError::from_status(500, "é".repeat(2_000));
        let LlmError::Status { body, .. } = err else {
            panic!("expected status error");
        };
        assert_eq!(body.chars().count(), MAX_ERROR_BODY + 1);
        assert!(body.ends_with('…'));
    }
}
