use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{http_client, read_response_body, AnalysisProvider, AnalysisRequest, LlmError};
use crate::config::{mask_secret, LlmConfig, Secret};

/// Google Gemini `generateContent` client. The image travels inline as
/// base64 next to the language's instruction.
pub struct GeminiProvider {
    endpoint: String,
    model: String,
    api_key: Option<Secret>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        match &config.gemini_api_key {
            Some(key) => tracing::info!(
                model = %config.gemini_model,
                api_key = %mask_secret(key.expose()),
                "Gemini provider configured"
            ),
            None => tracing::warn!("GEMINI_API_KEY not set, analyses will use the fallback report"),
        }

        Ok(Self {
            endpoint: config.gemini_endpoint.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
            client: http_client(config.timeout_secs)?,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.endpoint, self.model, api_key
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn request_body(request: &AnalysisRequest) -> Result<String, LlmError> {
    let body = GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: &request.mime,
                        data: base64::engine::general_purpose::STANDARD.encode(&request.image),
                    },
                },
                Part::Text {
                    text: request.language.prompt,
                },
            ],
        }],
    };
    serde_json::to_string(&body).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn parse_response(body: &str) -> Result<String, LlmError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| LlmError::MalformedResponse("no candidate text in response".into()))?;

    if text.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty candidate text".into()));
    }
    Ok(text)
}

impl AnalysisProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY is not set".into()))?;

        let response = self
            .client
            .post(self.url(api_key.expose()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(request_body(request)?)
            .send()
            .map_err(|e| LlmError::from_transport(e, &self.endpoint, self.timeout_secs))?;

        parse_response(&read_response_body(response)?)
    }
}
