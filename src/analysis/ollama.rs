use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{http_client, read_response_body, AnalysisProvider, AnalysisRequest, LlmError};
use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a medical imaging expert. Generate a professional report including: \
1. Image type, 2. Notable findings, 3. Possible conditions, 4. Recommendations.";

/// Sampling temperature sent with every chat request.
const TEMPERATURE: f32 = 0.7;

/// Local Ollama `/api/chat` client.
///
/// Vision models get the image itself. Text-only models
/// (`OLLAMA_SEND_IMAGE=false`) get a description of its properties instead.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    send_image: bool,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        tracing::info!(
            url = %config.ollama_url,
            model = %config.ollama_model,
            send_image = config.ollama_send_image,
            "Ollama provider configured"
        );
        Ok(Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            send_image: config.ollama_send_image,
            client: http_client(config.timeout_secs)?,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Instruction for a model that cannot see the image.
fn text_proxy_prompt(request: &AnalysisRequest) -> String {
    let m = &request.metadata;
    format!(
        "{}\n\nThe image itself is not available. Base your analysis on these image properties:\n\
         - Dimensions: {}x{} pixels\n\
         - Color mode: {}\n\
         - Format: {}\n\
         - Content: Medical diagnostic image",
        request.language.prompt, m.width, m.height, m.color_mode, m.format
    )
}

fn chat_request<'a>(model: &'a str, send_image: bool, request: &AnalysisRequest) -> ChatRequest<'a> {
    let user = if send_image {
        ChatMessage {
            role: "user",
            content: request.language.prompt.to_string(),
            images: vec![base64::engine::general_purpose::STANDARD.encode(&request.image)],
        }
    } else {
        ChatMessage {
            role: "user",
            content: text_proxy_prompt(request),
            images: Vec::new(),
        }
    };

    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
                images: Vec::new(),
            },
            user,
        ],
        stream: false,
        options: ChatOptions {
            temperature: TEMPERATURE,
        },
    }
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let text = parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| LlmError::MalformedResponse("missing message in response".into()))?;
    if text.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty message content".into()));
    }
    Ok(text)
}

impl AnalysisProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = chat_request(&self.model, self.send_image, request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| LlmError::from_transport(e, &self.base_url, self.timeout_secs))?;

        parse_response(&read_response_body(response)?)
    }
}
