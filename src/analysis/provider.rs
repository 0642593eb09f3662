use std::sync::Arc;

use super::{AnalysisRequest, GeminiProvider, LlmError, OllamaProvider};
use crate::config::{LlmConfig, ProviderKind};

/// A backend that produces analysis text for one image.
pub trait AnalysisProvider: Send + Sync {
    /// Short name recorded with every result (`gemini`, `ollama`, ...).
    fn name(&self) -> &str;

    fn analyze(&self, request: &AnalysisRequest) -> Result<String, LlmError>;
}

/// Build the configured provider.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn AnalysisProvider>, LlmError> {
    let provider: Arc<dyn AnalysisProvider> = match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
    };
    Ok(provider)
}

/// Provider that replays a scripted sequence of results.
#[cfg(test)]
pub struct MockProvider {
    script: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Always answers with `text`.
    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string()); 16])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl AnalysisProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn analyze(&self, _request: &AnalysisRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::MalformedResponse("script exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn llm_config(provider: ProviderKind) -> LlmConfig {
        LlmConfig {
            provider,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".into(),
            gemini_endpoint: "https://generativelanguage.googleapis.com".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llava".into(),
            ollama_send_image: true,
            timeout_secs: 5,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            fallback_enabled: true,
        }
    }

    #[test]
    fn builds_configured_provider() {
        assert_eq!(build_provider(&llm_config(ProviderKind::Gemini)).unwrap().name(), "gemini");
        assert_eq!(build_provider(&llm_config(ProviderKind::Ollama)).unwrap().name(), "ollama");
    }

    #[test]
    fn mock_replays_script_in_order() {
        let mock = MockProvider::new(vec![Err(LlmError::Timeout(1)), Ok("done".into())]);
        let request = crate::analysis::sample_request();
        assert!(mock.analyze(&request).is_err());
        assert_eq!(mock.analyze(&request).unwrap(), "done");
        assert!(mock.analyze(&request).is_err());
        assert_eq!(mock.calls(), 3);
    }
}
