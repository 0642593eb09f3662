use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{fallback_report, AnalysisProvider, AnalysisRequest, LlmError};
use crate::config::LlmConfig;

/// Where a run stands. `Attempting(n)` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Attempting(u32),
    Succeeded,
    FallbackUsed,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Attempting(_))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub fallback_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            fallback_enabled: true,
        }
    }
}

impl From<&LlmConfig> for RetryPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay,
            fallback_enabled: config.fallback_enabled,
        }
    }
}

impl RetryPolicy {
    /// Sleep taken after failed attempt `n`: `base * 2^(n-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Next state after attempt `n` produced `result`.
    pub fn transition(&self, attempt: u32, result: &Result<String, LlmError>) -> AttemptState {
        match result {
            Ok(_) => AttemptState::Succeeded,
            Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                AttemptState::Attempting(attempt + 1)
            }
            Err(_) if self.fallback_enabled => AttemptState::FallbackUsed,
            Err(_) => AttemptState::Failed,
        }
    }
}

/// Result of a complete run. `text` is `None` only when `state` is `Failed`.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub state: AttemptState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub provider: String,
    pub text: Option<String>,
}

pub struct AnalysisRunner {
    provider: Arc<dyn AnalysisProvider>,
    policy: RetryPolicy,
}

impl AnalysisRunner {
    pub fn new(provider: Arc<dyn AnalysisProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Drive the attempt loop to a terminal state. Blocks, including the
    /// backoff sleeps.
    pub fn run(&self, request: &AnalysisRequest) -> AnalysisOutcome {
        let span = tracing::info_span!(
            "analysis",
            provider = %self.provider.name(),
            language = request.language.code
        );
        let _guard = span.enter();

        let mut state = AttemptState::Attempting(1);
        let mut attempts = 0;
        let mut text = None;
        let mut last_error: Option<LlmError> = None;

        while let AttemptState::Attempting(n) = state {
            attempts = n;
            let result = self.provider.analyze(request);
            state = self.policy.transition(n, &result);

            match result {
                Ok(t) => text = Some(t),
                Err(e) => {
                    tracing::warn!(attempt = n, max = self.policy.max_attempts, error = %e, "Analysis attempt failed");
                    last_error = Some(e);
                }
            }

            if let AttemptState::Attempting(_) = state {
                std::thread::sleep(self.policy.delay_after(n));
            }
        }

        match state {
            AttemptState::Succeeded => {
                tracing::info!(attempts, "Analysis succeeded");
            }
            AttemptState::FallbackUsed => {
                tracing::warn!(attempts, "Provider unavailable, using fallback report");
                text = Some(fallback_report(&request.metadata));
            }
            _ => {
                tracing::error!(attempts, "Analysis failed with fallback disabled");
            }
        }

        AnalysisOutcome {
            state,
            attempts,
            last_error: last_error.map(|e| e.to_string()),
            provider: self.provider.name().to_string(),
            text,
        }
    }

    /// Run on the blocking pool.
    pub async fn run_blocking(
        self: Arc<Self>,
        request: AnalysisRequest,
    ) -> Result<AnalysisOutcome, tokio::task::JoinError> {
        tokio::task::spawn_blocking(move || self.run(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{sample_request, MockProvider, FALLBACK_HEADING};

    fn fast_policy(max_attempts: u32, fallback_enabled: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            fallback_enabled,
        }
    }

    fn runner(mock: Arc<MockProvider>, policy: RetryPolicy) -> AnalysisRunner {
        AnalysisRunner::new(mock, policy)
    }

    #[test]
    fn default_backoff_is_one_then_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn transitions() {
        let policy = RetryPolicy::default();
        let retryable = Err(LlmError::Timeout(1));
        let quota = Err(LlmError::QuotaExceeded("429".into()));

        assert_eq!(policy.transition(1, &Ok("x".into())), AttemptState::Succeeded);
        assert_eq!(policy.transition(1, &retryable), AttemptState::Attempting(2));
        assert_eq!(policy.transition(3, &retryable), AttemptState::FallbackUsed);
        assert_eq!(policy.transition(1, &quota), AttemptState::FallbackUsed);

        let strict = RetryPolicy {
            fallback_enabled: false,
            ..RetryPolicy::default()
        };
        assert_eq!(strict.transition(3, &retryable), AttemptState::Failed);
    }

    #[test]
    fn first_attempt_success() {
        let mock = Arc::new(MockProvider::answering("Normal chest X-ray."));
        let outcome = runner(mock.clone(), fast_policy(3, true)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::Succeeded);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.text.as_deref(), Some("Normal chest X-ray."));
        assert_eq!(outcome.provider, "mock");
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn retries_transient_errors_then_succeeds() {
        let mock = Arc::new(MockProvider::new(vec![
            Err(LlmError::Connection("localhost".into())),
            Err(LlmError::Status { status: 503, body: String::new() }),
            Ok("Recovered".into()),
        ]));
        let outcome = runner(mock.clone(), fast_policy(3, true)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::Succeeded);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.text.as_deref(), Some("Recovered"));
        assert!(outcome.last_error.unwrap().contains("503"));
    }

    #[test]
    fn exhausted_attempts_use_fallback() {
        let mock = Arc::new(MockProvider::new(vec![Err(LlmError::Timeout(1)); 5]));
        let outcome = runner(mock.clone(), fast_policy(3, true)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::FallbackUsed);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(mock.calls(), 3);
        let text = outcome.text.unwrap();
        assert!(text.starts_with(FALLBACK_HEADING));
        assert!(text.contains("4x4 pixels"));
    }

    #[test]
    fn quota_goes_straight_to_fallback() {
        let mock = Arc::new(MockProvider::new(vec![
            Err(LlmError::QuotaExceeded("RESOURCE_EXHAUSTED".into())),
            Ok("never reached".into()),
        ]));
        let outcome = runner(mock.clone(), fast_policy(3, true)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::FallbackUsed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn client_error_not_retried() {
        let mock = Arc::new(MockProvider::new(vec![Err(LlmError::Status {
            status: 400,
            body: "bad request".into(),
        })]));
        let outcome = runner(mock.clone(), fast_policy(3, false)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::Failed);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.text.is_none());
        assert!(outcome.last_error.unwrap().contains("bad request"));
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let mock = Arc::new(MockProvider::new(vec![Err(LlmError::Timeout(1)), Ok("late".into())]));
        let outcome = runner(mock.clone(), fast_policy(1, true)).run(&sample_request());
        assert_eq!(outcome.state, AttemptState::FallbackUsed);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn run_blocking_off_the_runtime() {
        let mock = Arc::new(MockProvider::answering("async ok"));
        let runner = Arc::new(runner(mock, fast_policy(3, true)));
        let outcome = runner.run_blocking(sample_request()).await.unwrap();
        assert_eq!(outcome.text.as_deref(), Some("async ok"));
    }

    #[test]
    fn terminal_states() {
        assert!(!AttemptState::Attempting(2).is_terminal());
        assert!(AttemptState::Succeeded.is_terminal());
        assert!(AttemptState::FallbackUsed.is_terminal());
        assert!(AttemptState::Failed.is_terminal());
    }
}
