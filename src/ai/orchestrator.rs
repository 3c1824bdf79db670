//! Completion orchestration: provider selection, deadline, retry budget and
//! fallback to the local corpus.
//!
//! ```text
//! START ──no provider──────────────────────────────► FALLBACK
//!   │
//!   ▼
//! PROVIDER_CALL ──ok──► SUCCESS (generated_by = ai)
//!   │ error
//!   ▼
//! RETRY_PENDING ──attempts left──► PROVIDER_CALL
//!   │ budget spent
//!   ▼
//! FALLBACK (generated_by = local)
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::corpus;
use crate::ai::prompt::idea_prompt;
use crate::ai::provider::{call_provider, CompletionInput, CompletionProvider, ProviderError, ProviderKind, ProviderRegistry};

/// Pause between attempts when the retry budget allows more than one.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Where a result's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedBy {
    Ai,
    Local,
}

impl GeneratedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratedBy::Ai => "ai",
            GeneratedBy::Local => "local",
        }
    }
}

/// One idea request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub topic: Option<String>,
    pub provider: ProviderKind,
    pub max_tokens: u32,
    /// Clamped to `[0, 1]` by [`CompletionRequest::with_temperature`].
    pub temperature: f32,
    pub timeout: Duration,
}

/// A request that must not be sent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestError {
    ZeroMaxTokens,
    ZeroTimeout,
    /// Not finite or outside `[0, 1]`.
    TemperatureOutOfRange(f32),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroMaxTokens => write!(f, "max_tokens must be greater than zero"),
            Self::ZeroTimeout => write!(f, "timeout must be greater than zero"),
            Self::TemperatureOutOfRange(t) => write!(f, "temperature {t} is outside [0, 1]"),
        }
    }
}

impl std::error::Error for RequestError {}

impl CompletionRequest {
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.max_tokens == 0 {
            return Err(RequestError::ZeroMaxTokens);
        }
        if self.timeout.is_zero() {
            return Err(RequestError::ZeroTimeout);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RequestError::TemperatureOutOfRange(self.temperature));
        }
        Ok(())
    }
}

/// Generated idea with its origin.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub text: String,
    pub generated_by: GeneratedBy,
    pub topic: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrator tuning, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Provider used when a request does not name one.
    pub default_provider: ProviderKind,
    /// Overrides the provider's default when set.
    pub max_tokens: Option<u32>,
    /// Overrides the provider's default when set.
    pub temperature: Option<f32>,
    /// Deadline for a single provider call.
    pub call_timeout: Duration,
    /// Total attempts per request; 1 means no retry.
    pub max_attempts: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Groq,
            max_tokens: None,
            temperature: None,
            call_timeout: Duration::from_secs(15),
            max_attempts: 1,
        }
    }
}

pub struct Orchestrator {
    registry: ProviderRegistry,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, settings: OrchestratorSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.registry.get(kind).is_some()
    }

    pub fn available_topics(&self) -> &'static [&'static str] {
        &corpus::TOPICS
    }

    /// A request for the default provider, filled with the configured defaults.
    pub fn request(&self, topic: Option<&str>) -> CompletionRequest {
        self.request_for(self.settings.default_provider, topic)
    }

    pub fn request_for(&self, provider: ProviderKind, topic: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            topic: topic.map(str::to_string),
            provider,
            max_tokens: self.settings.max_tokens.unwrap_or(provider.default_max_tokens()),
            temperature: self
                .settings
                .temperature
                .unwrap_or(provider.default_temperature())
                .clamp(0.0, 1.0),
            timeout: self.settings.call_timeout,
        }
    }

    /// Generate an idea, falling back to the local corpus on any failure.
    pub async fn generate(&self, request: &CompletionRequest) -> CompletionResult {
        let topic = request.topic.as_deref();

        if let Err(e) = request.validate() {
            warn!("Rejected completion request: {e}");
            return self.fallback(topic);
        }

        let Some(provider) = self.registry.get(request.provider) else {
            debug!("{} not configured, using local ideas", request.provider);
            return self.fallback(topic);
        };

        let prompt = idea_prompt(topic);
        let input = CompletionInput {
            prompt: &prompt,
            system: None,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        match self.attempt(provider.as_ref(), &input, request.timeout).await {
            Ok(text) => {
                info!("💡 AI idea from {} (topic: {})", request.provider, topic.unwrap_or("random"));
                CompletionResult {
                    text,
                    generated_by: GeneratedBy::Ai,
                    topic: request.topic.clone(),
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                warn!("AI generation failed, falling back to local: {e}");
                self.fallback(topic)
            }
        }
    }

    /// Complete a free-form prompt against one provider, with no local fallback.
    pub async fn complete_with(
        &self,
        kind: ProviderKind,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        let provider = self.registry.get(kind).ok_or(ProviderError::NotConfigured(kind))?;
        let defaults = self.request_for(kind, None);
        let input = CompletionInput {
            prompt,
            system,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        };
        self.attempt(provider.as_ref(), &input, defaults.timeout).await
    }

    /// Call the provider until it succeeds or the attempt budget is spent.
    async fn attempt(
        &self,
        provider: &dyn CompletionProvider,
        input: &CompletionInput<'_>,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call_provider(provider, input, timeout).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < max_attempts => {
                    warn!("Attempt {attempt}/{max_attempts} failed: {e}");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fallback(&self, topic: Option<&str>) -> CompletionResult {
        CompletionResult {
            text: corpus::pick(topic).to_string(),
            generated_by: GeneratedBy::Local,
            topic: topic.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    /// Provider returning scripted results and counting calls.
    struct Scripted {
        kind: ProviderKind,
        results: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(kind: ProviderKind, results: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn hanging(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                results: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                delay: Some(Duration::from_secs(300)),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(input.prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default idea".to_string()))
        }
    }

    fn http_error(kind: ProviderKind) -> ProviderError {
        ProviderError::Http { provider: kind, status: Some(503), body: "overloaded".into() }
    }

    fn orchestrator(providers: Vec<Arc<Scripted>>, settings: OrchestratorSettings) -> Orchestrator {
        let mut registry = ProviderRegistry::new();
        for p in providers {
            registry.insert(p);
        }
        Orchestrator::new(registry, settings)
    }

    #[tokio::test]
    async fn test_no_provider_falls_back_without_network() {
        let orch = orchestrator(vec![], OrchestratorSettings::default());
        let result = orch.generate(&orch.request(Some("sales"))).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert_eq!(result.topic.as_deref(), Some("sales"));
        assert!(!result.text.is_empty());
    }

    #[tokio::test]
    async fn test_hint_for_unconfigured_provider_falls_back() {
        let groq = Scripted::new(ProviderKind::Groq, vec![]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings::default());
        let request = orch.request(None).with_provider(ProviderKind::Gemini);
        let result = orch.generate(&request).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert_eq!(groq.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_is_ai() {
        let groq = Scripted::new(ProviderKind::Groq, vec![Ok("AI idea".into())]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings::default());
        let result = orch.generate(&orch.request(Some("hr"))).await;
        assert_eq!(result.generated_by, GeneratedBy::Ai);
        assert_eq!(result.text, "AI idea");
        assert_eq!(result.topic.as_deref(), Some("hr"));
        assert_eq!(groq.calls(), 1);
        assert!(groq.prompts.lock().unwrap()[0].contains("Focus on: hr"));
    }

    #[tokio::test]
    async fn test_single_attempt_failure_falls_back_without_retry() {
        let groq = Scripted::new(ProviderKind::Groq, vec![Err(http_error(ProviderKind::Groq)), Ok("late".into())]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings { max_attempts: 1, ..Default::default() });
        let result = orch.generate(&orch.request(Some("sales"))).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert_eq!(groq.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_allows_second_attempt() {
        let groq = Scripted::new(ProviderKind::Groq, vec![Err(http_error(ProviderKind::Groq)), Ok("second".into())]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings { max_attempts: 2, ..Default::default() });
        let result = orch.generate(&orch.request(None)).await;
        assert_eq!(result.generated_by, GeneratedBy::Ai);
        assert_eq!(result.text, "second");
        assert_eq!(groq.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let err = || Err(http_error(ProviderKind::Groq));
        let groq = Scripted::new(ProviderKind::Groq, vec![err(), err(), err(), err()]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings { max_attempts: 3, ..Default::default() });
        let result = orch.generate(&orch.request(None)).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert_eq!(groq.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_is_failure() {
        let groq = Scripted::new(ProviderKind::Groq, vec![Ok("   ".into())]);
        let orch = orchestrator(vec![groq], OrchestratorSettings::default());
        let result = orch.generate(&orch.request(Some("finance"))).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert!(!result.text.trim().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_falls_back() {
        let groq = Scripted::hanging(ProviderKind::Groq);
        let settings = OrchestratorSettings { call_timeout: Duration::from_secs(10), ..Default::default() };
        let orch = orchestrator(vec![groq.clone()], settings);

        let started = tokio::time::Instant::now();
        let result = orch.generate(&orch.request(None)).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        assert!(started.elapsed() < Duration::from_secs(11));
        assert_eq!(groq.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_with_reports_timeout() {
        let groq = Scripted::hanging(ProviderKind::Groq);
        let settings = OrchestratorSettings { call_timeout: Duration::from_secs(8), ..Default::default() };
        let orch = orchestrator(vec![groq], settings);
        let err = orch.complete_with(ProviderKind::Groq, "prompt", None).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { provider: ProviderKind::Groq, after: Duration::from_secs(8) });
    }

    #[tokio::test]
    async fn test_complete_with_unconfigured() {
        let orch = orchestrator(vec![], OrchestratorSettings::default());
        let err = orch.complete_with(ProviderKind::YandexGpt, "prompt", None).await.unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured(ProviderKind::YandexGpt));
    }

    #[tokio::test]
    async fn test_invalid_request_falls_back() {
        let groq = Scripted::new(ProviderKind::Groq, vec![Ok("never".into())]);
        let orch = orchestrator(vec![groq.clone()], OrchestratorSettings::default());

        let result = orch.generate(&orch.request(None).with_max_tokens(0)).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        let result = orch.generate(&orch.request(None).with_timeout(Duration::ZERO)).await;
        assert_eq!(result.generated_by, GeneratedBy::Local);
        let hot = CompletionRequest { temperature: 5.0, ..orch.request(None) };
        assert_eq!(orch.generate(&hot).await.generated_by, GeneratedBy::Local);
        assert_eq!(groq.calls(), 0);
    }

    #[test]
    fn test_validate_temperature() {
        let orch = orchestrator(vec![], OrchestratorSettings::default());
        let base = orch.request(None);
        assert_eq!(base.validate(), Ok(()));
        assert_eq!(CompletionRequest { temperature: 0.0, ..base.clone() }.validate(), Ok(()));
        assert_eq!(CompletionRequest { temperature: 1.0, ..base.clone() }.validate(), Ok(()));
        assert_eq!(
            CompletionRequest { temperature: 5.0, ..base.clone() }.validate(),
            Err(RequestError::TemperatureOutOfRange(5.0))
        );
        assert!(matches!(
            CompletionRequest { temperature: -0.1, ..base.clone() }.validate(),
            Err(RequestError::TemperatureOutOfRange(_))
        ));
        for t in [f32::NAN, f32::INFINITY] {
            assert!(matches!(
                CompletionRequest { temperature: t, ..base.clone() }.validate(),
                Err(RequestError::TemperatureOutOfRange(_))
            ));
        }
        assert!(matches!(base.with_temperature(f32::NAN).validate(), Err(RequestError::TemperatureOutOfRange(_))));
    }

    #[test]
    fn test_request_defaults() {
        let orch = orchestrator(vec![], OrchestratorSettings::default());
        let request = orch.request_for(ProviderKind::Gemini, Some("product"));
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.timeout, Duration::from_secs(15));
        assert_eq!(request.topic.as_deref(), Some("product"));

        let settings = OrchestratorSettings { max_tokens: Some(64), temperature: Some(3.0), ..Default::default() };
        let orch = orchestrator(vec![], settings);
        let request = orch.request(None);
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.with_temperature(-0.5).temperature, 0.0);
    }

    #[test]
    fn test_generated_by_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&GeneratedBy::Ai).unwrap(), "\"ai\"");
        assert_eq!(GeneratedBy::Local.as_str(), "local");
    }
}
