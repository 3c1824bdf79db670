//! Uniform call contract over the completion backends.
//!
//! Each backend implements [`CompletionProvider`]; the concrete type is chosen
//! once at startup by [`ProviderRegistry::from_configs`]. Adapters never retry
//! and never apply their own deadline: [`call_provider`] owns the budget so
//! that every backend times out the same way.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::ai::{gemini::GeminiProvider, groq::GroqProvider, huggingface::HuggingFaceProvider, yandex::YandexGptProvider};
use crate::deadline::with_deadline;

/// Max chars of a response body kept in errors for diagnostics.
const MAX_ERROR_BODY: usize = 500;

/// The completion backends the bot can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Groq,
    Gemini,
    YandexGpt,
    HuggingFace,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Groq,
        ProviderKind::Gemini,
        ProviderKind::YandexGpt,
        ProviderKind::HuggingFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
            ProviderKind::YandexGpt => "yandexgpt",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Parse a provider name as written in the environment.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "groq" => Some(ProviderKind::Groq),
            "gemini" => Some(ProviderKind::Gemini),
            "yandexgpt" | "yandex" => Some(ProviderKind::YandexGpt),
            "huggingface" | "hf" => Some(ProviderKind::HuggingFace),
            _ => None,
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn token_var(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::YandexGpt => "YANDEX_API_KEY",
            ProviderKind::HuggingFace => "HUGGINGFACE_TOKEN",
        }
    }

    /// Environment variable overriding the model name.
    pub fn model_var(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ_MODEL",
            ProviderKind::Gemini => "GEMINI_MODEL",
            ProviderKind::YandexGpt => "YANDEX_MODEL",
            ProviderKind::HuggingFace => "HUGGINGFACE_MODEL",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::Gemini => "gemini-2.0-flash-exp",
            ProviderKind::YandexGpt => "yandexgpt-lite",
            ProviderKind::HuggingFace => "mistralai/Mistral-7B-Instruct-v0.2",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            ProviderKind::YandexGpt => "https://llm.api.cloud.yandex.net/foundationModels/v1/completion",
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co/models",
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            ProviderKind::Groq | ProviderKind::YandexGpt => 400,
            ProviderKind::Gemini => 500,
            ProviderKind::HuggingFace => 200,
        }
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            ProviderKind::Gemini => 0.9,
            _ => 0.8,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-provider settings, built from the environment at startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub auth_token: String,
    pub model: String,
    /// Base URL; tests point this at a local server.
    pub endpoint: String,
    /// Tenant folder, required by YandexGPT.
    pub folder_id: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, auth_token: impl Into<String>) -> Self {
        Self {
            kind,
            auth_token: auth_token.into(),
            model: kind.default_model().to_string(),
            endpoint: kind.default_endpoint().to_string(),
            folder_id: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }
}

/// Canonical completion input every adapter translates into its own envelope.
#[derive(Debug, Clone, Copy)]
pub struct CompletionInput<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Errors surfaced by a provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// No credential configured for this provider.
    NotConfigured(ProviderKind),
    /// Non-2xx status, or no status at all when the connection failed.
    Http {
        provider: ProviderKind,
        status: Option<u16>,
        body: String,
    },
    /// The response did not contain usable text.
    Format {
        provider: ProviderKind,
        reason: String,
        body: String,
    },
    /// The call did not finish within its deadline.
    Timeout {
        provider: ProviderKind,
        after: Duration,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::NotConfigured(provider) => *provider,
            Self::Http { provider, .. } | Self::Format { provider, .. } | Self::Timeout { provider, .. } => *provider,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn format(provider: ProviderKind, reason: impl Into<String>, body: &str) -> Self {
        Self::Format {
            provider,
            reason: reason.into(),
            body: truncate_body(body),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(provider) => write!(f, "{provider}: no credential configured"),
            Self::Http { provider, status: Some(status), body } => {
                write!(f, "{provider}: HTTP {status}: {body}")
            }
            Self::Http { provider, status: None, body } => write!(f, "{provider}: request failed: {body}"),
            Self::Format { provider, reason, body } => {
                write!(f, "{provider}: invalid response ({reason}): {body}")
            }
            Self::Timeout { provider, after } => {
                write!(f, "{provider}: timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// One completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send one completion request and return the trimmed, non-empty text.
    async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError>;
}

/// Call `provider` once, aborting the call when `deadline` elapses.
pub async fn call_provider(
    provider: &dyn CompletionProvider,
    input: &CompletionInput<'_>,
    deadline: Duration,
) -> Result<String, ProviderError> {
    let kind = provider.kind();
    debug!("Calling {kind} (deadline {}ms, max_tokens {})", deadline.as_millis(), input.max_tokens);

    let text = with_deadline("provider call", deadline, provider.complete(input))
        .await
        .map_err(|_| ProviderError::Timeout { provider: kind, after: deadline })??;

    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::format(kind, "empty completion text", ""));
    }
    Ok(text.to_string())
}

/// Send a prepared request and return the body of a 2xx response.
pub(crate) async fn send_request(
    kind: ProviderKind,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Http {
        provider: kind,
        status: None,
        body: truncate_body(&e.to_string()),
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ProviderError::Http {
        provider: kind,
        status: Some(status.as_u16()),
        body: truncate_body(&format!("failed to read body: {e}")),
    })?;

    if !status.is_success() {
        warn!("{kind} API error {status}: {}", truncate_body(&body));
        return Err(ProviderError::Http {
            provider: kind,
            status: Some(status.as_u16()),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

/// Parse a JSON body, mapping syntax errors to [`ProviderError::Format`].
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(kind: ProviderKind, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::format(kind, format!("malformed JSON: {e}"), body))
}

/// Accept `text` only if it is present and not blank.
pub(crate) fn require_text(kind: ProviderKind, text: Option<&str>, missing: &str, body: &str) -> Result<String, ProviderError> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        Some(_) => Err(ProviderError::format(kind, "empty completion text", body)),
        None => Err(ProviderError::format(kind, format!("missing {missing}"), body)),
    }
}

/// Cut a body down to [`MAX_ERROR_BODY`] chars.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{truncated}...")
    }
}

/// The providers that have credentials, keyed by kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per configured provider.
    pub fn from_configs(configs: &[ProviderConfig], http: &reqwest::Client) -> Self {
        let mut registry = Self::new();
        for config in configs {
            let provider: Arc<dyn CompletionProvider> = match config.kind {
                ProviderKind::Groq => Arc::new(GroqProvider::new(config.clone(), http.clone())),
                ProviderKind::Gemini => Arc::new(GeminiProvider::new(config.clone(), http.clone())),
                ProviderKind::YandexGpt => Arc::new(YandexGptProvider::new(config.clone(), http.clone())),
                ProviderKind::HuggingFace => Arc::new(HuggingFaceProvider::new(config.clone(), http.clone())),
            };
            registry.insert(provider);
        }
        registry
    }

    pub fn insert(&mut self, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Configured kinds in a stable order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }
}
