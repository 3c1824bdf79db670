//! YandexGPT Foundation Models completion client.
//!
//! Auth is an `Api-Key` header plus the tenant folder, which also goes into the
//! model URI (`gpt://{folder}/{model}`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::provider::{
    parse_json, require_text, send_request, CompletionInput, CompletionProvider, ProviderConfig, ProviderError,
    ProviderKind,
};

pub struct YandexGptProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
pub(crate) struct CompletionRequest<'a> {
    #[serde(rename = "modelUri")]
    model_uri: String,
    #[serde(rename = "completionOptions")]
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    /// The API takes this as a decimal string.
    #[serde(rename = "maxTokens")]
    max_tokens: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    result: Option<CompletionResult>,
}

#[derive(Deserialize, Debug)]
struct CompletionResult {
    alternatives: Option<Vec<Alternative>>,
}

#[derive(Deserialize, Debug)]
struct Alternative {
    message: Option<AlternativeMessage>,
}

#[derive(Deserialize, Debug)]
struct AlternativeMessage {
    text: Option<String>,
}

impl YandexGptProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn folder_id(&self) -> &str {
        self.config.folder_id.as_deref().unwrap_or_default()
    }

    pub(crate) fn build_request<'a>(&self, input: &CompletionInput<'a>) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = input.system {
            messages.push(Message { role: "system", text: system });
        }
        messages.push(Message { role: "user", text: input.prompt });

        CompletionRequest {
            model_uri: format!("gpt://{}/{}", self.folder_id(), self.config.model),
            completion_options: CompletionOptions {
                stream: false,
                temperature: input.temperature,
                max_tokens: input.max_tokens.to_string(),
            },
            messages,
        }
    }

    pub(crate) fn parse_response(body: &str) -> Result<String, ProviderError> {
        let kind = ProviderKind::YandexGpt;
        let parsed: CompletionResponse = parse_json(kind, body)?;
        let text = parsed
            .result
            .as_ref()
            .and_then(|r| r.alternatives.as_ref())
            .and_then(|a| a.first())
            .and_then(|a| a.message.as_ref())
            .and_then(|m| m.text.as_deref());
        require_text(kind, text, "result.alternatives[0].message.text", body)
    }
}

#[async_trait]
impl CompletionProvider for YandexGptProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::YandexGpt
    }

    async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError> {
        let request = self
            .http
            .post(&self.config.endpoint)
            .header("Authorization", format!("Api-Key {}", self.config.auth_token))
            .header("x-folder-id", self.folder_id())
            .json(&self.build_request(input));

        let body = send_request(ProviderKind::YandexGpt, request).await?;
        let text = Self::parse_response(&body)?;
        info!("YandexGPT completion received ({} chars)", text.chars().count());
        Ok(text)
    }
}
