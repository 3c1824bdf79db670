//! Groq chat-completions client (OpenAI-compatible API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::provider::{
    parse_json, require_text, send_request, CompletionInput, CompletionProvider, ProviderConfig, ProviderError,
    ProviderKind,
};

pub struct GroqProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

impl GroqProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub(crate) fn build_request<'a>(&'a self, input: &CompletionInput<'a>) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = input.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: input.prompt });

        ChatRequest {
            model: &self.config.model,
            messages,
            temperature: input.temperature,
            max_tokens: input.max_tokens,
        }
    }

    pub(crate) fn parse_response(body: &str) -> Result<String, ProviderError> {
        let kind = ProviderKind::Groq;
        let parsed: ChatResponse = parse_json(kind, body)?;
        let content = parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref());
        require_text(kind, content, "choices[0].message.content", body)
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError> {
        let request = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.auth_token)
            .json(&self.build_request(input));

        let body = send_request(ProviderKind::Groq, request).await?;
        let text = Self::parse_response(&body)?;
        info!("Groq completion received ({} chars)", text.chars().count());
        Ok(text)
    }
}
