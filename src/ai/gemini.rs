//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::provider::{
    parse_json, require_text, send_request, CompletionInput, CompletionProvider, ProviderConfig, ProviderError,
    ProviderKind,
};

pub struct GeminiProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
pub(crate) struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.config.endpoint.trim_end_matches('/'), self.config.model)
    }

    pub(crate) fn build_request<'a>(&self, input: &CompletionInput<'a>) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: input.prompt }],
            }],
            system_instruction: input.system.map(|text| Content {
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: input.temperature,
                max_output_tokens: input.max_tokens,
            },
        }
    }

    pub(crate) fn parse_response(body: &str) -> Result<String, ProviderError> {
        let kind = ProviderKind::Gemini;
        let parsed: GenerateResponse = parse_json(kind, body)?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::format(kind, format!("Gemini error: {}", error.message), body));
        }

        let text = parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref());
        require_text(kind, text, "candidates[0].content.parts[0].text", body)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError> {
        let request = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.config.auth_token)
            .json(&self.build_request(input));

        let body = send_request(ProviderKind::Gemini, request).await?;
        let text = Self::parse_response(&body)?;
        info!("Gemini completion received ({} chars)", text.chars().count());
        Ok(text)
    }
}
