//! HuggingFace Inference API text-generation client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::provider::{
    parse_json, require_text, send_request, CompletionInput, CompletionProvider, ProviderConfig, ProviderError,
    ProviderKind,
};

pub struct HuggingFaceProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
pub(crate) struct InferenceRequest {
    inputs: String,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Parameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Deserialize, Debug)]
struct Generation {
    generated_text: Option<String>,
}

impl HuggingFaceProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn url(&self) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), self.config.model)
    }

    /// Text generation has no separate system role, so it is prepended.
    pub(crate) fn build_request(&self, input: &CompletionInput<'_>) -> InferenceRequest {
        let inputs = match input.system {
            Some(system) => format!("{system}\n\n{}", input.prompt),
            None => input.prompt.to_string(),
        };
        InferenceRequest {
            inputs,
            parameters: Parameters {
                max_new_tokens: input.max_tokens,
                temperature: input.temperature,
                return_full_text: false,
            },
        }
    }

    pub(crate) fn parse_response(body: &str) -> Result<String, ProviderError> {
        let kind = ProviderKind::HuggingFace;
        let parsed: Vec<Generation> = parse_json(kind, body)?;
        let text = parsed.first().and_then(|g| g.generated_text.as_deref());
        require_text(kind, text, "[0].generated_text", body)
    }
}

#[async_trait]
impl CompletionProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn complete(&self, input: &CompletionInput<'_>) -> Result<String, ProviderError> {
        let request = self
            .http
            .post(self.url())
            .bearer_auth(&self.config.auth_token)
            .json(&self.build_request(input));

        let body = send_request(ProviderKind::HuggingFace, request).await?;
        let text = Self::parse_response(&body)?;
        info!("HuggingFace completion received ({} chars)", text.chars().count());
        Ok(text)
    }
}
