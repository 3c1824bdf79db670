//! Speech-to-text through Yandex SpeechKit synchronous recognition.
//!
//! The raw OGG Opus bytes from Telegram are posted as the request body. The
//! endpoint only accepts short clips; callers enforce the duration ceiling.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::provider::truncate_body;

pub const DEFAULT_STT_ENDPOINT: &str = "https://stt.api.cloud.yandex.net/speech/v1/stt:recognize";

/// Normalized recognition output.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// Non-2xx status, or no status when the request itself failed.
    Http { status: Option<u16>, body: String },
    /// The backend reported an error object.
    Api { code: Option<i64>, message: String },
    /// The body matched none of the known shapes.
    UnexpectedFormat(String),
    /// Recognition succeeded but produced no words.
    Empty,
    Timeout(Duration),
}

impl fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status: Some(status), body } => write!(f, "SpeechKit HTTP {status}: {body}"),
            Self::Http { status: None, body } => write!(f, "SpeechKit request failed: {body}"),
            Self::Api { code: Some(code), message } => write!(f, "SpeechKit error {code}: {message}"),
            Self::Api { code: None, message } => write!(f, "SpeechKit error: {message}"),
            Self::UnexpectedFormat(body) => write!(f, "unexpected SpeechKit response: {body}"),
            Self::Empty => write!(f, "no speech recognized"),
            Self::Timeout(after) => write!(f, "speech recognition timed out after {}ms", after.as_millis()),
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// Anything that turns audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<TranscriptionResult, TranscriptionError>;
}

/// Yandex SpeechKit v1 client.
pub struct SpeechKitClient {
    api_key: String,
    folder_id: String,
    endpoint: String,
    http: reqwest::Client,
}

impl SpeechKitClient {
    pub fn new(api_key: String, folder_id: String, http: reqwest::Client) -> Self {
        Self {
            api_key,
            folder_id,
            endpoint: DEFAULT_STT_ENDPOINT.to_string(),
            http,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self, language: &str) -> String {
        format!(
            "{}?lang={}&folderId={}",
            self.endpoint,
            urlencoding::encode(language),
            urlencoding::encode(&self.folder_id)
        )
    }
}

#[async_trait]
impl Transcriber for SpeechKitClient {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<TranscriptionResult, TranscriptionError> {
        debug!("Recognizing {} bytes of audio ({language})", audio.len());

        let response = self
            .http
            .post(self.url(language))
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| TranscriptionError::Http { status: None, body: truncate_body(&e.to_string()) })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Http { status: Some(status.as_u16()), body: e.to_string() })?;

        if !status.is_success() {
            warn!("SpeechKit error {status}: {}", truncate_body(&body));
            return Err(TranscriptionError::Http { status: Some(status.as_u16()), body: truncate_body(&body) });
        }

        let result = normalize_response(&body)?;
        info!("🎤 Transcribed: \"{}\" (confidence: {:?})", preview(&result.text, 100), result.confidence);
        Ok(result)
    }
}

/// Normalize the response body into a transcript.
///
/// SpeechKit has answered both `{"result": "text"}` and
/// `{"result": {"alternatives": [{"text": ..., "confidence": ...}]}}` across API
/// versions, so both are accepted, as is the same shape without the `result`
/// wrapper. A body that is not JSON at all is taken as the transcript itself.
pub fn normalize_response(body: &str) -> Result<TranscriptionResult, TranscriptionError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return non_empty(body, None),
    };

    if let Some(error) = value.get("error").filter(|e| e.is_object()) {
        return Err(TranscriptionError::Api {
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let result = value.get("result").unwrap_or(&value);

    if let Some(text) = result.as_str() {
        return non_empty(text, None);
    }

    let first = result
        .get("alternatives")
        .and_then(Value::as_array)
        .and_then(|alternatives| alternatives.first());
    if let Some(text) = first.and_then(|a| a.get("text")).and_then(Value::as_str) {
        let confidence = first
            .and_then(|a| a.get("confidence"))
            .and_then(Value::as_f64)
            .map(|c| c as f32);
        return non_empty(text, confidence);
    }

    Err(TranscriptionError::UnexpectedFormat(truncate_body(body)))
}

fn non_empty(text: &str, confidence: Option<f32>) -> Result<TranscriptionResult, TranscriptionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TranscriptionError::Empty);
    }
    Ok(TranscriptionResult { text: text.to_string(), confidence })
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}
