use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use teloxide::types::ChatId;
use tracing::warn;

use crate::ai::{OrchestratorSettings, ProviderConfig, ProviderKind};
use crate::bot::voice::VoiceSettings;

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const MAX_TIMEOUT_MS: u64 = 60_000;

/// Errors that can occur when loading configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable is set but cannot be used.
    Invalid { var: &'static str, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "{var} is required"),
            Self::Invalid { var, value, reason } => write!(f, "{var}='{value}' is invalid: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Yandex SpeechKit credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    pub api_key: String,
    pub folder_id: String,
}

pub struct Config {
    pub bot_token: String,
    /// Provider for `/idea`.
    pub ai_provider: ProviderKind,
    /// Provider for voice requests.
    pub voice_provider: ProviderKind,
    /// Every provider with a credential.
    pub providers: Vec<ProviderConfig>,
    pub speech: Option<SpeechConfig>,
    pub request_timeout: Duration,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_attempts: u32,
    pub bitrix24_webhook: Option<String>,
    pub dashboard_addr: Option<SocketAddr>,
    pub dashboard_token: Option<String>,
    pub log_chat_id: Option<ChatId>,
    /// Directory for logs. Defaults to current directory.
    pub data_dir: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ai_provider", &self.ai_provider)
            .field("voice_provider", &self.voice_provider)
            .field("providers", &self.providers.iter().map(|p| p.kind).collect::<Vec<_>>())
            .field("speech", &self.speech.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("crm", &self.bitrix24_webhook.is_some())
            .field("dashboard_addr", &self.dashboard_addr)
            .field("log_chat_id", &self.log_chat_id)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Invalid {
                var: "BOT_TOKEN",
                value: "<hidden>".into(),
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let ai_provider = parse_provider("AI_PROVIDER", get("AI_PROVIDER"))?;
        let voice_provider = parse_provider("VOICE_PROVIDER", get("VOICE_PROVIDER"))?;

        let folder_id = get("YANDEX_FOLDER_ID");
        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            let Some(token) = get(kind.token_var()) else {
                continue;
            };
            let mut provider = ProviderConfig::new(kind, token);
            if let Some(model) = get(kind.model_var()) {
                provider = provider.with_model(model);
            }
            if kind == ProviderKind::YandexGpt {
                match &folder_id {
                    Some(folder) => provider = provider.with_folder_id(folder.clone()),
                    None => {
                        warn!("YANDEX_API_KEY is set without YANDEX_FOLDER_ID, YandexGPT disabled");
                        continue;
                    }
                }
            }
            providers.push(provider);
        }

        let speech = match (get("YANDEX_API_KEY"), folder_id) {
            (Some(api_key), Some(folder_id)) => Some(SpeechConfig { api_key, folder_id }),
            _ => None,
        };

        let timeout_ms = parse_num("AI_REQUEST_TIMEOUT_MS", get("AI_REQUEST_TIMEOUT_MS"))?.unwrap_or(DEFAULT_TIMEOUT_MS);
        if !(1..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(ConfigError::Invalid {
                var: "AI_REQUEST_TIMEOUT_MS",
                value: timeout_ms.to_string(),
                reason: format!("must be between 1 and {MAX_TIMEOUT_MS}"),
            });
        }

        let max_tokens: Option<u32> = parse_num("AI_MAX_TOKENS", get("AI_MAX_TOKENS"))?;
        if max_tokens == Some(0) {
            return Err(ConfigError::Invalid {
                var: "AI_MAX_TOKENS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let temperature: Option<f32> = parse_num("AI_TEMPERATURE", get("AI_TEMPERATURE"))?;
        if let Some(t) = temperature
            && !(0.0..=1.0).contains(&t)
        {
            return Err(ConfigError::Invalid {
                var: "AI_TEMPERATURE",
                value: t.to_string(),
                reason: "must be between 0 and 1".into(),
            });
        }

        let max_attempts: u32 = parse_num("AI_MAX_ATTEMPTS", get("AI_MAX_ATTEMPTS"))?.unwrap_or(1);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "AI_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let dashboard_addr: Option<SocketAddr> = parse_num("DASHBOARD_ADDR", get("DASHBOARD_ADDR"))?;
        let log_chat_id: Option<i64> = parse_num("LOG_CHAT_ID", get("LOG_CHAT_ID"))?;

        Ok(Self {
            bot_token,
            ai_provider,
            voice_provider,
            providers,
            speech,
            request_timeout: Duration::from_millis(timeout_ms),
            max_tokens,
            temperature,
            max_attempts,
            bitrix24_webhook: get("BITRIX24_WEBHOOK"),
            dashboard_addr,
            dashboard_token: get("DASHBOARD_TOKEN"),
            log_chat_id: log_chat_id.map(ChatId),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_provider: self.ai_provider,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            call_timeout: self.request_timeout,
            max_attempts: self.max_attempts,
        }
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings { provider: self.voice_provider, ..VoiceSettings::default() }
    }

    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|p| p.kind == kind)
    }
}

fn parse_provider(var: &'static str, value: Option<String>) -> Result<ProviderKind, ConfigError> {
    match value {
        None => Ok(ProviderKind::Groq),
        Some(value) => ProviderKind::parse(&value).ok_or_else(|| ConfigError::Invalid {
            var,
            value,
            reason: "expected one of groq, gemini, yandexgpt, huggingface".into(),
        }),
    }
}

fn parse_num<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ConfigError::Invalid { var, value: v.clone(), reason: e.to_string() })
        })
        .transpose()
}
