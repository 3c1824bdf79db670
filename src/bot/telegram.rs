//! Telegram transport using teloxide.

use std::fmt;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId};
use tracing::{debug, warn};

/// Fetching a file from Telegram failed.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadError {
    /// `getFile` did not resolve the file id.
    Resolve(String),
    /// The file body could not be fetched.
    Fetch(String),
    Timeout,
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(e) => write!(f, "failed to resolve file: {e}"),
            Self::Fetch(e) => write!(f, "failed to download audio: {e}"),
            Self::Timeout => write!(f, "audio download timed out"),
        }
    }
}

impl std::error::Error for DownloadError {}

/// The operations the bot needs from the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain-text message.
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), String>;

    /// Show the "typing…" indicator.
    async fn send_typing(&self, chat_id: i64) -> Result<(), String>;

    /// Resolve a file id and download its bytes.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send chat action: {e}"))
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DownloadError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| DownloadError::Resolve(e.to_string()))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| DownloadError::Fetch(e.to_string()))?;

        debug!("📥 Downloaded {} ({} bytes)", file.path, data.len());
        Ok(data)
    }
}
