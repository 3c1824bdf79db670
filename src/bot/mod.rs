//! Telegram-facing side of the bot: transport, routing, and the voice and
//! contact conversations.

pub mod contact;
pub mod handlers;
pub mod telegram;
pub mod texts;
pub mod voice;

pub use handlers::{parse_command, AppState, Command, Content, InboundMessage};
pub use telegram::{ChatTransport, DownloadError, TelegramClient};
pub use voice::{VoiceNote, VoiceOutcome, VoicePipeline, VoiceSettings};

/// The user behind an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
}
