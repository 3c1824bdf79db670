//! Voice note pipeline: download, transcribe, gate on the trigger phrase,
//! generate and reply.
//!
//! Each stage has its own deadline and its own apology text. Nothing is
//! retried; a note that does not start with the trigger phrase is ignored
//! without a reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ai::prompt::{voice_prompt, VOICE_SYSTEM_PROMPT};
use crate::ai::{Orchestrator, ProviderError, ProviderKind};
use crate::bot::telegram::{ChatTransport, DownloadError};
use crate::bot::texts;
use crate::deadline::with_deadline;
use crate::speech::{Transcriber, TranscriptionError};

/// Leading phrase a transcript must carry to be treated as a request.
pub const TRIGGER_PHRASE: &str = "придумай идею";

/// Voice note metadata as received from Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceNote {
    pub file_id: String,
    pub duration_secs: u32,
    pub file_size: Option<u32>,
}

/// Downloaded audio. Lives only for the length of one pipeline run.
#[derive(Debug)]
pub struct VoiceSample {
    pub audio: Vec<u8>,
    pub duration_secs: u32,
    pub source_file_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    Download,
    Transcription,
    Generation,
}

impl VoiceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceStage::Download => "download",
            VoiceStage::Transcription => "transcription",
            VoiceStage::Generation => "generation",
        }
    }

    fn apology(&self) -> &'static str {
        match self {
            VoiceStage::Download => texts::VOICE_DOWNLOAD_FAILED,
            VoiceStage::Transcription => texts::VOICE_TRANSCRIPTION_FAILED,
            VoiceStage::Generation => texts::VOICE_GENERIC_FAILURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Transcriber or voice provider missing.
    Unavailable,
    TooLong,
}

/// How a voice note was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// An idea was sent back.
    Replied,
    /// The transcript did not start with the trigger phrase.
    Ignored,
    Rejected(RejectReason),
    Failed(VoiceStage),
}

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub max_duration_secs: u32,
    pub download_timeout: Duration,
    pub transcribe_timeout: Duration,
    pub generate_timeout: Duration,
    pub provider: ProviderKind,
    pub language: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 30,
            download_timeout: Duration::from_secs(10),
            transcribe_timeout: Duration::from_secs(15),
            generate_timeout: Duration::from_secs(20),
            provider: ProviderKind::Groq,
            language: "ru-RU".to_string(),
        }
    }
}

/// True if a transcript is addressed to the bot.
pub fn is_addressed_to_bot(text: &str) -> bool {
    text.trim().to_lowercase().starts_with(TRIGGER_PHRASE)
}

pub struct VoicePipeline {
    transport: Arc<dyn ChatTransport>,
    transcriber: Option<Arc<dyn Transcriber>>,
    orchestrator: Arc<Orchestrator>,
    settings: VoiceSettings,
}

impl VoicePipeline {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        transcriber: Option<Arc<dyn Transcriber>>,
        orchestrator: Arc<Orchestrator>,
        settings: VoiceSettings,
    ) -> Self {
        Self { transport, transcriber, orchestrator, settings }
    }

    pub fn is_available(&self) -> bool {
        self.transcriber.is_some() && self.orchestrator.has_provider(self.settings.provider)
    }

    /// Handle one voice note end to end. Always answers the user unless the
    /// note was ignored.
    pub async fn handle(&self, chat_id: i64, note: &VoiceNote) -> VoiceOutcome {
        let Some(transcriber) = self.transcriber.as_ref().filter(|_| self.is_available()) else {
            info!("🎤 Voice note in chat {chat_id} but voice is not configured");
            self.reply(chat_id, texts::VOICE_UNAVAILABLE).await;
            return VoiceOutcome::Rejected(RejectReason::Unavailable);
        };

        if note.duration_secs > self.settings.max_duration_secs {
            info!("🎤 Voice note too long: {}s", note.duration_secs);
            self.reply(chat_id, texts::VOICE_TOO_LONG).await;
            return VoiceOutcome::Rejected(RejectReason::TooLong);
        }

        if let Err(e) = self.transport.send_typing(chat_id).await {
            debug!("{e}");
        }

        let started = Instant::now();
        let outcome = match self.run(note, transcriber.as_ref()).await {
            Ok(Some(idea)) => {
                self.reply(chat_id, &format!("💡 {idea}")).await;
                VoiceOutcome::Replied
            }
            Ok(None) => VoiceOutcome::Ignored,
            Err(stage) => {
                self.reply(chat_id, stage.apology()).await;
                VoiceOutcome::Failed(stage)
            }
        };
        info!("🎤 Voice note in chat {chat_id}: {outcome:?} in {:?}", started.elapsed());
        outcome
    }

    async fn run(&self, note: &VoiceNote, transcriber: &dyn Transcriber) -> Result<Option<String>, VoiceStage> {
        let audio = with_deadline(
            "audio download",
            self.settings.download_timeout,
            self.transport.download_file(&note.file_id),
        )
        .await
        .unwrap_or(Err(DownloadError::Timeout))
        .map_err(|e| {
            warn!("Voice download failed: {e}");
            VoiceStage::Download
        })?;

        let sample = VoiceSample {
            audio,
            duration_secs: note.duration_secs,
            source_file_id: note.file_id.clone(),
        };
        debug!("Got {} bytes ({}s) from {}", sample.audio.len(), sample.duration_secs, sample.source_file_id);

        let transcript = with_deadline(
            "speech recognition",
            self.settings.transcribe_timeout,
            transcriber.transcribe(&sample.audio, &self.settings.language),
        )
        .await
        .unwrap_or_else(|d| Err(TranscriptionError::Timeout(d.budget)))
        .map_err(|e| {
            warn!("Transcription failed: {e}");
            VoiceStage::Transcription
        })?;
        drop(sample);

        if !is_addressed_to_bot(&transcript.text) {
            debug!("Transcript does not start with the trigger phrase, ignoring");
            return Ok(None);
        }

        let prompt = voice_prompt(&transcript.text);
        let idea = with_deadline(
            "voice idea generation",
            self.settings.generate_timeout,
            self.orchestrator
                .complete_with(self.settings.provider, &prompt, Some(VOICE_SYSTEM_PROMPT)),
        )
        .await
        .unwrap_or_else(|d| Err(ProviderError::Timeout { provider: self.settings.provider, after: d.budget }))
        .map_err(|e| {
            warn!("Voice idea generation failed: {e}");
            VoiceStage::Generation
        })?;

        Ok(Some(idea))
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.reply(chat_id, text).await {
            warn!("Voice reply to {chat_id} failed: {e}");
        }
    }
}
