//! Update routing: rate limit, analytics, then commands, voice notes and the
//! contact conversation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info};

use crate::ai::{corpus, CompletionResult, GeneratedBy, Orchestrator};
use crate::bot::contact::{ContactFlow, ContactOutcome};
use crate::bot::telegram::ChatTransport;
use crate::bot::texts;
use crate::bot::voice::{VoiceNote, VoiceOutcome, VoicePipeline};
use crate::bot::Sender;
use crate::store::{
    AnalyticsEvent, AnalyticsStore, ErrorEntry, EventKind, MonitoringStore, RateDecision, RateLimitStore, Severity,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/idea` with an optional topic.
    Idea(Option<String>),
    Contact,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Idea(_) => "idea",
            Command::Contact => "contact",
        }
    }
}

/// Parse a `/command[@botname] [args]` message. `None` if it is not a known
/// command.
pub fn parse_command(text: &str) -> Option<Command> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    match name.as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "idea" => Some(Command::Idea(Some(args.to_string()).filter(|a| !a.is_empty()))),
        "contact" => Some(Command::Contact),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Voice(VoiceNote),
    /// Stickers, photos and anything else.
    Other,
}

/// A Telegram message reduced to what the router needs.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub chat_id: i64,
    /// `None` for channel posts.
    pub sender: Option<Sender>,
    pub content: Content,
}

pub fn format_idea(result: &CompletionResult) -> String {
    match result.generated_by {
        GeneratedBy::Ai => format!("💡 {}\n\n{}", result.text, texts::AI_FOOTER),
        GeneratedBy::Local => format!("💡 {}", result.text),
    }
}

/// Everything a handler needs, shared across update tasks.
pub struct AppState {
    pub transport: Arc<dyn ChatTransport>,
    pub orchestrator: Arc<Orchestrator>,
    pub voice: VoicePipeline,
    pub contact: ContactFlow,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub monitoring: Arc<dyn MonitoringStore>,
}

impl AppState {
    /// Handle one message; failures are logged, recorded and answered with a
    /// generic apology.
    pub async fn dispatch(&self, msg: InboundMessage) {
        let chat_id = msg.chat_id;
        let user_id = msg.sender.as_ref().map(|s| s.id).unwrap_or(0);

        if let Err(e) = self.handle(msg).await {
            error!("Handler failed for chat {chat_id}: {e}");
            self.analytics.track(AnalyticsEvent::error(user_id, &e, "handler"));
            self.monitoring.record(ErrorEntry::new(Severity::High, "handler", e).for_user(user_id));
            if let Err(e) = self.transport.reply(chat_id, texts::GENERIC_ERROR).await {
                error!("Failed to send error notification: {e}");
            }
        }
    }

    pub async fn handle(&self, msg: InboundMessage) -> Result<(), String> {
        let Some(sender) = &msg.sender else {
            return Ok(());
        };
        let username = sender.username.as_deref();

        if let RateDecision::Limited { .. } = self.rate_limiter.check(sender.id, Utc::now()) {
            self.analytics.track(AnalyticsEvent::new(EventKind::RateLimitHit, sender.id, username));
            return self.transport.reply(msg.chat_id, texts::RATE_LIMITED).await;
        }

        match &msg.content {
            Content::Text(text) if text.trim_start().starts_with('/') => match parse_command(text) {
                Some(command) => {
                    info!("📨 /{} from {} ({})", command.name(), username.unwrap_or("unknown"), sender.id);
                    self.analytics.track(AnalyticsEvent::command(sender.id, username, command.name()));
                    self.run_command(msg.chat_id, sender, command).await
                }
                None => self.transport.reply(msg.chat_id, texts::UNKNOWN_COMMAND).await,
            },
            Content::Text(text) => match self.contact.handle_text(sender, text).await {
                Some(outcome) => {
                    match &outcome {
                        ContactOutcome::Submitted(lead_id) => self.analytics.track(
                            AnalyticsEvent::new(EventKind::LeadCreated, sender.id, username)
                                .with_data(json!({ "leadId": lead_id })),
                        ),
                        ContactOutcome::CrmFailed(e) => {
                            self.monitoring.record(ErrorEntry::new(Severity::High, "crm", e.to_string()).for_user(sender.id))
                        }
                        ContactOutcome::Prompt(_) => {}
                    }
                    self.transport.reply(msg.chat_id, &outcome.reply_text()).await
                }
                None => self.transport.reply(msg.chat_id, texts::UNKNOWN_COMMAND).await,
            },
            Content::Voice(note) => {
                let outcome = self.voice.handle(msg.chat_id, note).await;
                self.analytics.track(
                    AnalyticsEvent::new(EventKind::VoiceProcessed, sender.id, username)
                        .with_data(json!({ "outcome": format!("{outcome:?}"), "duration": note.duration_secs })),
                );
                match outcome {
                    VoiceOutcome::Replied => {
                        self.analytics.track(AnalyticsEvent::idea(sender.id, username, None, GeneratedBy::Ai.as_str()))
                    }
                    VoiceOutcome::Failed(stage) => self.monitoring.record(
                        ErrorEntry::new(Severity::Medium, "voice", format!("{} failed", stage.as_str()))
                            .for_user(sender.id)
                            .with_data(json!({ "fileId": note.file_id, "duration": note.duration_secs })),
                    ),
                    VoiceOutcome::Ignored | VoiceOutcome::Rejected(_) => {}
                }
                Ok(())
            }
            Content::Other => self.transport.reply(msg.chat_id, texts::UNKNOWN_COMMAND).await,
        }
    }

    async fn run_command(&self, chat_id: i64, sender: &Sender, command: Command) -> Result<(), String> {
        if command != Command::Contact {
            self.contact.cancel(sender.id);
        }
        let topics = self.orchestrator.available_topics();

        match command {
            Command::Start => self.transport.reply(chat_id, &texts::start(topics)).await,
            Command::Help => self.transport.reply(chat_id, &texts::help(topics)).await,
            Command::Contact => self.transport.reply(chat_id, self.contact.start(sender.id)).await,
            Command::Idea(topic) => {
                if let Some(t) = topic.as_deref().filter(|t| !corpus::is_known_topic(t)) {
                    debug!("Topic '{t}' is not in the local corpus");
                }
                if let Err(e) = self.transport.send_typing(chat_id).await {
                    debug!("Typing action failed: {e}");
                }
                let request = self.orchestrator.request(topic.as_deref());
                let result = self.orchestrator.generate(&request).await;
                if result.generated_by == GeneratedBy::Local && self.orchestrator.has_provider(request.provider) {
                    self.monitoring.record(
                        ErrorEntry::new(Severity::Low, "ai", format!("{} failed, used local idea", request.provider))
                            .for_user(sender.id),
                    );
                }
                self.analytics.track(AnalyticsEvent::idea(
                    sender.id,
                    sender.username.as_deref(),
                    result.topic.as_deref(),
                    result.generated_by.as_str(),
                ));
                self.transport.reply(chat_id, &format_idea(&result)).await
            }
        }
    }
}
