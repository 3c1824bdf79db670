use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use tokobot::ai::{Orchestrator, ProviderRegistry};
use tokobot::bot::contact::ContactFlow;
use tokobot::bot::{AppState, Content, InboundMessage, Sender, TelegramClient, VoiceNote, VoicePipeline};
use tokobot::config::Config;
use tokobot::crm::{Bitrix24Client, LeadSink};
use tokobot::dashboard::{self, DashboardState};
use tokobot::speech::{SpeechKitClient, Transcriber};
use tokobot::store::{
    AnalyticsStore, InMemoryAnalytics, InMemoryMonitoring, InMemoryRateLimiter, MonitoringStore, RateLimitStore,
};
use tokobot::telegram_log::TelegramLogLayer;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("tokobot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("❌ Failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting tokobot...");
    info!("{config:?}");

    let http = reqwest::Client::new();

    let providers = ProviderRegistry::from_configs(&config.providers, &http);
    info!("AI providers: {:?}", providers.kinds());
    let orchestrator = Arc::new(Orchestrator::new(providers, config.orchestrator_settings()));
    if !orchestrator.has_provider(config.ai_provider) {
        warn!("{} has no API key, /idea will use local ideas", config.ai_provider);
    }

    let transport = Arc::new(TelegramClient::new(bot.clone()));

    let transcriber = config.speech.as_ref().map(|speech| {
        Arc::new(SpeechKitClient::new(speech.api_key.clone(), speech.folder_id.clone(), http.clone()))
            as Arc<dyn Transcriber>
    });
    let voice = VoicePipeline::new(transport.clone(), transcriber, orchestrator.clone(), config.voice_settings());
    if voice.is_available() {
        info!("🎤 Voice enabled (provider: {})", config.voice_provider);
    } else {
        info!("🎤 Voice disabled (needs YANDEX_API_KEY, YANDEX_FOLDER_ID and a {} key)", config.voice_provider);
    }

    let sink = config
        .bitrix24_webhook
        .as_ref()
        .map(|webhook| Arc::new(Bitrix24Client::new(webhook.clone(), http.clone())) as Arc<dyn LeadSink>);
    if sink.is_none() {
        info!("💼 BITRIX24_WEBHOOK not set, /contact disabled");
    }

    let rate_limiter = Arc::new(InMemoryRateLimiter::default());
    let analytics: Arc<dyn AnalyticsStore> = Arc::new(InMemoryAnalytics::default());
    let monitoring: Arc<dyn MonitoringStore> = Arc::new(InMemoryMonitoring::default());

    let purge_every = rate_limiter.window().to_std().unwrap_or(Duration::from_secs(60));
    let limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            limiter.purge_expired(Utc::now());
        }
    });

    // Errors older than a day are dropped hourly.
    let errors = monitoring.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            errors.purge_older_than(Utc::now(), TimeDelta::hours(24));
        }
    });

    if let Some(addr) = config.dashboard_addr {
        let state = DashboardState {
            analytics: analytics.clone(),
            monitoring: monitoring.clone(),
            token: config.dashboard_token.clone(),
        };
        if state.token.is_none() {
            warn!("📊 DASHBOARD_TOKEN not set, dashboard is open");
        }
        tokio::spawn(async move {
            if let Err(e) = dashboard::serve(addr, state).await {
                error!("📊 Dashboard stopped: {e}");
            }
        });
    }

    let state = Arc::new(AppState {
        transport,
        orchestrator,
        voice,
        contact: ContactFlow::new(sink),
        rate_limiter,
        analytics,
        monitoring,
    });

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    state.dispatch(inbound_message(&msg)).await;
    Ok(())
}

fn inbound_message(msg: &Message) -> InboundMessage {
    let sender = msg.from.as_ref().map(|user| Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
    });

    let content = if let Some(voice) = msg.voice() {
        Content::Voice(VoiceNote {
            file_id: voice.file.id.0.clone(),
            duration_secs: voice.duration.seconds(),
            file_size: Some(voice.file.size),
        })
    } else if let Some(text) = msg.text() {
        Content::Text(text.to_string())
    } else {
        Content::Other
    };

    InboundMessage { chat_id: msg.chat.id.0, sender, content }
}
