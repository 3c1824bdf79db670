//! Voice pipeline end to end: real SpeechKit and Groq adapters against local
//! mock servers, with an in-memory chat transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::routing::post;
use axum::Router;

use tokobot::ai::{Orchestrator, OrchestratorSettings, ProviderConfig, ProviderKind, ProviderRegistry};
use tokobot::bot::texts;
use tokobot::bot::voice::{VoiceNote, VoiceOutcome, VoicePipeline, VoiceSettings, VoiceStage};
use tokobot::bot::{ChatTransport, DownloadError};
use tokobot::speech::{SpeechKitClient, Transcriber};

#[derive(Default)]
struct MemoryTransport {
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn reply(&self, _chat_id: i64, text: &str) -> Result<(), String> {
        self.replies.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_typing(&self, _chat_id: i64) -> Result<(), String> {
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DownloadError> {
        Ok(format!("OggS:{file_id}").into_bytes())
    }
}

/// One server with both backends mounted; counts completion calls.
async fn backends(transcript: &'static str, stt_status: u16) -> (String, Arc<AtomicUsize>) {
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = completions.clone();
    let app = Router::new()
        .route(
            "/stt",
            post(move || async move {
                let status = axum::http::StatusCode::from_u16(stt_status).unwrap();
                (status, format!(r#"{{"result":"{transcript}"}}"#))
            }),
        )
        .route(
            "/chat",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    r#"{"choices":[{"message":{"content":"Сервис доставки с AI-маршрутизацией"}}]}"#
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), completions)
}

fn pipeline(base: &str, transport: Arc<MemoryTransport>) -> VoicePipeline {
    let http = reqwest::Client::new();
    let registry = ProviderRegistry::from_configs(
        &[ProviderConfig::new(ProviderKind::Groq, "gsk").with_endpoint(format!("{base}/chat"))],
        &http,
    );
    let orchestrator = Arc::new(Orchestrator::new(registry, OrchestratorSettings::default()));
    let stt: Arc<dyn Transcriber> =
        Arc::new(SpeechKitClient::new("key".into(), "folder".into(), http).with_endpoint(format!("{base}/stt")));
    VoicePipeline::new(transport, Some(stt), orchestrator, VoiceSettings::default())
}

fn note() -> VoiceNote {
    VoiceNote { file_id: "AwACAgIA".into(), duration_secs: 4, file_size: Some(9000) }
}

#[tokio::test]
async fn test_trigger_phrase_produces_idea() {
    let (base, completions) = backends("Придумай идею про доставку", 200).await;
    let transport = Arc::new(MemoryTransport::default());
    let outcome = pipeline(&base, transport.clone()).handle(1, &note()).await;

    assert_eq!(outcome, VoiceOutcome::Replied);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(
        transport.replies.lock().unwrap().as_slice(),
        ["💡 Сервис доставки с AI-маршрутизацией".to_string()]
    );
}

#[tokio::test]
async fn test_other_speech_is_ignored() {
    let (base, completions) = backends("какая погода", 200).await;
    let transport = Arc::new(MemoryTransport::default());
    let outcome = pipeline(&base, transport.clone()).handle(1, &note()).await;

    assert_eq!(outcome, VoiceOutcome::Ignored);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert!(transport.replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_recognition_error_apologizes() {
    let (base, completions) = backends("", 500).await;
    let transport = Arc::new(MemoryTransport::default());
    let outcome = pipeline(&base, transport.clone()).handle(1, &note()).await;

    assert_eq!(outcome, VoiceOutcome::Failed(VoiceStage::Transcription));
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(
        transport.replies.lock().unwrap().as_slice(),
        [texts::VOICE_TRANSCRIPTION_FAILED.to_string()]
    );
}
