//! HTTP adapters against an in-process mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use serde_json::Value;

use tokobot::ai::{
    call_provider, CompletionInput, GeneratedBy, Orchestrator, OrchestratorSettings, ProviderConfig, ProviderError,
    ProviderKind, ProviderRegistry,
};
use tokobot::crm::{Bitrix24Client, CrmError, LeadData, LeadSink};
use tokobot::speech::{SpeechKitClient, Transcriber, TranscriptionError};

#[derive(Debug, Clone)]
struct Captured {
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Captured {
    fn header(&self, name: &str) -> &str {
        self.headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct Mock {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<Captured>>>,
}

async fn record(State(mock): State<Mock>, uri: Uri, headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    mock.seen.lock().unwrap().push(Captured { uri: uri.to_string(), headers, body });
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    (mock.status, mock.body)
}

/// Start a server answering every request with `status` and `body`.
async fn serve(status: u16, body: &'static str, delay: Duration) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mock = Mock { status: StatusCode::from_u16(status).unwrap(), body, delay, seen: seen.clone() };
    let app = Router::new().fallback(record).with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn input<'a>(prompt: &'a str, system: Option<&'a str>) -> CompletionInput<'a> {
    CompletionInput { prompt, system, max_tokens: 123, temperature: 0.7 }
}

fn registry_for(config: ProviderConfig) -> ProviderRegistry {
    ProviderRegistry::from_configs(&[config], &reqwest::Client::new())
}

#[tokio::test]
async fn test_groq_round_trip() {
    let (base, seen) = serve(200, r#"{"choices":[{"message":{"content":" Groq idea "}}]}"#, Duration::ZERO).await;
    let registry = registry_for(
        ProviderConfig::new(ProviderKind::Groq, "gsk_test").with_endpoint(format!("{base}/openai/v1/chat/completions")),
    );
    let provider = registry.get(ProviderKind::Groq).unwrap();

    let text = call_provider(provider.as_ref(), &input("prompt", Some("sys")), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(text, "Groq idea");

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.uri, "/openai/v1/chat/completions");
    assert_eq!(req.header("authorization"), "Bearer gsk_test");
    let body = req.json();
    assert_eq!(body["model"], "llama-3.3-70b-versatile");
    assert_eq!(body["max_tokens"], 123);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "prompt");
}

#[tokio::test]
async fn test_gemini_round_trip() {
    let (base, seen) = serve(
        200,
        r#"{"candidates":[{"content":{"parts":[{"text":"Gemini idea"}]}}]}"#,
        Duration::ZERO,
    )
    .await;
    let registry = registry_for(ProviderConfig::new(ProviderKind::Gemini, "gem-key").with_endpoint(format!("{base}/v1beta/models")));
    let provider = registry.get(ProviderKind::Gemini).unwrap();

    let text = call_provider(provider.as_ref(), &input("prompt", None), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(text, "Gemini idea");

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.uri, "/v1beta/models/gemini-2.0-flash-exp:generateContent");
    assert_eq!(req.header("x-goog-api-key"), "gem-key");
    assert_eq!(req.json()["generationConfig"]["maxOutputTokens"], 123);
}

#[tokio::test]
async fn test_yandexgpt_round_trip() {
    let (base, seen) = serve(
        200,
        r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"Yandex idea"},"status":"ALTERNATIVE_STATUS_FINAL"}]}}"#,
        Duration::ZERO,
    )
    .await;
    let registry = registry_for(
        ProviderConfig::new(ProviderKind::YandexGpt, "y-key")
            .with_folder_id("b1gfolder")
            .with_endpoint(format!("{base}/foundationModels/v1/completion")),
    );
    let provider = registry.get(ProviderKind::YandexGpt).unwrap();

    let text = call_provider(provider.as_ref(), &input("prompt", None), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(text, "Yandex idea");

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.header("authorization"), "Api-Key y-key");
    assert_eq!(req.header("x-folder-id"), "b1gfolder");
    let body = req.json();
    assert_eq!(body["modelUri"], "gpt://b1gfolder/yandexgpt-lite");
    assert_eq!(body["completionOptions"]["maxTokens"], "123");
}

#[tokio::test]
async fn test_huggingface_round_trip() {
    let (base, seen) = serve(200, r#"[{"generated_text":"HF idea"}]"#, Duration::ZERO).await;
    let registry = registry_for(
        ProviderConfig::new(ProviderKind::HuggingFace, "hf_token")
            .with_model("org/model")
            .with_endpoint(format!("{base}/models")),
    );
    let provider = registry.get(ProviderKind::HuggingFace).unwrap();

    let text = call_provider(provider.as_ref(), &input("prompt", None), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(text, "HF idea");

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.uri, "/models/org/model");
    assert_eq!(req.header("authorization"), "Bearer hf_token");
}

#[tokio::test]
async fn test_http_error_carries_status() {
    let (base, _) = serve(429, r#"{"error":{"message":"rate limited"}}"#, Duration::ZERO).await;
    let registry = registry_for(ProviderConfig::new(ProviderKind::Groq, "k").with_endpoint(base));
    let provider = registry.get(ProviderKind::Groq).unwrap();

    let err = call_provider(provider.as_ref(), &input("p", None), Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        ProviderError::Http { provider, status, body } => {
            assert_eq!(provider, ProviderKind::Groq);
            assert_eq!(status, Some(429));
            assert!(body.contains("rate limited"));
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_server_hits_deadline() {
    let (base, _) = serve(200, r#"{"choices":[{"message":{"content":"late"}}]}"#, Duration::from_secs(5)).await;
    let registry = registry_for(ProviderConfig::new(ProviderKind::Groq, "k").with_endpoint(base));
    let provider = registry.get(ProviderKind::Groq).unwrap();

    let started = std::time::Instant::now();
    let err = call_provider(provider.as_ref(), &input("p", None), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_orchestrator_falls_back_on_server_error() {
    let (base, seen) = serve(500, "internal error", Duration::ZERO).await;
    let registry = registry_for(ProviderConfig::new(ProviderKind::Groq, "k").with_endpoint(base));
    let orchestrator = Orchestrator::new(registry, OrchestratorSettings::default());

    let result = orchestrator.generate(&orchestrator.request(Some("marketing"))).await;
    assert_eq!(result.generated_by, GeneratedBy::Local);
    assert!(!result.text.is_empty());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_speechkit_round_trip() {
    let (base, seen) = serve(200, r#"{"result":"придумай идею для кафе"}"#, Duration::ZERO).await;
    let client = SpeechKitClient::new("stt-key".into(), "b1g".into(), reqwest::Client::new())
        .with_endpoint(format!("{base}/speech/v1/stt:recognize"));

    let result = client.transcribe(b"OggS fake", "ru-RU").await.unwrap();
    assert_eq!(result.text, "придумай идею для кафе");

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.uri, "/speech/v1/stt:recognize?lang=ru-RU&folderId=b1g");
    assert_eq!(req.header("authorization"), "Api-Key stt-key");
    assert_eq!(&req.body[..], b"OggS fake");
}

#[tokio::test]
async fn test_speechkit_http_error() {
    let (base, _) = serve(401, r#"{"error_code":"UNAUTHORIZED"}"#, Duration::ZERO).await;
    let client = SpeechKitClient::new("bad".into(), "b1g".into(), reqwest::Client::new()).with_endpoint(base);
    let err = client.transcribe(b"x", "ru-RU").await.unwrap_err();
    assert!(matches!(err, TranscriptionError::Http { status: Some(401), .. }));
}

#[tokio::test]
async fn test_bitrix24_round_trip() {
    let (base, seen) = serve(200, r#"{"result":4321,"time":{"start":1}}"#, Duration::ZERO).await;
    let client = Bitrix24Client::new(format!("{base}/rest/1/secret"), reqwest::Client::new());
    let lead = LeadData {
        name: "Олег".into(),
        email: Some("oleg@example.com".into()),
        ..Default::default()
    };

    assert_eq!(client.create_lead(&lead).await, Ok(4321));

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.uri, "/rest/1/secret/crm.lead.add.json");
    let body = req.json();
    assert_eq!(body["fields"]["TITLE"], "Заявка от Олег");
    assert_eq!(body["fields"]["EMAIL"][0]["VALUE"], "oleg@example.com");
}

#[tokio::test]
async fn test_bitrix24_error_body() {
    let (base, _) = serve(200, r#"{"error":"ACCESS_DENIED","error_description":"no rights"}"#, Duration::ZERO).await;
    let client = Bitrix24Client::new(base, reqwest::Client::new());
    let lead = LeadData { name: "Олег".into(), ..Default::default() };
    let err = client.create_lead(&lead).await.unwrap_err();
    assert_eq!(err, CrmError::Api { status: None, message: "ACCESS_DENIED: no rights".into() });
}

#[tokio::test]
async fn test_bitrix24_timeout() {
    let (base, _) = serve(200, r#"{"result":1}"#, Duration::from_secs(5)).await;
    let client = Bitrix24Client::new(base, reqwest::Client::new()).with_timeout(Duration::from_millis(200));
    let lead = LeadData { name: "Олег".into(), ..Default::default() };
    assert_eq!(client.create_lead(&lead).await, Err(CrmError::Timeout(Duration::from_millis(200))));
}
