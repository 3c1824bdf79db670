//! AI completion layer: provider adapters, orchestration and local fallback.

pub mod corpus;
pub mod gemini;
pub mod groq;
pub mod huggingface;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod yandex;

pub use orchestrator::{CompletionRequest, CompletionResult, GeneratedBy, Orchestrator, OrchestratorSettings};
pub use provider::{
    call_provider, CompletionInput, CompletionProvider, ProviderConfig, ProviderError, ProviderKind, ProviderRegistry,
};
