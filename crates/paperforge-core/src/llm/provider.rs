//! LlmProvider trait definition.
//!
//! This is the core abstraction that all LLM providers implement.

use paperforge_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

/// Trait for LLM provider backends (OpenAI-compatible, Anthropic).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Providers
/// are assumed unreliable: callers wrap every `complete` in the pipeline's
/// retry policy.
///
/// Implementations live in paperforge-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// What this provider supports.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
