//! Configuration for OpenAI-compatible providers.
//!
//! Any server speaking the OpenAI chat completions protocol (OpenAI itself,
//! vLLM, Ollama, LiteLLM gateways) is reached through one
//! [`OpenAiCompatConfig`] with the right base URL.

use paperforge_types::llm::ProviderCapabilities;
use secrecy::SecretString;

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name used in logs.
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Model identifier (e.g., "gpt-4o").
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

impl OpenAiCompatConfig {
    /// Point the config at a different server, keeping everything else.
    ///
    /// A non-default URL renames the provider to `openai_compatible` so logs
    /// do not claim the request went to OpenAI.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url != OPENAI_BASE_URL {
            self.provider_name = "openai_compatible".into();
        }
        self.base_url = base_url;
        self
    }
}

/// OpenAI default configuration.
///
/// Base URL: `https://api.openai.com/v1`; 128K context, 16K output.
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            tool_calling: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    }
}
