//! LLM provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined in
//! `paperforge-core`, plus a factory ([`create_provider`]) that builds the
//! provider named in [`LlmSettings`].
//!
//! [`LlmProvider`]: paperforge_core::llm::provider::LlmProvider

pub mod anthropic;
pub mod openai_compat;

use secrecy::SecretString;

use paperforge_core::llm::box_provider::BoxLlmProvider;
use paperforge_types::config::LlmSettings;
use paperforge_types::llm::{LlmError, ProviderType};

use self::anthropic::AnthropicProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] from the configured [`LlmSettings`].
///
/// `api_key` is the already-resolved secret; a `base_url` in the settings
/// overrides the provider's default endpoint.
///
/// # Errors
///
/// Returns an error if the underlying HTTP client cannot be constructed.
pub fn create_provider(
    settings: &LlmSettings,
    api_key: SecretString,
) -> Result<BoxLlmProvider, LlmError> {
    let provider = match settings.provider {
        ProviderType::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key, settings.model.clone())?;
            if let Some(base_url) = settings.base_url.as_deref() {
                provider = provider.with_base_url(base_url);
            }
            BoxLlmProvider::new(provider)
        }
        ProviderType::OpenAiCompatible => {
            let mut config = openai_compat::config::openai_defaults(api_key, &settings.model);
            if let Some(base_url) = settings.base_url.as_deref() {
                config = config.with_base_url(base_url);
            }
            BoxLlmProvider::new(OpenAiCompatibleProvider::new(config))
        }
    };

    tracing::debug!(
        provider = provider.name(),
        model = %settings.model,
        "created LLM provider"
    );
    Ok(provider)
}
