//! LLM provider implementations for Codewright.
//!
//! All providers implement the `codewright_core::Provider` trait. Every
//! supported backend speaks the OpenAI chat-completions protocol, so a
//! single implementation covers them; configuration picks the endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use codewright_config::AppConfig;
use codewright_core::error::ProviderError;
use codewright_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// Build the configured provider.
///
/// Local endpoints (`ollama`) need no key; everything else fails with
/// [`ProviderError::NotConfigured`] when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let settings = &config.provider;

    let api_key = match (&config.api_key, settings.name.as_str()) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".to_string(),
        (None, name) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}'. Set CODEWRIGHT_API_KEY or api_key in {}",
                AppConfig::config_path().display()
            )));
        }
    };

    info!(provider = %settings.name, base_url = %settings.base_url, "Using provider");
    Ok(Arc::new(OpenAiCompatProvider::new(
        settings.name.clone(),
        settings.base_url.clone(),
        api_key,
    )?))
}
