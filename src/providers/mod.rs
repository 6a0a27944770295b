//! Provider module for Taskora
//!
//! This module contains the language-model provider abstraction and the
//! OpenAI-compatible and Ollama implementations.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{
    ChatMessage, CompletionResponse, FunctionCall, Provider, TokenUsage, ToolCall,
};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::Result;
use std::time::Duration;

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration including the `type` selector
///
/// # Returns
///
/// Returns a boxed provider instance
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    let timeout = Duration::from_secs(config.request_timeout_seconds);
    match config.provider_type.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config.openai.clone(), timeout)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone(), timeout)?)),
        _ => Err(crate::error::TaskoraError::Provider(format!(
            "Unknown provider type: {}",
            config.provider_type
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_invalid_type() {
        let config = ProviderConfig {
            provider_type: "invalid".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_provider_ollama() {
        let config = ProviderConfig {
            provider_type: "ollama".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_create_provider_openai_with_custom_base() {
        let mut config = ProviderConfig {
            provider_type: "openai".to_string(),
            ..Default::default()
        };
        // A non-default base does not require the key env to be set.
        config.openai.api_base = "http://localhost:9999/v1".to_string();
        config.openai.api_key_env = "TASKORA_TEST_MISSING_KEY".to_string();

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
