//! Model provider implementations
//!
//! OpenAI, Groq and custom endpoints all speak the OpenAI completions protocol and
//! share [`openai::OpenAIClient`]; providers differ in base URL and key lookup.

use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::QuillError;
use crate::llm::ModelAdapter;

pub mod openai;

pub use openai::{OpenAIClient, GROQ_API_BASE, OPENAI_API_BASE};

/// Create a model adapter based on the provider configuration
pub fn create_adapter(config: &LlmConfig) -> Result<Arc<dyn ModelAdapter>, QuillError> {
    validate_provider_config(config)?;

    let api_key = config.auth.api_key.clone().unwrap_or_default();
    let base_url = match (&config.provider, &config.base_url) {
        (_, Some(url)) if !url.trim().is_empty() => url.clone(),
        (LlmProvider::Groq, _) => GROQ_API_BASE.to_string(),
        _ => OPENAI_API_BASE.to_string(),
    };

    let client = OpenAIClient::new(api_key, config.model.clone())
        .with_api_base(base_url)
        .with_provider(config.provider.label())
        .with_streaming(config.streaming);

    log::info!("Using model {} via {}", config.model, config.provider.label());
    Ok(Arc::new(client))
}

/// Get the default model for a provider if none is specified
pub fn get_default_model(provider: &LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "gpt-4o-mini",
        LlmProvider::Groq => "llama-3.1-8b-instant",
        LlmProvider::Custom => "gpt-4o-mini",
    }
}

/// Validate provider-specific configuration
pub fn validate_provider_config(config: &LlmConfig) -> Result<(), QuillError> {
    match &config.provider {
        LlmProvider::OpenAI | LlmProvider::Groq => {
            if config.auth.api_key.as_deref().map_or(true, str::is_empty) {
                let hint = config
                    .auth
                    .api_key_env
                    .as_deref()
                    .or_else(|| config.provider.default_key_env())
                    .unwrap_or("api_key");
                return Err(QuillError::ConfigError(format!(
                    "No API key found for {}. Set llm.auth.api_key or {}",
                    config.provider.label(),
                    hint
                )));
            }
        }
        LlmProvider::Custom => {
            if config.base_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
                return Err(QuillError::ConfigError(
                    "Custom provider requires a valid 'base_url'".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmAuth;

    fn config(provider: LlmProvider, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            auth: LlmAuth {
                api_key: api_key.map(str::to_string),
                api_key_env: None,
            },
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_openai_requires_key() {
        let err = create_adapter(&config(LlmProvider::OpenAI, None)).err().unwrap();
        assert!(matches!(err, QuillError::ConfigError(msg) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_groq_adapter() {
        let mut cfg = config(LlmProvider::Groq, Some("k"));
        cfg.model = "llama3-8b-8192".to_string();
        let adapter = create_adapter(&cfg).unwrap();
        assert_eq!(adapter.name(), "groq / llama3-8b-8192");
        assert!(adapter.supports_streaming());
    }

    #[test]
    fn test_custom_without_key_is_allowed() {
        let mut cfg = config(LlmProvider::Custom, None);
        cfg.base_url = Some("http://localhost:1234/v1".to_string());
        cfg.streaming = false;
        let adapter = create_adapter(&cfg).unwrap();
        assert!(!adapter.supports_streaming());
    }

    #[test]
    fn test_custom_requires_base_url() {
        assert!(create_adapter(&config(LlmProvider::Custom, None)).is_err());
    }

    #[test]
    fn test_default_models() {
        assert_eq!(get_default_model(&LlmProvider::OpenAI), "gpt-4o-mini");
        assert!(!get_default_model(&LlmProvider::Groq).is_empty());
    }
}
