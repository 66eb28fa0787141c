//! Configuration loader for YAML files and environment resolution

use std::env;
use std::path::Path;

use tokio::fs;

use crate::config::types::*;
use crate::errors::QuillError;

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<QuillConfig, QuillError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            QuillError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse(&content)?;

        // Relative paths in the file are relative to the file itself
        if let Some(base_dir) = path.parent() {
            if config.vault.root.is_relative() {
                config.vault.root = base_dir.join(&config.vault.root);
            }
            for env_file in &mut config.environment.env_files {
                if env_file.is_relative() {
                    *env_file = base_dir.join(&*env_file);
                }
            }
        }
        Self::resolve_environment(&mut config)?;
        config.validate()?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<QuillConfig, QuillError> {
        let mut config = Self::parse(content)?;
        Self::resolve_environment(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Configuration used when no file is given: defaults plus environment keys.
    pub fn from_env() -> Result<QuillConfig, QuillError> {
        Self::from_str("")
    }

    fn parse(content: &str) -> Result<QuillConfig, QuillError> {
        if content.trim().is_empty() {
            return Ok(QuillConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| QuillError::ConfigError(format!("Failed to parse YAML config: {}", e)))
    }

    fn resolve_environment(config: &mut QuillConfig) -> Result<(), QuillError> {
        for env_file in &config.environment.env_files {
            if env_file.exists() {
                Self::load_env_file(env_file)?;
            }
        }

        for (key, value) in &config.environment.variables {
            env::set_var(key, value);
        }

        Self::resolve_llm_auth(&config.llm.provider, &mut config.llm.auth);
        Ok(())
    }

    fn load_env_file<P: AsRef<Path>>(path: P) -> Result<(), QuillError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QuillError::ConfigError(format!(
                "Failed to read env file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                env::set_var(key, value);
            }
        }

        Ok(())
    }

    /// Resolve the API key: `api_key_env` first, then the provider's usual variable
    /// when neither key nor variable name is configured.
    fn resolve_llm_auth(provider: &LlmProvider, auth: &mut LlmAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            if let Some(env_var) = provider.default_key_env() {
                if let Ok(api_key) = env::var(env_var) {
                    log::debug!("Using API key from {}", env_var);
                    auth.api_key = Some(api_key);
                }
            }
        }
    }
}
