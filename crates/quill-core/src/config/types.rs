//! Configuration type definitions
//!
//! Every section has serde defaults, so an empty YAML document is a usable
//! configuration as long as an API key can be found in the environment.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::QuillError;
use crate::llm::ModelSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuillConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Endpoint for the custom provider; overrides the built-in base URL for the others.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            model: default_model(),
            streaming: true,
            parameters: ModelParameters::default(),
            auth: LlmAuth::default(),
        }
    }
}

/// LLM provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Groq,
    Custom,
}

impl LlmProvider {
    pub fn label(&self) -> &str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Groq => "groq",
            LlmProvider::Custom => "custom",
        }
    }

    /// Conventional environment variable holding the provider's key.
    pub fn default_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
            LlmProvider::Groq => Some("GROQ_API_KEY"),
            LlmProvider::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParameters {
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ModelParameters {
    pub fn to_settings(&self) -> ModelSettings {
        ModelSettings::new(self.context_length, self.max_tokens, self.temperature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_root")]
    pub root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_vault_root(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub dir: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Route write and create through the confirmation gate as well.
    #[serde(default)]
    pub confirm_writes: bool,
    #[serde(default = "default_affirmations")]
    pub affirmations: Vec<String>,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_new_file")]
    pub default_new_file: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            confirm_writes: false,
            affirmations: default_affirmations(),
            match_threshold: default_match_threshold(),
            default_new_file: default_new_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvironmentConfig {
    /// `KEY=value` files loaded before API keys are resolved.
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_context_length() -> usize {
    crate::llm::DEFAULT_CONTEXT_LENGTH
}

fn default_max_tokens() -> u32 {
    crate::llm::DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    crate::llm::DEFAULT_TEMPERATURE
}

fn default_vault_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    crate::documents::DEFAULT_EXTENSION.to_string()
}

fn default_sessions_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
        .join("sessions")
}

fn default_affirmations() -> Vec<String> {
    crate::guardrails::DEFAULT_AFFIRMATIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_match_threshold() -> f64 {
    crate::documents::resolver::DEFAULT_MATCH_THRESHOLD
}

fn default_new_file() -> String {
    crate::actions::DEFAULT_NEW_FILE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("quill.log")
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl QuillConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), QuillError> {
        if self.llm.model.trim().is_empty() {
            return Err(QuillError::ConfigError("LLM model cannot be empty".to_string()));
        }

        if self.llm.provider == LlmProvider::Custom
            && self.llm.base_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(QuillError::ConfigError(
                "Custom provider requires a valid 'base_url'".to_string(),
            ));
        }

        let params = &self.llm.parameters;
        if params.context_length == 0 {
            return Err(QuillError::ConfigError(
                "LLM context_length must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&params.temperature) {
            return Err(QuillError::ConfigError(format!(
                "LLM temperature must be between 0 and 2, got {}",
                params.temperature
            )));
        }

        let threshold = self.actions.match_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(QuillError::ConfigError(format!(
                "actions.match_threshold must be between 0 and 1 (exclusive), got {}",
                threshold
            )));
        }

        if self.actions.affirmations.iter().all(|a| a.trim().is_empty()) {
            return Err(QuillError::ConfigError(
                "actions.affirmations must contain at least one keyword".to_string(),
            ));
        }

        if self.actions.default_new_file.trim().is_empty() {
            return Err(QuillError::ConfigError(
                "actions.default_new_file cannot be empty".to_string(),
            ));
        }

        if self.vault.extension.trim().is_empty() || self.vault.extension.contains('.') {
            return Err(QuillError::ConfigError(format!(
                "vault.extension must be a bare extension like 'md', got '{}'",
                self.vault.extension
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(QuillError::ConfigError(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}
