//! Language model adapters and response streaming.
//!
//! A [`ModelAdapter`] turns a prompt into text, either in one call or as a stream of
//! chunks. The [`stream::StreamAccumulator`] sits on top and folds whatever the adapter
//! produces into a single reply, classifying failures along the way.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::QuillError;

pub mod providers;
pub mod response_parser;
pub mod stream;

pub use response_parser::ResponseParser;
pub use stream::{StreamAccumulator, StreamOutcome};

pub const DEFAULT_CONTEXT_LENGTH: usize = 4000;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Finite, non-restartable sequence of text chunks. May fail part way through.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, QuillError>> + Send>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl Prompt {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: String::new(),
        }
    }
}

/// Provider settings as an opaque JSON blob.
///
/// The caller stores and round-trips the blob untouched; adapters read the fields they
/// understand and fall back to defaults for anything missing or malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSettings(pub Value);

impl Default for ModelSettings {
    fn default() -> Self {
        Self(json!({
            "context_length": DEFAULT_CONTEXT_LENGTH,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "temperature": DEFAULT_TEMPERATURE,
        }))
    }
}

impl ModelSettings {
    pub fn new(context_length: usize, max_tokens: u32, temperature: f32) -> Self {
        Self(json!({
            "context_length": context_length,
            "max_tokens": max_tokens,
            "temperature": temperature,
        }))
    }

    /// Parses a serialized blob, falling back to defaults when it is not a JSON object.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) if value.is_object() => Self(value),
            Ok(_) | Err(_) => {
                log::warn!("Ignoring unparsable model settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn context_length(&self) -> usize {
        self.0
            .get("context_length")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CONTEXT_LENGTH)
    }

    pub fn max_tokens(&self) -> u32 {
        self.0
            .get("max_tokens")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> f32 {
        self.0
            .get("temperature")
            .and_then(Value::as_f64)
            .map(|t| t as f32)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Short provider/model label for logs and status lines.
    fn name(&self) -> String;

    async fn complete(&self, prompt: &Prompt, settings: &ModelSettings)
        -> Result<String, QuillError>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Streams the reply in chunks. Adapters without streaming yield the single
    /// completed reply.
    async fn iterate(
        &self,
        prompt: &Prompt,
        settings: &ModelSettings,
    ) -> Result<ChunkStream, QuillError> {
        let text = self.complete(prompt, settings).await?;
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(text)])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct OneShot;

    #[async_trait]
    impl ModelAdapter for OneShot {
        fn name(&self) -> String {
            "one-shot".to_string()
        }

        async fn complete(
            &self,
            prompt: &Prompt,
            _settings: &ModelSettings,
        ) -> Result<String, QuillError> {
            Ok(format!("echo: {}", prompt.prefix))
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ModelSettings::default();
        assert_eq!(settings.context_length(), 4000);
        assert_eq!(settings.max_tokens(), 2048);
        assert!((settings.temperature() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_settings_partial_blob() {
        let settings = ModelSettings::parse(r#"{"max_tokens": 64, "extra": "kept"}"#);
        assert_eq!(settings.max_tokens(), 64);
        assert_eq!(settings.context_length(), DEFAULT_CONTEXT_LENGTH);
        assert_eq!(settings.as_value()["extra"], "kept");
    }

    #[test]
    fn test_settings_unparsable_blob() {
        assert_eq!(ModelSettings::parse("not json"), ModelSettings::default());
        assert_eq!(ModelSettings::parse("[1, 2]"), ModelSettings::default());
    }

    #[tokio::test]
    async fn test_default_iterate_yields_single_chunk() {
        let chunks: Vec<_> = OneShot
            .iterate(&Prompt::new("hi"), &ModelSettings::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks, vec![Ok("echo: hi".to_string())]);
    }
}
