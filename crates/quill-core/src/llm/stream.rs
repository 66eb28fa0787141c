//! Stream accumulation
//!
//! Folds model output into the final reply text. While a reply is in flight the
//! growing buffer is published on a `watch` channel as a placeholder; it is cleared
//! once the stream concludes so it never outlives the turn.

use futures_util::stream::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::errors::QuillError;
use crate::llm::{ModelAdapter, ModelSettings, Prompt};

/// How a model turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream finished normally.
    Complete(String),
    /// A non-terminal failure after some text arrived; the text is the reply.
    Truncated { text: String, error: QuillError },
    /// Nothing usable: authentication, rate limiting, or a failure before any text.
    Failed(QuillError),
    /// Abandoned by the caller. No action may run on this text.
    Cancelled { partial: String },
}

impl StreamOutcome {
    /// Reply text that may be parsed for actions.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamOutcome::Complete(text) | StreamOutcome::Truncated { text, .. } => Some(text),
            StreamOutcome::Failed(_) | StreamOutcome::Cancelled { .. } => None,
        }
    }
}

pub struct StreamAccumulator {
    placeholder: watch::Sender<Option<String>>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        let (placeholder, _) = watch::channel(None);
        Self { placeholder }
    }

    /// In-progress text of the current turn; `None` when no turn is streaming.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.placeholder.subscribe()
    }

    pub async fn accumulate(
        &self,
        adapter: &dyn ModelAdapter,
        prompt: &Prompt,
        settings: &ModelSettings,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        log::debug!(
            "Requesting reply from {} (streaming: {})",
            adapter.name(),
            adapter.supports_streaming()
        );
        self.placeholder.send_replace(Some(String::new()));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let partial = self.placeholder.borrow().clone().unwrap_or_default();
                log::info!("Reply cancelled after {} characters", partial.len());
                StreamOutcome::Cancelled { partial }
            }
            (text, error) = self.drive(adapter, prompt, settings) => Self::finish(text, error),
        };

        self.placeholder.send_replace(None);
        outcome
    }

    async fn drive(
        &self,
        adapter: &dyn ModelAdapter,
        prompt: &Prompt,
        settings: &ModelSettings,
    ) -> (String, Option<QuillError>) {
        if !adapter.supports_streaming() {
            return match adapter.complete(prompt, settings).await {
                Ok(text) => {
                    self.placeholder.send_replace(Some(text.clone()));
                    (text, None)
                }
                Err(e) => (String::new(), Some(e)),
            };
        }

        let mut chunks = match adapter.iterate(prompt, settings).await {
            Ok(chunks) => chunks,
            Err(e) => return (String::new(), Some(e)),
        };

        let mut buffer = String::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    buffer.push_str(&text);
                    self.placeholder.send_replace(Some(buffer.clone()));
                }
                Err(e) => return (buffer, Some(e)),
            }
        }
        (buffer, None)
    }

    fn finish(text: String, error: Option<QuillError>) -> StreamOutcome {
        let error = match error {
            None => {
                log::debug!("Reply complete ({} characters)", text.len());
                return StreamOutcome::Complete(text);
            }
            Some(QuillError::TransportError(msg)) => QuillError::classify_transport(msg),
            Some(other) => other,
        };

        if error.is_terminal_stream_error() {
            log::error!("Reply failed: {}", error);
            StreamOutcome::Failed(error)
        } else if text.is_empty() {
            log::error!("Reply failed before any text arrived: {}", error);
            match error {
                QuillError::TransportError(_) => StreamOutcome::Failed(error),
                other => StreamOutcome::Failed(QuillError::TransportError(other.to_string())),
            }
        } else {
            log::warn!(
                "Reply interrupted after {} characters: {}",
                text.len(),
                error
            );
            StreamOutcome::Truncated { text, error }
        }
    }
}
