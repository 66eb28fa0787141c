use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::{Stream, TryStreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::io::StreamReader;

use crate::errors::QuillError;
use crate::llm::response_parser::STREAM_DONE;
use crate::llm::{ChunkStream, ModelAdapter, ModelSettings, Prompt, ResponseParser};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Client for OpenAI and OpenAI-compatible completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    provider: String,
    streaming: bool,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
            model,
            provider: "openai".to_string(),
            streaming: true,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat models go to `/chat/completions`; other OpenAI models use legacy `/completions`.
    /// Compatible providers only serve the chat endpoint.
    pub fn is_chat_model(&self) -> bool {
        self.provider != "openai"
            || (self.model.contains("gpt-") && !self.model.starts_with("text-"))
    }

    fn endpoint(&self) -> String {
        if self.is_chat_model() {
            format!("{}/chat/completions", self.api_base)
        } else {
            format!("{}/completions", self.api_base)
        }
    }

    fn build_request_body(&self, prompt: &Prompt, settings: &ModelSettings, stream: bool) -> Value {
        let text = truncate_prefix(&prompt.prefix, settings.context_length());
        let mut body = if self.is_chat_model() {
            json!({
                "model": self.model,
                "messages": [{"role": "user", "content": text}],
            })
        } else {
            let mut body = json!({
                "model": self.model,
                "prompt": text,
            });
            if !prompt.suffix.is_empty() {
                body["suffix"] = prompt.suffix.clone().into();
            }
            body
        };
        body["max_tokens"] = settings.max_tokens().into();
        body["temperature"] = settings.temperature().into();
        if stream {
            body["stream"] = true.into();
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, QuillError> {
        let url = self.endpoint();
        log::debug!("{} request to {}", self.provider, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| QuillError::TransportError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| {
                "Unknown error while reading error response body".to_string()
            });
            let err = ResponseParser::parse_error(status.as_u16(), &error_text);
            log::error!("{}", err);
            return Err(err);
        }
        Ok(response)
    }
}

/// Text deltas from an OpenAI-style server-sent event stream, up to `[DONE]`.
fn sse_text_chunks<R>(mut lines: Lines<R>) -> impl Stream<Item = Result<String, QuillError>> + Send
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    try_stream! {
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| QuillError::TransportError(format!("Stream interrupted: {}", e)))?;
            let Some(line) = line else {
                break;
            };
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            if data.trim() == STREAM_DONE {
                break;
            }
            if let Some(text) = ResponseParser::parse_stream_data(data)? {
                if !text.is_empty() {
                    yield text;
                }
            }
        }
    }
}

/// Keeps the last `limit` characters of the prompt.
pub fn truncate_prefix(prefix: &str, limit: usize) -> &str {
    let count = prefix.chars().count();
    if count <= limit {
        return prefix;
    }
    let skip = count - limit;
    match prefix.char_indices().nth(skip) {
        Some((index, _)) => &prefix[index..],
        None => "",
    }
}

#[async_trait]
impl ModelAdapter for OpenAIClient {
    fn name(&self) -> String {
        format!("{} / {}", self.provider, self.model)
    }

    async fn complete(&self, prompt: &Prompt, settings: &ModelSettings) -> Result<String, QuillError> {
        let body = self.build_request_body(prompt, settings, false);
        let response = self.send(&body).await?;
        let response_text = response
            .text()
            .await
            .map_err(|e| QuillError::TransportError(format!("Failed to read response: {}", e)))?;

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| QuillError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        if self.is_chat_model() {
            ResponseParser::parse_chat_response(&response_json)
        } else {
            ResponseParser::parse_completion_response(&response_json)
        }
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn iterate(&self, prompt: &Prompt, settings: &ModelSettings) -> Result<ChunkStream, QuillError> {
        let body = self.build_request_body(prompt, settings, true);
        let response = self.send(&body).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()));
        let lines_reader = StreamReader::new(stream).lines();

        Ok(Box::pin(sse_text_chunks(lines_reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAIClient::new("test-key".to_string(), "gpt-4o-mini".to_string())
            .with_api_base("https://example.com/v1/".to_string());
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_base, "https://example.com/v1");
        assert_eq!(client.name(), "openai / gpt-4o-mini");
    }

    #[test]
    fn test_chat_model_detection() {
        let chat = OpenAIClient::new("k".into(), "gpt-4o".into());
        assert!(chat.is_chat_model());
        assert!(chat.endpoint().ends_with("/chat/completions"));

        let legacy = OpenAIClient::new("k".into(), "text-davinci-003".into());
        assert!(!legacy.is_chat_model());
        assert!(legacy.endpoint().ends_with("/completions"));
        assert!(!legacy.endpoint().ends_with("/chat/completions"));

        let instruct = OpenAIClient::new("k".into(), "babbage-002".into());
        assert!(!instruct.is_chat_model());
    }

    #[test]
    fn test_groq_models_use_chat_endpoint() {
        let groq = OpenAIClient::new("k".into(), "llama3-70b-8192".into())
            .with_provider("groq")
            .with_api_base(GROQ_API_BASE.to_string());
        assert!(groq.is_chat_model());
    }

    #[test]
    fn test_request_body() {
        let client = OpenAIClient::new("k".into(), "gpt-4o".into());
        let settings = ModelSettings::new(5, 100, 0.5);
        let body = client.build_request_body(&Prompt::new("0123456789"), &settings, true);
        assert_eq!(body["messages"][0]["content"], "56789");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream"], true);

        let legacy = OpenAIClient::new("k".into(), "davinci-002".into());
        let body = legacy.build_request_body(&Prompt::new("abc"), &settings, false);
        assert_eq!(body["prompt"], "abc");
        assert!(body.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_sse_chunks() {
        use futures::StreamExt;

        let body: &'static [u8] = b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
: keep-alive\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
data: [DONE]\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n";
        let chunks: Vec<_> = sse_text_chunks(tokio::io::BufReader::new(body).lines())
            .collect()
            .await;
        assert_eq!(chunks, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
    }

    #[tokio::test]
    async fn test_sse_error_event() {
        use futures::StreamExt;

        let body: &'static [u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
data: {\"error\":{\"message\":\"bad key\",\"code\":\"invalid_api_key\"}}\n\n";
        let chunks: Vec<_> = sse_text_chunks(tokio::io::BufReader::new(body).lines())
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], Err(QuillError::AuthError(_))));
    }

    #[test]
    fn test_truncate_prefix() {
        assert_eq!(truncate_prefix("hello", 10), "hello");
        assert_eq!(truncate_prefix("hello", 3), "llo");
        assert_eq!(truncate_prefix("héllo", 4), "éllo");
        assert_eq!(truncate_prefix("abc", 0), "");
    }
}
