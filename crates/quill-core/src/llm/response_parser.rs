use serde_json::Value;

use crate::errors::QuillError;

/// Marker that ends an OpenAI-style event stream.
pub const STREAM_DONE: &str = "[DONE]";

pub struct ResponseParser;

impl ResponseParser {
    /// Text of the first choice of a `/chat/completions` response.
    pub fn parse_chat_response(response: &Value) -> Result<String, QuillError> {
        let choice = Self::first_choice(response)?;
        choice["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| QuillError::ParsingError("Response has no message content".to_string()))
    }

    /// Text of the first choice of a legacy `/completions` response.
    pub fn parse_completion_response(response: &Value) -> Result<String, QuillError> {
        let choice = Self::first_choice(response)?;
        choice["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| QuillError::ParsingError("Response has no completion text".to_string()))
    }

    /// Text carried by one `data:` payload of a streamed response.
    ///
    /// Returns `Ok(None)` for the terminating `[DONE]` payload and `Ok(Some(""))` for
    /// keep-alive or role-only deltas.
    pub fn parse_stream_data(data: &str) -> Result<Option<String>, QuillError> {
        let data = data.trim();
        if data == STREAM_DONE {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(data)
            .map_err(|e| QuillError::ParsingError(format!("Invalid stream chunk: {}", e)))?;
        if let Some(error) = value.get("error") {
            return Err(QuillError::classify_transport(Self::error_text(error)));
        }
        let choice = match value["choices"].as_array().and_then(|c| c.first()) {
            Some(choice) => choice,
            None => return Ok(Some(String::new())),
        };
        let text = choice["delta"]["content"]
            .as_str()
            .or_else(|| choice["text"].as_str())
            .unwrap_or_default();
        Ok(Some(text.to_string()))
    }

    /// Maps a failed HTTP response onto the error taxonomy by status alone.
    pub fn parse_error(status: u16, body: &str) -> QuillError {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("error").map(Self::error_text))
            .unwrap_or_else(|| body.to_string());
        let message = format!("API request failed with status {}: {}", status, detail);
        match status {
            401 => QuillError::AuthError(message),
            429 => QuillError::RateLimited(message),
            _ => QuillError::TransportError(message),
        }
    }

    fn first_choice(response: &Value) -> Result<&Value, QuillError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| QuillError::ParsingError("No choices in response".to_string()))?;
        choices
            .first()
            .ok_or_else(|| QuillError::ParsingError("Empty choices array".to_string()))
    }

    fn error_text(error: &Value) -> String {
        match error {
            Value::String(s) => s.clone(),
            other => {
                let message = other["message"].as_str().unwrap_or_default();
                match other["code"].as_str().or_else(|| other["type"].as_str()) {
                    Some(code) => format!("{} ({})", message, code),
                    None => message.to_string(),
                }
            }
        }
    }
}
