//! OpenAI-compatible chat completions client
//!
//! Both OpenRouter and Hugging Face text-generation endpoints accept the
//! `/v1/chat/completions` request shape, so one client serves both. Streaming
//! responses are SSE; each event carries `choices[0].delta.content` and the
//! stream ends with `data: [DONE]`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::chat_provider::{ChatMessage, ChatProvider, ProviderError, TokenStream};
use super::sse_decoder::SseDecoder;

/// Marker payload that terminates an OpenAI-style stream
const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiCompatibleClient {
    http: Client,
    label: String,
    url: Option<String>,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleClient {
    /// `url` is the full chat completions URL; `None` means the upstream is
    /// not configured and every call fails with [`ProviderError::NotConfigured`]
    pub fn new(
        http: Client,
        label: impl Into<String>,
        url: Option<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            label: label.into(),
            url,
            api_key,
            model: model.into(),
        }
    }

    /// Chat completions URL for an inference endpoint base URL
    pub fn chat_completions_url(endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured(self.label.clone()))?;

        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text delta of one streamed event. `Ok(None)` for role-only or empty deltas.
pub fn parse_stream_delta(payload: &str) -> Result<Option<String>, ProviderError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ProviderError::Parse(format!("invalid stream event: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::Api {
            status: 502,
            body: message,
        });
    }

    let content = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(content)
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        debug!(provider = %self.label, turns = messages.len(), "Requesting completion");

        let response = self.send(&self.request_body(messages, false)).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("response has no choices".to_string()))
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        debug!(provider = %self.label, turns = messages.len(), "Opening completion stream");

        let response = self.send(&self.request_body(messages, true)).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut finished = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(ProviderError::Network(e.to_string()));
                        return;
                    }
                };
                for payload in decoder.push(&chunk) {
                    if payload == DONE_MARKER {
                        finished = true;
                        break;
                    }
                    match parse_stream_delta(&payload) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
                if finished {
                    return;
                }
            }

            if let Some(payload) = decoder.finish() {
                if payload != DONE_MARKER {
                    match parse_stream_delta(&payload) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => yield Err(e),
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_completions_url() {
        assert_eq!(
            OpenAiCompatibleClient::chat_completions_url("https://x.endpoints.hf.cloud/"),
            "https://x.endpoints.hf.cloud/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatibleClient::chat_completions_url("https://x.endpoints.hf.cloud/v1"),
            "https://x.endpoints.hf.cloud/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatibleClient::chat_completions_url(
                "https://openrouter.ai/api/v1/chat/completions"
            ),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_stream_delta() {
        let payload = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_stream_delta(payload).unwrap().as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_delta(role_only).unwrap(), None);

        let usage = r#"{"choices":[],"usage":{"total_tokens":12}}"#;
        assert_eq!(parse_stream_delta(usage).unwrap(), None);
    }

    #[test]
    fn test_parse_stream_delta_error_event() {
        let payload = r#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        match parse_stream_delta(payload) {
            Err(ProviderError::Api { body, .. }) => assert_eq!(body, "Rate limit exceeded"),
            other => panic!("expected Api error, got {:?}", other),
        }
        assert!(matches!(parse_stream_delta("not json"), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let client = OpenAiCompatibleClient::new(
            Client::new(),
            "test",
            None,
            None,
            "meta-llama/llama-3.2-3b-instruct",
        );
        let body = client.request_body(&[ChatMessage::new("user", "hello")], true);
        assert_eq!(body["model"], "meta-llama/llama-3.2-3b-instruct");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }
}
