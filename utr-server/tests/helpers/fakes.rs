//! In-process doubles for the chat and image upstreams

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use utr_server::services::{
    ChatMessage, ChatProvider, ImageError, ImageGenerator, ProviderError, TokenStream,
};

/// Bytes every fake image starts with
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

#[derive(Default)]
pub struct FakeProvider {
    /// Deltas streamed in order; `complete` returns them joined
    pub chunks: Vec<String>,
    /// `stream` and `complete` fail before producing anything
    pub fail_open: bool,
    /// Streaming fails after the first chunk
    pub fail_mid_stream: bool,
    /// Conversations received, one entry per call
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeProvider {
    pub fn replying(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Default::default()
        }
    }

    pub fn failing_mid_stream(chunks: &[&str]) -> Self {
        Self {
            fail_mid_stream: true,
            ..Self::replying(chunks)
        }
    }

    pub fn last_conversation(&self) -> Vec<ChatMessage> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn record(&self, messages: &[ChatMessage]) {
        self.seen.lock().unwrap().push(messages.to_vec());
    }
}

#[async_trait]
impl ChatProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.record(messages);
        if self.fail_open {
            return Err(ProviderError::Api {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }
        Ok(self.chunks.concat())
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        self.record(messages);
        if self.fail_open {
            return Err(ProviderError::Network("connection refused".to_string()));
        }

        let mut items: Vec<Result<String, ProviderError>> = Vec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            items.push(Ok(chunk.clone()));
            if self.fail_mid_stream && i == 0 {
                items.push(Err(ProviderError::Network("stream reset".to_string())));
                break;
            }
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Returns [`FAKE_PNG`] unless the prompt contains `fail_marker`
#[derive(Default)]
pub struct FakeImageGenerator {
    pub fail_marker: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeImageGenerator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(ImageError::PredictionFailed("NSFW content detected".to_string()));
            }
        }
        Ok(FAKE_PNG.to_vec())
    }
}
