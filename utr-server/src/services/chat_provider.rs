//! Chat model provider abstraction
//!
//! Handlers see only [`ChatProvider`]; the concrete upstream (OpenRouter,
//! a Hugging Face endpoint, or a test double) is chosen per catalog model
//! through [`ProviderRegistry`].

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use utr_common::config::{Provider, StudyConfig, OPENROUTER_API_URL};

use super::openai_client::OpenAiCompatibleClient;

/// One turn of the conversation as sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

impl From<&utr_common::db::Message> for ChatMessage {
    fn from(message: &utr_common::db::Message) -> Self {
        Self::new(message.role.clone(), message.content.clone())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("upstream returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

/// Text deltas in arrival order
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Full reply for the conversation
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Reply as a stream of text deltas. Errors returned here happen before
    /// any token was produced.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError>;
}

/// Catalog model id -> provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model_id: impl Into<String>, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(model_id.into(), provider);
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(model_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// One provider per catalog model. Models whose credentials are missing
    /// are still registered so their calls fail with a clear error.
    pub fn from_config(config: &StudyConfig, http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        let secrets = &config.secrets;

        for model in config.catalog.models() {
            let client = match model.provider {
                Provider::OpenRouter => {
                    if secrets.openrouter_api_key.is_none() {
                        warn!(model = %model.id, "OPENROUTER_API_KEY not set");
                    }
                    OpenAiCompatibleClient::new(
                        http.clone(),
                        format!("openrouter:{}", model.id),
                        Some(OPENROUTER_API_URL.to_string()),
                        secrets.openrouter_api_key.clone(),
                        model.model_id.clone().unwrap_or_else(|| model.id.clone()),
                    )
                }
                Provider::HuggingFace => {
                    if secrets.huggingface_endpoint.is_none() {
                        warn!(model = %model.id, "HUGGINGFACE_ENDPOINT not set");
                    }
                    OpenAiCompatibleClient::new(
                        http.clone(),
                        format!("huggingface:{}", model.id),
                        secrets
                            .huggingface_endpoint
                            .as_deref()
                            .map(OpenAiCompatibleClient::chat_completions_url),
                        secrets.huggingface_api_token.clone(),
                        model.model_id.clone().unwrap_or_else(|| "tgi".to_string()),
                    )
                }
            };
            info!(model = %model.id, provider = model.provider.as_str(), "Registered chat provider");
            registry.insert(model.id.clone(), Arc::new(client));
        }

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utr_common::config::{ConfigOverrides, Secrets, TomlConfig};

    #[test]
    fn test_registry_covers_catalog() {
        let config = StudyConfig::from_parts(
            &ConfigOverrides::default(),
            TomlConfig::default(),
            Secrets::default(),
        );
        let registry = ProviderRegistry::from_config(&config, reqwest::Client::new());

        assert_eq!(registry.len(), config.catalog.models().len());
        for id in config.catalog.ids() {
            assert!(registry.get(&id).is_some(), "no provider for {}", id);
        }
        assert!(registry.get("unknown").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_cleanly() {
        let config = StudyConfig::from_parts(
            &ConfigOverrides::default(),
            TomlConfig::default(),
            Secrets::default(),
        );
        let registry = ProviderRegistry::from_config(&config, reqwest::Client::new());
        let provider = registry.get("martindisley/unlearning-to-rest").unwrap();

        let err = provider
            .complete(&[ChatMessage::new("user", "hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
