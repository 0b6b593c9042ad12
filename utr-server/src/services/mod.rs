//! Upstream AI services

pub mod chat_provider;
pub mod chat_relay;
pub mod image_generator;
pub mod openai_client;
pub mod replicate_client;
pub mod sse_decoder;

pub use chat_provider::{ChatMessage, ChatProvider, ProviderError, ProviderRegistry, TokenStream};
pub use chat_relay::{spawn_relay, RelayEvent};
pub use image_generator::{ImageError, ImageGenerator};
pub use replicate_client::ReplicateClient;
