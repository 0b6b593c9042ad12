//! Text-to-image generation seam

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("REPLICATE_API_TOKEN is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Image API error {0}: {1}")]
    Api(u16, String),

    #[error("Prediction {0}")]
    PredictionFailed(String),

    #[error("Prediction did not finish in time")]
    Timeout,

    #[error("Parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// PNG bytes for the given prompt
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError>;
}

/// Prompt actually sent to the generator: house style, then the user text
pub fn styled_prompt(style_prefix: &str, prompt: &str) -> String {
    let prefix = style_prefix.trim();
    if prefix.is_empty() {
        prompt.to_string()
    } else {
        format!("{}, {}", prefix, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styled_prompt() {
        assert_eq!(
            styled_prompt("ink drawing", "a hammock between trees"),
            "ink drawing, a hammock between trees"
        );
        assert_eq!(styled_prompt("  ", "a nap"), "a nap");
    }
}
