//! Replicate client for FLUX schnell image predictions
//!
//! Predictions are created with `Prefer: wait` so most requests return the
//! finished output directly. Anything still running is polled through
//! `urls.get` a bounded number of times.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::image_generator::{ImageError, ImageGenerator};

const REPLICATE_PREDICTIONS_URL: &str =
    "https://api.replicate.com/v1/models/black-forest-labs/flux-schnell/predictions";
const POLL_INTERVAL_MS: u64 = 1000;
const MAX_POLLS: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// First output URL; FLUX returns a list, some models a bare string
    pub fn first_output_url(&self) -> Option<&str> {
        match self.output.as_ref()? {
            Value::String(url) => Some(url.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        }
    }
}

pub struct ReplicateClient {
    http: Client,
    api_token: Option<String>,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(http: Client, api_token: Option<String>) -> Self {
        Self {
            http,
            api_token,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "input": {
                "prompt": prompt,
                "num_outputs": 1,
                "aspect_ratio": "1:1",
                "output_format": "png",
                "output_quality": 80,
            }
        })
    }

    async fn parse_prediction(response: reqwest::Response) -> Result<Prediction, ImageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Api(status.as_u16(), body));
        }
        response
            .json()
            .await
            .map_err(|e| ImageError::Parse(e.to_string()))
    }

    async fn create_prediction(&self, token: &str, prompt: &str) -> Result<Prediction, ImageError> {
        let response = self
            .http
            .post(REPLICATE_PREDICTIONS_URL)
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;
        Self::parse_prediction(response).await
    }

    async fn wait_for(&self, token: &str, mut prediction: Prediction) -> Result<Prediction, ImageError> {
        let mut polls = 0;
        while !prediction.is_terminal() {
            if polls >= MAX_POLLS {
                return Err(ImageError::Timeout);
            }
            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| ImageError::Parse("prediction has no poll URL".to_string()))?;

            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let response = self
                .http
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| ImageError::Network(e.to_string()))?;
            prediction = Self::parse_prediction(response).await?;
            debug!(status = %prediction.status, polls, "Polled prediction");
        }
        Ok(prediction)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Api(status.as_u16(), "image download failed".to_string()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for ReplicateClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let token = self.api_token.as_deref().ok_or(ImageError::NotConfigured)?;

        let prediction = self.create_prediction(token, prompt).await?;
        let prediction = self.wait_for(token, prediction).await?;

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| prediction.status.clone());
            return Err(ImageError::PredictionFailed(reason));
        }

        let url = prediction
            .first_output_url()
            .ok_or_else(|| ImageError::Parse("prediction has no output".to_string()))?;
        let bytes = self.download(url).await?;
        info!(
            prediction = prediction.id.as_deref().unwrap_or("-"),
            size = bytes.len(),
            "Image generated"
        );
        Ok(bytes)
    }
}
