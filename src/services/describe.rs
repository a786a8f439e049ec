// Describe-image capability: image URL in, natural-language description out
// Backed by the Gemini generateContent REST API

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use crate::app_config::DescribeConfig;

#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Describe API returned status {0}")]
    Status(u16),

    #[error("Empty response from describe API")]
    EmptyResponse,
}

/// The single capability the extractor needs from the description service
#[async_trait]
pub trait DescribeImage: Send + Sync {
    async fn describe(&self, image_url: &str) -> Result<String, DescribeError>;
}

pub struct GeminiDescriber {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiDescriber {
    pub fn new(config: &DescribeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl DescribeImage for GeminiDescriber {
    #[instrument(skip(self))]
    async fn describe(&self, image_url: &str) -> Result<String, DescribeError> {
        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let prompt = format!(
            "Provide a description for an image from this URL: {}\n\n\
             The image appears in an article that is being converted to a \
             text-only document. Describe the likely content of the image \
             (charts, diagrams, screenshots, photos) so the description can \
             stand in for it.",
            image_url
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.4 }
        });

        let response = self.http.post(&endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(DescribeError::Status(response.status().as_u16()));
        }

        let parsed: serde_json::Value = response.json().await?;
        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(DescribeError::EmptyResponse)
    }
}
