// Learning-lane RPC client
// The external learner discovers a site recipe and writes the job outcome
// itself; on success the core must not touch the job row again

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_config::LearnerConfig;

/// Learning can involve a headless browser and several model calls
const LEARN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum LearnerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Learner returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct LearnRequest<'a> {
    job_id: Uuid,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LearnResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct LearnerClient {
    http: reqwest::Client,
    base_url: String,
}

impl LearnerClient {
    pub fn new(config: &LearnerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(LEARN_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }

    /// Hand a job to the learner. A transport error is retryable by the
    /// caller; a non-2xx status is a terminal learner failure.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn learn(&self, job_id: Uuid, url: &str) -> Result<LearnResponse, LearnerError> {
        let endpoint = format!("{}/learn", self.base_url);
        info!(url, "Forwarding job to learning worker");

        let response = self
            .http
            .post(&endpoint)
            .json(&LearnRequest { job_id, url })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LearnerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<LearnResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_with_optional_fields() {
        let parsed: LearnResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(parsed.success);
        assert!(parsed.message.is_empty());
        assert!(parsed.error.is_none());

        let parsed: LearnResponse = serde_json::from_str(
            r#"{"success": false, "message": "learning failed", "error": "selector not found"}"#,
        )
        .unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("selector not found"));
    }
}
