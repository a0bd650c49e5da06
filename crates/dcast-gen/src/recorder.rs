//! Browser-agent demo recording client.
//!
//! Demo footage is captured by a sidecar service that drives a real browser
//! against the product site and records the session at 1280x720.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GenError, GenResult};
use crate::retry::{retry_async, RetryConfig};

pub const RECORDING_WIDTH: u32 = 1280;
pub const RECORDING_HEIGHT: u32 = 720;

/// Configuration for the recorder sidecar client.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Base URL of the browser-agent service
    pub base_url: String,
    /// Request timeout; recording a demo can take minutes
    pub timeout: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout: Duration::from_secs(600),
            max_retries: 1,
        }
    }
}

impl RecorderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("RECORDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            timeout: Duration::from_secs(
                std::env::var("RECORDER_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            max_retries: std::env::var("RECORDER_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordRequest {
    website_url: String,
    goal: String,
    output_dir: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    video_path: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the browser-agent recording service.
pub struct RecorderClient {
    http: Client,
    config: RecorderConfig,
}

impl RecorderClient {
    pub fn new(config: RecorderConfig) -> GenResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> GenResult<Self> {
        Self::new(RecorderConfig::from_env())
    }

    /// Check if the recorder service is reachable and healthy.
    pub async fn health_check(&self) -> GenResult<bool> {
        let url = format!("{}/health", self.config.base_url);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!(status = %response.status(), "recorder health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "recorder health check error");
                Ok(false)
            }
        }
    }

    /// Record a demo of `goal` against `website_url`. The sidecar writes the
    /// capture under `output_dir` and reports the local file path back.
    pub async fn record(
        &self,
        website_url: &str,
        goal: &str,
        output_dir: &std::path::Path,
    ) -> GenResult<PathBuf> {
        if website_url.trim().is_empty() {
            return Err(GenError::validation("website_url must be non-empty"));
        }
        if goal.trim().is_empty() {
            return Err(GenError::validation("demo goal must be non-empty"));
        }

        let url = format!("{}/record", self.config.base_url);
        let request = RecordRequest {
            website_url: website_url.to_string(),
            goal: goal.to_string(),
            output_dir: output_dir.to_string_lossy().into_owned(),
            width: RECORDING_WIDTH,
            height: RECORDING_HEIGHT,
        };
        debug!(url = %url, website_url, "requesting demo recording");

        let retry = RetryConfig {
            max_retries: self.config.max_retries,
            ..RetryConfig::default()
        };
        let response = retry_async(&retry, "demo_record", || async {
            let response = self.http.post(&url).json(&request).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(GenError::request_failed(format!(
                    "recorder service returned {status}: {body}"
                )));
            }
            Ok(response)
        })
        .await?;

        let payload: RecordResponse = response
            .json()
            .await
            .map_err(|_| GenError::response_format("recorder response must carry video_path"))?;
        let video_path = PathBuf::from(payload.video_path);
        if !video_path.exists() {
            return Err(GenError::response_format(format!(
                "recorded video not found at {}",
                video_path.display()
            )));
        }

        info!(path = %video_path.display(), "demo recording completed");
        Ok(video_path)
    }
}
