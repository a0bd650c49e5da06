//! Veo cinematic insert-clip generation.
//!
//! Clip generation is a long-running operation: the request returns an
//! operation name, which is polled until the video URI shows up, then the
//! bytes are downloaded to the requested path.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GenError, GenResult};
use crate::llm::GEMINI_API_KEY_ENV;
use crate::poll;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_VEO_MODEL: &str = "veo-3.1-generate-preview";
const DEFAULT_ASPECT_RATIO: &str = "16:9";

const POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Durations the Veo models accept, in seconds.
const ALLOWED_DURATIONS: [u32; 3] = [4, 6, 8];

/// Snap a requested duration to the nearest allowed value (4, 6, or 8 s).
pub fn snap_clip_duration(requested_sec: f64) -> u32 {
    let mut best = ALLOWED_DURATIONS[0];
    let mut best_distance = (requested_sec - f64::from(best)).abs();
    for candidate in ALLOWED_DURATIONS {
        let distance = (requested_sec - f64::from(candidate)).abs();
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}

#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for VeoConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_VEO_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl VeoConfig {
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("PIPELINE_VEO_MODEL")
                .unwrap_or_else(|_| DEFAULT_VEO_MODEL.to_string()),
            timeout_secs: std::env::var("PIPELINE_VEO_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Result of one successful clip generation.
#[derive(Debug, Clone)]
pub struct ClipOutput {
    pub model: String,
    pub duration_sec: u32,
    pub has_reference_image: bool,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
    #[serde(rename = "referenceImages", skip_serializing_if = "Vec::is_empty")]
    reference_images: Vec<ReferenceImage>,
}

#[derive(Debug, Serialize)]
struct ReferenceImage {
    image: InlineImage,
    #[serde(rename = "referenceType")]
    reference_type: String,
}

#[derive(Debug, Serialize)]
struct InlineImage {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    #[serde(rename = "durationSeconds")]
    duration_seconds: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(rename = "generateVideoResponse")]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<GeneratedVideo>,
}

#[derive(Debug, Deserialize)]
struct GeneratedVideo {
    uri: Option<String>,
}

/// Client for Veo long-running video generation.
#[derive(Debug, Clone)]
pub struct VeoClient {
    http: Client,
    api_key: String,
    base_url: String,
    config: VeoConfig,
}

impl VeoClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        config: VeoConfig,
    ) -> GenResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            config,
        })
    }

    pub fn from_env() -> GenResult<Self> {
        let api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenError::MissingApiKey(GEMINI_API_KEY_ENV.to_string()))?;
        Self::new(api_key, DEFAULT_BASE_URL.to_string(), VeoConfig::from_env())
    }

    /// Generate a clip for `prompt` and write it to `output`. The requested
    /// duration is snapped to an allowed value; an optional reference image
    /// anchors the clip visually.
    pub async fn generate_clip(
        &self,
        prompt: &str,
        requested_duration_sec: f64,
        reference_image: Option<&Path>,
        output: impl AsRef<Path>,
    ) -> GenResult<ClipOutput> {
        if prompt.trim().is_empty() {
            return Err(GenError::validation("clip prompt must be non-empty"));
        }
        let duration_sec = snap_clip_duration(requested_duration_sec);
        let reference_images = match reference_image {
            Some(path) => vec![load_reference_image(path).await?],
            None => Vec::new(),
        };
        let has_reference_image = !reference_images.is_empty();

        info!(
            model = %self.config.model,
            requested_sec = requested_duration_sec,
            actual_sec = duration_sec,
            has_reference = has_reference_image,
            "generating insert clip"
        );

        let operation = self
            .start_operation(prompt, duration_sec, reference_images)
            .await?;
        let video_uri = self.wait_for_video(&operation.name).await?;
        self.download_video(&video_uri, output.as_ref()).await?;

        Ok(ClipOutput {
            model: self.config.model.clone(),
            duration_sec,
            has_reference_image,
        })
    }

    async fn start_operation(
        &self,
        prompt: &str,
        duration_sec: u32,
        reference_images: Vec<ReferenceImage>,
    ) -> GenResult<OperationHandle> {
        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url, self.config.model, self.api_key
        );
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
                reference_images,
            }],
            parameters: PredictParameters {
                duration_seconds: duration_sec,
                aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            },
        };

        let response = self.http.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::request_failed(format!(
                "Veo request returned {status}: {body}"
            )));
        }
        let handle: OperationHandle = response
            .json()
            .await
            .map_err(|_| GenError::response_format("Veo response carried no operation name"))?;
        debug!(operation = %handle.name, "clip operation started");
        Ok(handle)
    }

    /// Poll the operation until it completes and yields a video URI.
    async fn wait_for_video(&self, operation_name: &str) -> GenResult<String> {
        let url = format!("{}/{}?key={}", self.base_url, operation_name, self.api_key);
        poll::wait_until(
            Duration::from_secs(POLL_INTERVAL_SECS),
            Duration::from_secs(self.config.timeout_secs),
            || async {
                let response = self.http.get(&url).send().await?;
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(GenError::request_failed(format!(
                        "Veo operation lookup returned {status}: {body}"
                    )));
                }
                let status: OperationStatus = response.json().await?;
                if !status.done {
                    debug!(operation = operation_name, "clip generation pending");
                    return Ok(None);
                }
                if let Some(error) = status.error {
                    return Err(GenError::request_failed(format!(
                        "Veo generation failed: {}",
                        error.message.unwrap_or_else(|| "unknown error".to_string())
                    )));
                }
                extract_video_uri(status.response).map(Some)
            },
        )
        .await
    }

    async fn download_video(&self, uri: &str, output: &Path) -> GenResult<()> {
        let response = self
            .http
            .get(uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GenError::request_failed(format!(
                "clip download returned {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenError::response_format("downloaded clip is empty"));
        }
        tokio::fs::write(output, &bytes).await?;
        Ok(())
    }
}

fn extract_video_uri(response: Option<OperationResponse>) -> GenResult<String> {
    response
        .and_then(|r| r.generate_video_response)
        .and_then(|r| r.generated_samples.into_iter().next())
        .and_then(|s| s.video)
        .and_then(|v| v.uri)
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| GenError::response_format("Veo operation completed without a video"))
}

async fn load_reference_image(path: &Path) -> GenResult<ReferenceImage> {
    let bytes = tokio::fs::read(path).await.map_err(|_| {
        GenError::validation(format!("reference image not found: {}", path.display()))
    })?;
    if bytes.is_empty() {
        return Err(GenError::validation(format!(
            "reference image is empty: {}",
            path.display()
        )));
    }
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    Ok(ReferenceImage {
        image: InlineImage {
            bytes_base64_encoded: base64::engine::general_purpose::STANDARD.encode(&bytes),
            mime_type: mime_type.to_string(),
        },
        reference_type: "asset".to_string(),
    })
}
