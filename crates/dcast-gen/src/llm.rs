//! Gemini text-generation client.
//!
//! Speaks the `generateContent` REST surface with typed payloads. Callers
//! hand in OpenAI-style role/content messages; the client folds them into a
//! single prompt, optionally forces JSON output, and retries transient
//! provider failures with bounded backoff.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{GenError, GenResult};
use crate::retry::{retry_async, RetryConfig};

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const MODEL_FLASH: &str = "gemini-2.0-flash";
pub const MODEL_PRO: &str = "gemini-2.5-pro";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "SYSTEM",
            ChatRole::User => "USER",
            ChatRole::Assistant => "ASSISTANT",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation options.
#[derive(Debug, Clone)]
pub struct LlmOptions {
    pub model: String,
    pub json_mode: bool,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub retries: u32,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: MODEL_FLASH.to_string(),
            json_mode: false,
            temperature: 0.2,
            max_output_tokens: None,
            retries: 1,
        }
    }
}

impl LlmOptions {
    pub fn json(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            json_mode: true,
            ..Self::default()
        }
    }
}

/// Token accounting from the provider, where reported.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Unified response shape.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub json: Option<Value>,
    pub usage: TokenUsage,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

/// Gemini REST client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> GenResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    pub fn from_env() -> GenResult<Self> {
        let api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenError::MissingApiKey(GEMINI_API_KEY_ENV.to_string()))?;
        Self::new(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Invoke the model with validated messages and a unified response.
    pub async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &LlmOptions,
    ) -> GenResult<LlmResponse> {
        validate_messages(messages)?;
        let prompt = messages_to_prompt(messages);
        let retry = RetryConfig::with_retries(options.retries);

        let response = retry_async(&retry, "llm_invoke", || {
            self.generate_once(&prompt, options)
        })
        .await?;

        info!(
            model = %options.model,
            input_tokens = ?response.usage.input_tokens,
            output_tokens = ?response.usage.output_tokens,
            "llm invocation completed"
        );
        Ok(response)
    }

    async fn generate_once(&self, prompt: &str, options: &LlmOptions) -> GenResult<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, options.model, self.api_key
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                response_mime_type: options.json_mode.then(|| "application/json".to_string()),
            },
        };

        debug!(model = %options.model, json_mode = options.json_mode, "calling gemini");
        let http_response = self.http.post(&url).json(&request).send().await?;
        if !http_response.status().is_success() {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            return Err(GenError::request_failed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let payload: GenerateContentResponse = http_response.json().await?;
        let text = extract_text(&payload).ok_or(GenError::EmptyResponse)?;
        let json = if options.json_mode {
            Some(parse_json_output(&text)?)
        } else {
            None
        };

        Ok(LlmResponse {
            text,
            json,
            usage: extract_usage(&payload),
        })
    }
}

fn validate_messages(messages: &[ChatMessage]) -> GenResult<()> {
    if messages.is_empty() {
        return Err(GenError::InvalidMessages(
            "messages must be non-empty".to_string(),
        ));
    }
    for (index, message) in messages.iter().enumerate() {
        if message.content.trim().is_empty() {
            return Err(GenError::InvalidMessages(format!(
                "messages[{index}].content must be a non-empty string"
            )));
        }
    }
    Ok(())
}

/// Fold role/content messages into one prompt the model consumes directly.
fn messages_to_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:\n{}", m.role.as_str(), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_text(payload: &GenerateContentResponse) -> Option<String> {
    for candidate in &payload.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        let collected: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let trimmed = collected.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn extract_usage(payload: &GenerateContentResponse) -> TokenUsage {
    match &payload.usage_metadata {
        Some(usage) => TokenUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        },
        None => TokenUsage::default(),
    }
}

/// Remove a markdown code-fence wrapper when the model adds one.
fn strip_markdown_fence(text: &str) -> String {
    let stripped = text.trim();
    if !stripped.starts_with("```") {
        return stripped.to_string();
    }
    let mut lines: Vec<&str> = stripped.lines().collect();
    if lines.first().is_some_and(|l| l.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Parse JSON output, tolerating fenced payloads; only objects and arrays
/// are accepted.
fn parse_json_output(text: &str) -> GenResult<Value> {
    let parsed = serde_json::from_str::<Value>(text)
        .or_else(|_| serde_json::from_str::<Value>(&strip_markdown_fence(text)))
        .map_err(|_| GenError::response_format("json mode response is not valid JSON"))?;
    if !(parsed.is_object() || parsed.is_array()) {
        return Err(GenError::response_format(
            "json mode requires an object or array response",
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_messages_to_prompt_roles() {
        let prompt = messages_to_prompt(&[
            ChatMessage::system("You write scripts."),
            ChatMessage::user("Describe the change."),
        ]);
        assert_eq!(prompt, "SYSTEM:\nYou write scripts.\n\nUSER:\nDescribe the change.");
    }

    #[test]
    fn test_validate_messages_rejects_empty() {
        assert!(validate_messages(&[]).is_err());
        assert!(validate_messages(&[ChatMessage::user("  ")]).is_err());
        assert!(validate_messages(&[ChatMessage::user("hi")]).is_ok());
    }

    #[test]
    fn test_strip_markdown_fence() {
        assert_eq!(strip_markdown_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_markdown_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_fence("```\n[1,2]\n```"), "[1,2]");
    }

    #[test]
    fn test_parse_json_output() {
        assert!(parse_json_output("{\"goal\": \"demo it\"}").is_ok());
        assert!(parse_json_output("```json\n{\"goal\": \"demo it\"}\n```").is_ok());
        assert!(matches!(
            parse_json_output("\"just a string\""),
            Err(GenError::ResponseFormat(_))
        ));
        assert!(matches!(
            parse_json_output("not json at all"),
            Err(GenError::ResponseFormat(_))
        ));
    }

    fn gemini_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        })
    }

    #[tokio::test]
    async fn test_invoke_json_mode_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("{\"goal\": \"click the new button\"}")))
            .mount(&server)
            .await;

        let client = LlmClient::new("test-key", server.uri()).unwrap();
        let response = client
            .invoke(
                &[ChatMessage::user("what changed?")],
                &LlmOptions::json(MODEL_FLASH),
            )
            .await
            .unwrap();

        assert_eq!(response.json.unwrap()["goal"], "click the new button");
        assert_eq!(response.usage.total_tokens, Some(15));
    }

    #[tokio::test]
    async fn test_invoke_fails_fast_on_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new("test-key", server.uri()).unwrap();
        let result = client
            .invoke(&[ChatMessage::user("hello")], &LlmOptions::default())
            .await;
        assert!(matches!(result, Err(GenError::RequestFailed(_))));
    }
}
