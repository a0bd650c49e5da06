//! Error types for generative-service clients.

use thiserror::Error;

pub type GenResult<T> = Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("missing required environment variable: {0}")]
    MissingApiKey(String),

    #[error("invalid messages: {0}")]
    InvalidMessages(String),

    #[error("generation request failed: {0}")]
    RequestFailed(String),

    #[error("response format error: {0}")]
    ResponseFormat(String),

    #[error("generation service returned an empty response")]
    EmptyResponse,

    #[error("generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Script(#[from] dcast_models::ScriptValidationError),

    #[error(transparent)]
    Media(#[from] dcast_media::MediaError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const TRANSIENT_TOKENS: &[&str] = &[
    "timeout",
    "temporarily",
    "unavailable",
    "rate limit",
    "resource exhausted",
    "connection reset",
    "deadline exceeded",
    "429",
    "500",
    "502",
    "503",
    "504",
];

impl GenError {
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }

    pub fn response_format(message: impl Into<String>) -> Self {
        Self::ResponseFormat(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Best-effort classifier for retryable transport/provider failures.
    /// Format and validation errors always fail fast.
    pub fn is_transient(&self) -> bool {
        match self {
            GenError::Timeout(_) => true,
            GenError::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.as_u16() == 429 || s.is_server_error()
                    })
            }
            GenError::RequestFailed(message) => {
                let lowered = message.to_lowercase();
                TRANSIENT_TOKENS.iter().any(|token| lowered.contains(token))
            }
            _ => false,
        }
    }
}
