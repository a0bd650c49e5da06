//! Pipeline error taxonomy.
//!
//! Stage and track failures collapse into five caller-visible categories:
//! validation (bad generated content, never retried), not-found (unknown
//! commit/repo/job), external-service (a generation call returned nothing
//! usable), tool-execution (ffmpeg/ffprobe non-zero exit with captured
//! stderr), and storage. `Superseded` is internal control flow: a stale
//! epoch writer stops quietly instead of recording a failure.

use thiserror::Error;

use dcast_gen::GenError;
use dcast_media::MediaError;
use dcast_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("tool execution error: {0}")]
    ToolExecution(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// This execution was superseded by a newer epoch; its writes were
    /// discarded and the run must stop without marking the job failed.
    #[error("execution superseded by a newer schedule")]
    Superseded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }
}

impl From<GenError> for PipelineError {
    fn from(e: GenError) -> Self {
        match e {
            GenError::Validation(msg) => Self::Validation(msg),
            GenError::InvalidMessages(msg) => Self::Validation(msg),
            GenError::Script(err) => Self::Validation(err.to_string()),
            GenError::Media(err) => err.into(),
            GenError::MissingApiKey(var) => {
                Self::Config(format!("missing required environment variable: {var}"))
            }
            GenError::Io(err) => Self::Io(err),
            other => Self::ExternalService(other.to_string()),
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidInput(msg) => Self::Validation(msg),
            MediaError::Io(err) => Self::Io(err),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Io(err) => Self::Io(err),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_error_mapping() {
        let e: PipelineError = GenError::validation("no patch content").into();
        assert!(matches!(e, PipelineError::Validation(_)));

        let e: PipelineError = GenError::Timeout(300).into();
        assert!(matches!(e, PipelineError::ExternalService(_)));

        let e: PipelineError = GenError::EmptyResponse.into();
        assert!(matches!(e, PipelineError::ExternalService(_)));
    }

    #[test]
    fn test_media_error_maps_to_tool_execution() {
        let e: PipelineError =
            MediaError::ffmpeg_failed("concat failed", Some("stderr".into()), Some(1)).into();
        assert!(matches!(e, PipelineError::ToolExecution(_)));
    }

    #[test]
    fn test_store_not_found_passes_through() {
        let e: PipelineError = StoreError::not_found("commit abc").into();
        assert!(matches!(e, PipelineError::NotFound(_)));
    }
}
