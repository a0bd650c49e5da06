//! Capability seams the orchestrator drives.
//!
//! Traits are defined here, on the consumer side, so orchestrator and
//! scheduler tests can substitute generated mocks; the live adapters over
//! the generation clients live in [`crate::adapters`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use dcast_models::{CommitDoc, LocalizedLines, SceneScript, VideoMeta};

use crate::error::PipelineResult;

/// Derives the short demo-browsing goal from the commit diff.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GoalGenerator: Send + Sync {
    async fn generate_goal(&self, commit: &CommitDoc) -> PipelineResult<String>;
}

/// Derives the validated multi-scene script from the commit diff.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate_script(&self, commit: &CommitDoc) -> PipelineResult<SceneScript>;
}

/// Produces per-scene voice and caption lines for one language.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn localize(
        &self,
        script: &SceneScript,
        language: &str,
    ) -> PipelineResult<LocalizedLines>;
}

/// Drives the browser agent and returns the raw capture path.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DemoRecorder: Send + Sync {
    async fn record_demo(
        &self,
        website_url: &str,
        goal: &str,
        output_dir: &Path,
    ) -> PipelineResult<PathBuf>;
}

/// Synthesizes one short cinematic insert clip to `output`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClipSynthesizer: Send + Sync {
    async fn synthesize_clip(
        &self,
        prompt: &str,
        duration_sec: f64,
        reference_image: Option<PathBuf>,
        output: &Path,
    ) -> PipelineResult<()>;
}

/// Synthesizes narration audio to `output` (WAV); returns a provider tag
/// recorded on the track.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: &Path,
    ) -> PipelineResult<String>;
}

/// Media-toolchain seam: normalization, snapshots, concatenation, and the
/// final narration-mix + caption-burn mux.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Re-encode to the canonical resolution/frame-rate with a guaranteed
    /// audio track.
    async fn normalize(&self, input: &Path, output: &Path) -> PipelineResult<VideoMeta>;

    /// Extract `count` interior still frames.
    async fn extract_snapshots(
        &self,
        video: &Path,
        output_dir: &Path,
        count: usize,
    ) -> PipelineResult<Vec<PathBuf>>;

    /// Normalize each segment independently, concatenate in order, probe.
    async fn assemble(&self, segments: &[PathBuf], output: &Path) -> PipelineResult<VideoMeta>;

    /// Mix narration under the video's audio bed, burn captions, probe.
    async fn finalize(
        &self,
        video: &Path,
        narration: &Path,
        captions: &Path,
        output: &Path,
    ) -> PipelineResult<VideoMeta>;
}
