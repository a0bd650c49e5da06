//! Live capability implementations over the generation clients and the
//! ffmpeg toolchain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use dcast_gen::{LlmClient, RecorderClient, TtsClient, VeoClient};
use dcast_models::{CommitDoc, LocalizedLines, SceneScript, VideoMeta};

use crate::capabilities::{
    ClipSynthesizer, DemoRecorder, GoalGenerator, Narrator, ScriptGenerator, SpeechSynthesizer,
    VideoAssembler,
};
use crate::error::PipelineResult;

/// Gemini-backed goal generation.
pub struct LlmGoalGenerator {
    llm: LlmClient,
}

impl LlmGoalGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GoalGenerator for LlmGoalGenerator {
    async fn generate_goal(&self, commit: &CommitDoc) -> PipelineResult<String> {
        Ok(dcast_gen::generate_demo_goal(&self.llm, commit).await?)
    }
}

/// Gemini-backed scene-script generation.
pub struct LlmScriptGenerator {
    llm: LlmClient,
}

impl LlmScriptGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate_script(&self, commit: &CommitDoc) -> PipelineResult<SceneScript> {
        Ok(dcast_gen::generate_scene_script(&self.llm, commit).await?)
    }
}

/// Gemini-backed localization.
pub struct LlmNarrator {
    llm: LlmClient,
}

impl LlmNarrator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn localize(
        &self,
        script: &SceneScript,
        language: &str,
    ) -> PipelineResult<LocalizedLines> {
        Ok(dcast_gen::generate_localized_lines(&self.llm, script, language).await?)
    }
}

/// Browser-agent sidecar recorder.
pub struct BrowserDemoRecorder {
    client: RecorderClient,
}

impl BrowserDemoRecorder {
    pub fn new(client: RecorderClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DemoRecorder for BrowserDemoRecorder {
    async fn record_demo(
        &self,
        website_url: &str,
        goal: &str,
        output_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        Ok(self.client.record(website_url, goal, output_dir).await?)
    }
}

/// Veo clip synthesis.
pub struct VeoClipSynthesizer {
    client: VeoClient,
}

impl VeoClipSynthesizer {
    pub fn new(client: VeoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClipSynthesizer for VeoClipSynthesizer {
    async fn synthesize_clip(
        &self,
        prompt: &str,
        duration_sec: f64,
        reference_image: Option<PathBuf>,
        output: &Path,
    ) -> PipelineResult<()> {
        self.client
            .generate_clip(prompt, duration_sec, reference_image.as_deref(), output)
            .await?;
        Ok(())
    }
}

/// Gemini TTS narration.
pub struct GeminiSpeechSynthesizer {
    client: TtsClient,
}

impl GeminiSpeechSynthesizer {
    pub fn new(client: TtsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: &Path,
    ) -> PipelineResult<String> {
        let out = self.client.synthesize(text, language, output).await?;
        Ok(format!("{}/{}", out.model, out.voice))
    }
}

/// ffmpeg/ffprobe toolchain assembler.
#[derive(Default)]
pub struct FfmpegAssembler;

impl FfmpegAssembler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn normalize(&self, input: &Path, output: &Path) -> PipelineResult<VideoMeta> {
        Ok(dcast_media::normalize_video(input, output).await?)
    }

    async fn extract_snapshots(
        &self,
        video: &Path,
        output_dir: &Path,
        count: usize,
    ) -> PipelineResult<Vec<PathBuf>> {
        Ok(dcast_media::extract_snapshots(video, output_dir, count).await?)
    }

    async fn assemble(&self, segments: &[PathBuf], output: &Path) -> PipelineResult<VideoMeta> {
        let work_dir = tempfile::tempdir()?;
        let mut normalized = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            let target = work_dir.path().join(format!("segment_{i:02}.mp4"));
            dcast_media::normalize_video(segment, &target).await?;
            normalized.push(target);
        }
        Ok(dcast_media::concat_videos(&normalized, output).await?)
    }

    async fn finalize(
        &self,
        video: &Path,
        narration: &Path,
        captions: &Path,
        output: &Path,
    ) -> PipelineResult<VideoMeta> {
        let work_dir = tempfile::tempdir()?;
        let mixed = work_dir.path().join("mixed.mp4");
        dcast_media::mix_with_narration(video, narration, &mixed).await?;
        Ok(dcast_media::burn_captions(&mixed, captions, output).await?)
    }
}
