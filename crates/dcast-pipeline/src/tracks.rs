//! Per-language track fan-out.
//!
//! The voice, captions, and finalize stages each sweep every requested
//! language in turn. A language that fails in one phase carries its error
//! forward and is skipped by later phases; sibling languages are never
//! affected. Only `Superseded` escapes the isolation wrapper, because a
//! stale run must stop rather than keep burning external calls.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use dcast_models::{SceneScript, ShotPlan, Stage, Track, TrackStatus, VideoJob};

use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::Orchestrator;
use crate::workspace::JobWorkspace;

/// Mutable per-language state threaded through the three phases.
struct TrackWork {
    language: String,
    error: Option<String>,
    voice_script: Option<String>,
    caption_lines: Vec<String>,
    audio_path: Option<PathBuf>,
    captions_path: Option<PathBuf>,
    voice_provider: Option<String>,
    track: Option<Track>,
}

impl TrackWork {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            error: None,
            voice_script: None,
            caption_lines: Vec::new(),
            audio_path: None,
            captions_path: None,
            voice_provider: None,
            track: None,
        }
    }

    fn fail(&mut self, phase: &str, e: &PipelineError) {
        warn!(language = %self.language, phase, error = %e, "track failed");
        self.error = Some(e.to_string());
    }
}

impl Orchestrator {
    pub(crate) async fn run_track_phases(
        &self,
        job: &mut VideoJob,
        epoch: u64,
        script: &SceneScript,
        plan: &ShotPlan,
        workspace: &JobWorkspace,
        key_prefix: &str,
    ) -> PipelineResult<()> {
        let mut works: Vec<TrackWork> = job
            .languages_requested
            .iter()
            .map(|l| TrackWork::new(l))
            .collect();

        self.enter_stage(job, Stage::Voice, epoch).await?;
        for work in works.iter_mut().filter(|w| w.error.is_none()) {
            if let Err(e) = self.voice_phase(work, script, plan, workspace).await {
                if matches!(e, PipelineError::Superseded) {
                    return Err(e);
                }
                work.fail("voice", &e);
            }
        }

        self.enter_stage(job, Stage::Captions, epoch).await?;
        for work in works.iter_mut().filter(|w| w.error.is_none()) {
            if let Err(e) = self.captions_phase(work, plan, workspace).await {
                if matches!(e, PipelineError::Superseded) {
                    return Err(e);
                }
                work.fail("captions", &e);
            }
        }

        self.enter_stage(job, Stage::Finalize, epoch).await?;
        for work in works.iter_mut().filter(|w| w.error.is_none()) {
            if let Err(e) = self.finalize_phase(work, workspace, key_prefix).await {
                if matches!(e, PipelineError::Superseded) {
                    return Err(e);
                }
                work.fail("finalize", &e);
            }
        }

        let mut tracks = BTreeMap::new();
        for work in works {
            let track = match (work.track, work.error) {
                (Some(track), None) => track,
                (_, Some(error)) => Track::failed(error),
                // A language that produced neither a track nor an error
                // never ran; record it as failed rather than dropping it.
                (None, None) => Track::failed("track pipeline did not run"),
            };
            tracks.insert(work.language, track);
        }
        job.tracks = tracks;
        Ok(())
    }

    /// Narration text plus synthesized audio for one language.
    async fn voice_phase(
        &self,
        work: &mut TrackWork,
        script: &SceneScript,
        plan: &ShotPlan,
        workspace: &JobWorkspace,
    ) -> PipelineResult<()> {
        let lines = self
            .deps
            .narrator
            .localize(script, &work.language)
            .await?;
        if lines.voice_lines.len() != plan.scene_count() {
            return Err(PipelineError::validation(format!(
                "narration for {} has {} lines, expected {}",
                work.language,
                lines.voice_lines.len(),
                plan.scene_count()
            )));
        }

        let voice_script = lines.voice_script();
        let track_dir = workspace.track_dir(&work.language).await?;
        let audio_path = track_dir.join("voice.wav");
        let provider = self
            .deps
            .tts
            .synthesize(&voice_script, &work.language, &audio_path)
            .await?;

        info!(language = %work.language, provider = %provider, "narration synthesized");
        work.voice_script = Some(voice_script);
        work.caption_lines = lines.caption_lines;
        work.audio_path = Some(audio_path);
        work.voice_provider = Some(provider);
        Ok(())
    }

    /// Time-coded captions aligned to the shot plan's scene durations.
    async fn captions_phase(
        &self,
        work: &mut TrackWork,
        plan: &ShotPlan,
        workspace: &JobWorkspace,
    ) -> PipelineResult<()> {
        let srt = dcast_media::build_srt(&work.caption_lines, &plan.scene_durations())?;
        let track_dir = workspace.track_dir(&work.language).await?;
        let captions_path = track_dir.join("captions.srt");
        tokio::fs::write(&captions_path, srt).await?;
        work.captions_path = Some(captions_path);
        Ok(())
    }

    /// Mix, burn, and upload the final artifacts for one language.
    async fn finalize_phase(
        &self,
        work: &mut TrackWork,
        workspace: &JobWorkspace,
        key_prefix: &str,
    ) -> PipelineResult<()> {
        let audio_path = work
            .audio_path
            .as_ref()
            .ok_or_else(|| PipelineError::validation("narration audio missing"))?;
        let captions_path = work
            .captions_path
            .as_ref()
            .ok_or_else(|| PipelineError::validation("captions file missing"))?;

        let track_dir = workspace.track_dir(&work.language).await?;
        let final_path = track_dir.join("final.mp4");
        let meta = self
            .deps
            .assembler
            .finalize(
                &workspace.enhanced_video(),
                audio_path,
                captions_path,
                &final_path,
            )
            .await?;

        let track_prefix = format!("{key_prefix}/tracks/{}", work.language);
        let audio_url = self
            .deps
            .storage
            .upload_file(audio_path, &format!("{track_prefix}/voice.wav"), "audio/wav")
            .await?;
        let captions_url = self
            .deps
            .storage
            .upload_file(
                captions_path,
                &format!("{track_prefix}/captions.srt"),
                "application/x-subrip",
            )
            .await?;
        let final_url = self
            .deps
            .storage
            .upload_file(&final_path, &format!("{track_prefix}/final.mp4"), "video/mp4")
            .await?;

        work.track = Some(Track {
            status: TrackStatus::Completed,
            error: None,
            voice_script: work.voice_script.clone(),
            duration_sec: Some(meta.duration_sec),
            audio_url: Some(audio_url),
            captions_url: Some(captions_url),
            final_video_url: Some(final_url),
            final_video_meta: Some(meta),
            voice_provider: work.voice_provider.clone(),
        });
        Ok(())
    }
}
