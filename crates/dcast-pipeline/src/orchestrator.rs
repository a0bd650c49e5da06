//! Stage orchestrator.
//!
//! One job-run executes the fixed stage sequence
//! goal → demo → script → snapshots → clip_generate → stitch → voice →
//! captions → finalize → done. Each stage is entered by persisting
//! `status=running, stage=<name>` together with the previous stage's
//! artifacts before any work happens, so a crash leaves the last entered
//! stage visible. Every write is epoch-conditional: a run superseded by a
//! force re-schedule stops quietly when its first write is rejected.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use dcast_models::{repo_doc_id, JobStatus, ShotPlan, Stage, VideoJob, VideoMeta};
use dcast_store::{CommitStore, JobStore, ObjectStorage, RepoStore};

use crate::capabilities::{
    ClipSynthesizer, DemoRecorder, GoalGenerator, Narrator, ScriptGenerator, SpeechSynthesizer,
    VideoAssembler,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::workspace::JobWorkspace;

/// Everything a job-run needs: stores, storage, and capability seams.
pub struct PipelineDeps {
    pub jobs: Arc<dyn JobStore>,
    pub commits: Arc<dyn CommitStore>,
    pub repos: Arc<dyn RepoStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub goal: Arc<dyn GoalGenerator>,
    pub script: Arc<dyn ScriptGenerator>,
    pub narrator: Arc<dyn Narrator>,
    pub recorder: Arc<dyn DemoRecorder>,
    pub clips: Arc<dyn ClipSynthesizer>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub assembler: Arc<dyn VideoAssembler>,
}

pub struct Orchestrator {
    pub(crate) deps: PipelineDeps,
    pub(crate) config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self { deps, config }
    }

    pub fn job_store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.deps.jobs)
    }

    pub fn commit_store(&self) -> Arc<dyn CommitStore> {
        Arc::clone(&self.deps.commits)
    }

    /// Run one scheduled execution. Failures are recorded on the job
    /// document; a superseded run exits without writing anything.
    pub async fn run(&self, video_id: &str, epoch: u64) {
        match self.execute(video_id, epoch).await {
            Ok(()) => {}
            Err(PipelineError::Superseded) => {
                debug!(video_id, epoch, "run superseded, late writes discarded");
            }
            Err(e) => {
                error!(video_id, epoch, error = %e, "pipeline run failed");
            }
        }
    }

    async fn execute(&self, video_id: &str, epoch: u64) -> PipelineResult<()> {
        let mut job = self
            .deps
            .jobs
            .get(video_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("job {video_id}")))?;
        if job.epoch != epoch {
            return Err(PipelineError::Superseded);
        }

        match self.run_stages(&mut job, epoch).await {
            Ok(()) => Ok(()),
            Err(PipelineError::Superseded) => Err(PipelineError::Superseded),
            Err(e) => {
                // Partial track data gathered so far stays on the document.
                job.status = JobStatus::Failed;
                job.stage = Stage::Error;
                job.error = Some(e.to_string());
                self.persist(&mut job, epoch).await?;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, job: &mut VideoJob, epoch: u64) -> PipelineResult<()> {
        let commit = self
            .deps
            .commits
            .get(&job.commit_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("commit {}", job.commit_id)))?;
        let workspace = JobWorkspace::create(&job.video_id)?;
        let key_prefix = format!(
            "videos/{}/{}",
            repo_doc_id(&job.repo_full_name),
            job.sha_short
        );

        // goal
        self.enter_stage(job, Stage::Goal, epoch).await?;
        let goal = self.deps.goal.generate_goal(&commit).await?;
        job.goal = Some(goal.clone());

        // demo
        self.enter_stage(job, Stage::Demo, epoch).await?;
        let demo_meta = self.record_demo(job, &goal, &workspace, &key_prefix).await?;

        // script
        self.enter_stage(job, Stage::Script, epoch).await?;
        let script = self.deps.script.generate_script(&commit).await?;
        let shot_plan = ShotPlan::from_script(&script, demo_meta.duration_sec);
        job.script = Some(script.clone());
        job.shot_plan = Some(shot_plan.clone());

        // snapshots
        self.enter_stage(job, Stage::Snapshots, epoch).await?;
        let snapshots = self
            .deps
            .assembler
            .extract_snapshots(
                &workspace.demo_video(),
                &workspace.snapshots_dir(),
                self.config.snapshot_count,
            )
            .await?;
        job.snapshot_count = Some(snapshots.len());

        // clip_generate
        self.enter_stage(job, Stage::ClipGenerate, epoch).await?;
        self.generate_insert_clips(&shot_plan, &snapshots, &workspace)
            .await?;

        // stitch
        self.enter_stage(job, Stage::Stitch, epoch).await?;
        let enhanced_meta = self.stitch(job, &workspace, &key_prefix).await?;
        job.video_meta = Some(enhanced_meta);

        // voice / captions / finalize, fanned out per language
        self.run_track_phases(job, epoch, &script, &shot_plan, &workspace, &key_prefix)
            .await?;

        // Aggregation: one completed track is enough.
        if job.completed_track_count() > 0 {
            job.status = JobStatus::Completed;
            job.stage = Stage::Done;
            job.error = None;
            job.completed_at = Some(Utc::now());
            info!(
                video_id = %job.video_id,
                tracks = job.tracks.len(),
                completed = job.completed_track_count(),
                "pipeline completed"
            );
        } else {
            job.status = JobStatus::Failed;
            job.stage = Stage::Error;
            job.error = Some("No language tracks were generated successfully".to_string());
            warn!(video_id = %job.video_id, "all language tracks failed");
        }
        self.persist(job, epoch).await
    }

    async fn record_demo(
        &self,
        job: &mut VideoJob,
        goal: &str,
        workspace: &JobWorkspace,
        key_prefix: &str,
    ) -> PipelineResult<VideoMeta> {
        let repo = self
            .deps
            .repos
            .get(&job.repo_full_name)
            .await?
            .ok_or_else(|| {
                PipelineError::not_found(format!("repository {}", job.repo_full_name))
            })?;
        let website_url = repo
            .website_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::validation(format!(
                    "repository {} has no website_url configured",
                    job.repo_full_name
                ))
            })?;

        let capture_dir = workspace.capture_dir();
        workspace.ensure_dir(&capture_dir).await?;
        let raw_capture = self
            .deps
            .recorder
            .record_demo(&website_url, goal, &capture_dir)
            .await?;

        let demo_path = workspace.demo_video();
        let meta = self.deps.assembler.normalize(&raw_capture, &demo_path).await?;
        let url = self
            .deps
            .storage
            .upload_file(&demo_path, &format!("{key_prefix}/demo.mp4"), "video/mp4")
            .await?;
        job.demo_video_url = Some(url);
        Ok(meta)
    }

    async fn generate_insert_clips(
        &self,
        plan: &ShotPlan,
        snapshots: &[PathBuf],
        workspace: &JobWorkspace,
    ) -> PipelineResult<()> {
        self.deps
            .clips
            .synthesize_clip(
                &plan.opener_prompt,
                plan.opener_duration_sec,
                snapshots.first().cloned(),
                &workspace.opener_clip(),
            )
            .await?;
        self.deps
            .clips
            .synthesize_clip(
                &plan.closer_prompt,
                plan.closer_duration_sec,
                snapshots.last().cloned(),
                &workspace.closer_clip(),
            )
            .await?;
        Ok(())
    }

    async fn stitch(
        &self,
        job: &mut VideoJob,
        workspace: &JobWorkspace,
        key_prefix: &str,
    ) -> PipelineResult<VideoMeta> {
        // The demo is mandatory; opener/closer are included when present.
        let segments: Vec<PathBuf> = [
            workspace.opener_clip(),
            workspace.demo_video(),
            workspace.closer_clip(),
        ]
        .into_iter()
        .filter(|p| p.exists())
        .collect();
        if !segments.contains(&workspace.demo_video()) {
            return Err(PipelineError::validation(
                "demo video is missing from the workspace",
            ));
        }

        let enhanced = workspace.enhanced_video();
        let meta = self.deps.assembler.assemble(&segments, &enhanced).await?;
        let url = self
            .deps
            .storage
            .upload_file(&enhanced, &format!("{key_prefix}/enhanced.mp4"), "video/mp4")
            .await?;
        job.enhanced_video_url = Some(url);
        Ok(meta)
    }

    pub(crate) async fn enter_stage(
        &self,
        job: &mut VideoJob,
        stage: Stage,
        epoch: u64,
    ) -> PipelineResult<()> {
        info!(video_id = %job.video_id, stage = %stage, epoch, "entering stage");
        job.status = JobStatus::Running;
        job.stage = stage;
        self.persist(job, epoch).await
    }

    /// Epoch-guarded write of the full document; a rejected write means
    /// this run was superseded.
    pub(crate) async fn persist(&self, job: &mut VideoJob, epoch: u64) -> PipelineResult<()> {
        job.updated_at = Utc::now();
        let applied = self
            .deps
            .jobs
            .update_if_epoch(&job.video_id, epoch, job)
            .await?;
        if applied {
            Ok(())
        } else {
            Err(PipelineError::Superseded)
        }
    }
}
