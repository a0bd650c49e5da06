//! Video job record and its stage machine.
//!
//! One `VideoJob` exists per `(repo_full_name, sha)` pair; its document id is
//! deterministic so repeated triggers for the same commit converge on the
//! same record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::script::SceneScript;
use crate::shot_plan::ShotPlan;

/// Deterministic job id: `{repo_full_name with '/' flattened}_{sha[..7]}`.
pub fn video_job_id(repo_full_name: &str, sha: &str) -> String {
    let sha_short: String = sha.chars().take(7).collect();
    format!("{}_{}", repo_full_name.replace('/', "_"), sha_short)
}

/// Overall job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and waiting for a worker slot
    #[default]
    Queued,
    /// A worker is executing the stage sequence
    Running,
    /// Paused pending manual input
    AwaitingInput,
    /// At least one language track was produced
    Completed,
    /// No usable output; see `error`
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::AwaitingInput => "awaiting_input",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Statuses that refuse a new non-forced enqueue for the same commit.
    pub fn blocks_reenqueue(&self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Completed | JobStatus::AwaitingInput
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage. The sequence below is the only path a healthy job takes;
/// `Error` is the terminal stage of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Goal,
    Demo,
    Script,
    Snapshots,
    ClipGenerate,
    Stitch,
    Voice,
    Captions,
    Finalize,
    Done,
    Error,
}

impl Stage {
    /// The canonical forward order, excluding the `Error` terminal.
    pub const SEQUENCE: [Stage; 10] = [
        Stage::Goal,
        Stage::Demo,
        Stage::Script,
        Stage::Snapshots,
        Stage::ClipGenerate,
        Stage::Stitch,
        Stage::Voice,
        Stage::Captions,
        Stage::Finalize,
        Stage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Goal => "goal",
            Stage::Demo => "demo",
            Stage::Script => "script",
            Stage::Snapshots => "snapshots",
            Stage::ClipGenerate => "clip_generate",
            Stage::Stitch => "stitch",
            Stage::Voice => "voice",
            Stage::Captions => "captions",
            Stage::Finalize => "finalize",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    /// Position in the forward sequence; `Error` sorts after everything.
    pub fn order_index(&self) -> usize {
        Stage::SEQUENCE
            .iter()
            .position(|s| s == self)
            .unwrap_or(Stage::SEQUENCE.len())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-language track state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Completed,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Completed => "completed",
            TrackStatus::Failed => "failed",
        }
    }
}

/// One localized output track.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub status: TrackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_meta: Option<VideoMeta>,
    /// TTS voice that produced the narration, when one was selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_provider: Option<String>,
}

impl Track {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TrackStatus::Failed,
            error: Some(error.into()),
            voice_script: None,
            duration_sec: None,
            audio_url: None,
            captions_url: None,
            final_video_url: None,
            final_video_meta: None,
            voice_provider: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TrackStatus::Completed
    }
}

/// Probed video characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMeta {
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_has_audio")]
    pub has_audio: bool,
}

fn default_has_audio() -> bool {
    true
}

/// The persisted video job document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    pub video_id: String,
    pub commit_id: String,
    pub repo_full_name: String,
    pub sha: String,
    pub sha_short: String,
    pub status: JobStatus,
    pub stage: Stage,
    /// Bumped on every (re)schedule; stale runs fail their conditional
    /// writes instead of clobbering the current run's state.
    pub epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub languages_requested: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<SceneScript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_plan: Option<ShotPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_meta: Option<VideoMeta>,
    #[serde(default)]
    pub tracks: BTreeMap<String, Track>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Fresh queued job for a commit. Re-scheduling an existing commit
    /// resets the artifact fields and bumps the epoch.
    pub fn queued(
        commit_id: impl Into<String>,
        repo_full_name: impl Into<String>,
        sha: impl Into<String>,
        languages_requested: Vec<String>,
    ) -> Self {
        let repo_full_name = repo_full_name.into();
        let sha = sha.into();
        let now = Utc::now();
        Self {
            video_id: video_job_id(&repo_full_name, &sha),
            commit_id: commit_id.into(),
            sha_short: sha.chars().take(7).collect(),
            repo_full_name,
            sha,
            status: JobStatus::Queued,
            stage: Stage::Goal,
            epoch: 0,
            error: None,
            languages_requested,
            goal: None,
            script: None,
            shot_plan: None,
            demo_video_url: None,
            snapshot_count: None,
            enhanced_video_url: None,
            video_meta: None,
            tracks: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Count of tracks that completed.
    pub fn completed_track_count(&self) -> usize {
        self.tracks.values().filter(|t| t.is_completed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_job_id_is_deterministic() {
        let a = video_job_id("octocat/hello-world", "abc1234def567890");
        let b = video_job_id("octocat/hello-world", "abc1234def567890");
        assert_eq!(a, b);
        assert_eq!(a, "octocat_hello-world_abc1234");
    }

    #[test]
    fn test_video_job_id_ignores_languages() {
        // The id depends only on repo and sha; two requests for the same
        // commit with different language sets converge on one record.
        let job_en = VideoJob::queued("c1", "octocat/hello-world", "abc1234def", vec!["en".into()]);
        let job_multi = VideoJob::queued(
            "c1",
            "octocat/hello-world",
            "abc1234def",
            vec!["en".into(), "es".into()],
        );
        assert_eq!(job_en.video_id, job_multi.video_id);
    }

    #[test]
    fn test_stage_sequence_order() {
        let mut last = None;
        for stage in Stage::SEQUENCE {
            if let Some(prev) = last {
                assert!(stage.order_index() > Stage::order_index(&prev));
            }
            last = Some(stage);
        }
        assert!(Stage::Error.order_index() >= Stage::Done.order_index());
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Error.is_terminal());
        assert!(!Stage::Finalize.is_terminal());
    }

    #[test]
    fn test_status_reenqueue_gate() {
        assert!(JobStatus::Running.blocks_reenqueue());
        assert!(JobStatus::Completed.blocks_reenqueue());
        assert!(JobStatus::AwaitingInput.blocks_reenqueue());
        assert!(!JobStatus::Queued.blocks_reenqueue());
        assert!(!JobStatus::Failed.blocks_reenqueue());
    }

    #[test]
    fn test_serde_snake_case_round_trip() {
        let json = serde_json::to_string(&Stage::ClipGenerate).unwrap();
        assert_eq!(json, "\"clip_generate\"");
        let status: JobStatus = serde_json::from_str("\"awaiting_input\"").unwrap();
        assert_eq!(status, JobStatus::AwaitingInput);
    }

    #[test]
    fn test_queued_job_defaults() {
        let job = VideoJob::queued("c1", "octocat/hello-world", "abc1234def", vec!["en".into()]);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.stage, Stage::Goal);
        assert_eq!(job.epoch, 0);
        assert_eq!(job.sha_short, "abc1234");
        assert!(job.tracks.is_empty());
        assert_eq!(job.completed_track_count(), 0);
    }
}
