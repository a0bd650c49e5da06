//! Shared data models for the DiffCast commit video pipeline.
//!
//! Everything that crosses a crate boundary lives here: commit and repo
//! documents, the persisted video job record with its stage machine, the
//! validated scene script, the derived shot plan, and language handling.

pub mod commit;
pub mod language;
pub mod script;
pub mod shot_plan;
pub mod video;

pub use commit::{commit_doc_id, repo_doc_id, CommitAuthor, CommitDoc, CommitFile, RepoDoc};
pub use language::{bcp47_code, parse_target_languages, DEFAULT_LANGUAGE};
pub use script::{
    LocalizedLines, Scene, SceneDraft, SceneScript, SceneScriptDraft, ScriptValidationError,
    MAX_SCENES, MAX_TOTAL_DURATION_SEC, MIN_SCENES,
};
pub use shot_plan::{Shot, ShotPlan};
pub use video::{video_job_id, JobStatus, Stage, Track, TrackStatus, VideoJob, VideoMeta};
