//! Shared fixtures for orchestrator and scheduler tests: capability mocks
//! that behave like cooperative collaborators (writing placeholder files
//! where the real tools would), plus in-memory stores.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use dcast_models::{
    CommitDoc, CommitFile, JobStatus, LocalizedLines, RepoDoc, SceneDraft, SceneScript,
    SceneScriptDraft, Stage, VideoJob, VideoMeta,
};
use dcast_store::{
    CommitStore, JobStore, MemoryCommitStore, MemoryJobStore, MemoryObjectStorage,
    MemoryRepoStore, RepoStore, StoreResult,
};

use crate::capabilities::{
    MockClipSynthesizer, MockDemoRecorder, MockGoalGenerator, MockNarrator, MockScriptGenerator,
    MockSpeechSynthesizer, MockVideoAssembler, Narrator,
};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::orchestrator::{Orchestrator, PipelineDeps};

pub(crate) struct TestDeps {
    pub jobs: Arc<MemoryJobStore>,
    pub commits: Arc<MemoryCommitStore>,
    pub repos: Arc<MemoryRepoStore>,
    pub storage: Arc<MemoryObjectStorage>,
    pub goal: Arc<MockGoalGenerator>,
    pub script: Arc<MockScriptGenerator>,
    pub narrator: Arc<dyn Narrator>,
    pub recorder: Arc<MockDemoRecorder>,
    pub clips: Arc<MockClipSynthesizer>,
    pub tts: Arc<MockSpeechSynthesizer>,
    pub assembler: Arc<MockVideoAssembler>,
}

impl TestDeps {
    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with_jobs(self.jobs.clone())
    }

    /// Build the orchestrator over a caller-supplied job store, keeping the
    /// rest of the fixture wiring.
    pub fn orchestrator_with_jobs(&self, jobs: Arc<dyn JobStore>) -> Orchestrator {
        Orchestrator::new(
            PipelineDeps {
                jobs,
                commits: self.commits.clone(),
                repos: self.repos.clone(),
                storage: self.storage.clone(),
                goal: self.goal.clone(),
                script: self.script.clone(),
                narrator: self.narrator.clone(),
                recorder: self.recorder.clone(),
                clips: self.clips.clone(),
                tts: self.tts.clone(),
                assembler: self.assembler.clone(),
            },
            PipelineConfig::default(),
        )
    }
}

/// Job store that records the stage of every applied epoch-guarded write,
/// so tests can assert on the persisted stage sequence.
pub(crate) struct RecordingJobStore {
    inner: MemoryJobStore,
    stages: std::sync::Mutex<Vec<Stage>>,
}

impl RecordingJobStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryJobStore::new(),
            stages: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingJobStore {
    async fn get(&self, video_id: &str) -> StoreResult<Option<VideoJob>> {
        self.inner.get(video_id).await
    }

    async fn upsert(&self, job: &VideoJob) -> StoreResult<()> {
        self.inner.upsert(job).await
    }

    async fn update_if_epoch(
        &self,
        video_id: &str,
        expected_epoch: u64,
        job: &VideoJob,
    ) -> StoreResult<bool> {
        let applied = self
            .inner
            .update_if_epoch(video_id, expected_epoch, job)
            .await?;
        if applied {
            self.stages.lock().unwrap().push(job.stage);
        }
        Ok(applied)
    }

    async fn list_for_repo(
        &self,
        repo_full_name: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> StoreResult<Vec<VideoJob>> {
        self.inner.list_for_repo(repo_full_name, status, limit).await
    }
}

/// A 4-scene, 22-second jargon-free script.
pub(crate) fn sample_script() -> SceneScript {
    let draft = SceneScriptDraft {
        title: "Faster search for everyone".to_string(),
        feature_summary: "Finding what you need now takes a moment".to_string(),
        scenes: vec![
            SceneDraft {
                on_screen_text: "Type what you are looking for".to_string(),
                narration_seed: "Show the search box".to_string(),
                duration_sec: 4.0,
            },
            SceneDraft {
                on_screen_text: "Results appear instantly".to_string(),
                narration_seed: "Show the result list".to_string(),
                duration_sec: 6.0,
            },
            SceneDraft {
                on_screen_text: "Pick the best match".to_string(),
                narration_seed: "Show a click on a result".to_string(),
                duration_sec: 6.0,
            },
            SceneDraft {
                on_screen_text: "Back to work in seconds".to_string(),
                narration_seed: "Show the opened page".to_string(),
                duration_sec: 6.0,
            },
        ],
    };
    SceneScript::from_draft(draft).expect("fixture script is valid")
}

fn meta(duration_sec: f64) -> VideoMeta {
    VideoMeta {
        duration_sec,
        width: 1280,
        height: 720,
        has_audio: true,
    }
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"artifact").unwrap();
}

fn happy_narrator() -> MockNarrator {
    let mut narrator = MockNarrator::new();
    narrator.expect_localize().returning(|script, language| {
        let lines: Vec<String> = script
            .scenes
            .iter()
            .enumerate()
            .map(|(i, _)| format!("[{language}] line {i}"))
            .collect();
        Ok(LocalizedLines {
            voice_lines: lines.clone(),
            caption_lines: lines,
        })
    });
    narrator
}

/// Full dependency set where every collaborator succeeds.
pub(crate) fn happy_deps() -> TestDeps {
    let mut goal = MockGoalGenerator::new();
    goal.expect_generate_goal().returning(|commit| {
        if commit.has_patch_content() {
            Ok("Open the search page and type a query.".to_string())
        } else {
            Err(PipelineError::validation(
                "commit has no patch content to describe",
            ))
        }
    });

    let mut script = MockScriptGenerator::new();
    script
        .expect_generate_script()
        .returning(|_| Ok(sample_script()));

    let mut recorder = MockDemoRecorder::new();
    recorder.expect_record_demo().returning(|_, _, dir| {
        let capture = dir.join("raw.webm");
        touch(&capture);
        Ok(capture)
    });

    let mut clips = MockClipSynthesizer::new();
    clips.expect_synthesize_clip().returning(|_, _, _, output| {
        touch(output);
        Ok(())
    });

    let mut tts = MockSpeechSynthesizer::new();
    tts.expect_synthesize().returning(|_, _, output| {
        touch(output);
        Ok("gemini-2.5-flash-preview-tts/Kore".to_string())
    });

    let mut assembler = MockVideoAssembler::new();
    assembler.expect_normalize().returning(|_, output| {
        touch(output);
        Ok(meta(12.0))
    });
    assembler
        .expect_extract_snapshots()
        .returning(|_, dir, count| {
            let paths: Vec<_> = (0..count)
                .map(|i| dir.join(format!("snapshot_{i:02}.png")))
                .collect();
            for p in &paths {
                touch(p);
            }
            Ok(paths)
        });
    assembler.expect_assemble().returning(|_, output| {
        touch(output);
        Ok(meta(24.0))
    });
    assembler.expect_finalize().returning(|_, _, _, output| {
        touch(output);
        Ok(meta(24.0))
    });

    TestDeps {
        jobs: Arc::new(MemoryJobStore::new()),
        commits: Arc::new(MemoryCommitStore::new()),
        repos: Arc::new(MemoryRepoStore::new()),
        storage: Arc::new(MemoryObjectStorage::new()),
        goal: Arc::new(goal),
        script: Arc::new(script),
        narrator: Arc::new(happy_narrator()),
        recorder: Arc::new(recorder),
        clips: Arc::new(clips),
        tts: Arc::new(tts),
        assembler: Arc::new(assembler),
    }
}

/// Replace the narrator with one that fails for `language` only.
pub(crate) fn fail_narration_for(deps: &mut TestDeps, language: &str) {
    let failing = language.to_string();
    let mut narrator = MockNarrator::new();
    narrator.expect_localize().returning(move |script, language| {
        if language == failing {
            return Err(PipelineError::external(format!(
                "narration service rejected language {language}"
            )));
        }
        let lines: Vec<String> = script
            .scenes
            .iter()
            .enumerate()
            .map(|(i, _)| format!("[{language}] line {i}"))
            .collect();
        Ok(LocalizedLines {
            voice_lines: lines.clone(),
            caption_lines: lines,
        })
    });
    deps.narrator = Arc::new(narrator);
}

/// Store a commit (with or without patch content) and its repo document.
pub(crate) async fn seed_commit_and_repo(
    deps: &TestDeps,
    with_patch: bool,
) -> (CommitDoc, RepoDoc) {
    let commit = CommitDoc::new(
        "octocat/hello-world",
        "abc1234def567890",
        "add search",
        vec![CommitFile {
            path: "src/search.rs".to_string(),
            status: "modified".to_string(),
            additions: 12,
            deletions: 2,
            patch: with_patch.then(|| "+let results = find(query);".to_string()),
        }],
    );
    let repo = RepoDoc {
        full_name: "octocat/hello-world".to_string(),
        owner: "octocat".to_string(),
        name: "hello-world".to_string(),
        default_branch: "main".to_string(),
        website_url: Some("https://hello.example.com".to_string()),
        enabled: true,
    };
    deps.commits.upsert(&commit).await.unwrap();
    deps.repos.upsert(&repo).await.unwrap();
    (commit, repo)
}
