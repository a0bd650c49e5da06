//! Idempotent scheduler: in-flight registry plus bounded worker pool.
//!
//! `enqueue` guarantees at-most-one active execution per video id unless
//! `force` is set. Forcing overwrites the registry entry and bumps the job
//! epoch; the superseded run is not cancelled, its late writes are dropped
//! by the epoch guard.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use dcast_models::{parse_target_languages, video_job_id, JobStatus, VideoJob};

use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::Orchestrator;

pub const REASON_RUNNING_OR_COMPLETED: &str = "already_running_or_completed";
pub const REASON_QUEUED: &str = "already_queued";

/// Result of one enqueue request.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueOutcome {
    pub queued: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub video_id: String,
    pub commit_id: String,
    pub status: JobStatus,
    pub languages_requested: Vec<String>,
}

/// One registered execution. The epoch lets a finished task deregister
/// itself without clobbering a newer entry a force re-schedule installed.
struct InflightRun {
    epoch: u64,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    inflight: Arc<Mutex<HashMap<String, InflightRun>>>,
    pool: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, max_workers: usize) -> Self {
        Self {
            orchestrator,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            pool: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    /// Schedule a pipeline run for a stored commit.
    pub async fn enqueue(
        &self,
        commit_id: &str,
        languages: Option<&[String]>,
        force: bool,
    ) -> PipelineResult<EnqueueOutcome> {
        let commit = self
            .orchestrator
            .commit_store()
            .get(commit_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("commit {commit_id}")))?;

        let fallback = self.orchestrator.config.languages.clone();
        let languages_requested = parse_target_languages(languages, fallback.as_deref());
        let video_id = video_job_id(&commit.repo_full_name, &commit.sha);

        let jobs = self.orchestrator.job_store();

        // The registry lock spans the status read, the duplicate check, the
        // document reset, the spawn, and the registry insert. Racing
        // enqueues serialize here, so each schedule reads the epoch it is
        // about to supersede and two forces can never stamp the same one.
        let mut inflight = self.inflight.lock().await;
        let existing = jobs.get(&video_id).await?;
        if let Some(existing) = &existing {
            if existing.status.blocks_reenqueue() && !force {
                info!(video_id, status = %existing.status, "enqueue skipped");
                return Ok(EnqueueOutcome {
                    queued: false,
                    skipped: true,
                    reason: Some(REASON_RUNNING_OR_COMPLETED.to_string()),
                    video_id,
                    commit_id: commit_id.to_string(),
                    status: existing.status,
                    languages_requested,
                });
            }
        }
        if let Some(run) = inflight.get(&video_id) {
            if !run.handle.is_finished() && !force {
                info!(video_id, "enqueue skipped, execution already in flight");
                return Ok(EnqueueOutcome {
                    queued: false,
                    skipped: true,
                    reason: Some(REASON_QUEUED.to_string()),
                    video_id,
                    commit_id: commit_id.to_string(),
                    status: existing.map(|e| e.status).unwrap_or_default(),
                    languages_requested,
                });
            }
        }

        let epoch = existing.map_or(0, |e| e.epoch + 1);
        let mut job = VideoJob::queued(
            commit.id.clone(),
            commit.repo_full_name.clone(),
            commit.sha.clone(),
            languages_requested.clone(),
        );
        job.epoch = epoch;
        jobs.upsert(&job).await?;

        let orchestrator = Arc::clone(&self.orchestrator);
        let pool = Arc::clone(&self.pool);
        let registry = Arc::clone(&self.inflight);
        let run_id = video_id.clone();
        let handle = tokio::spawn(async move {
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(video_id = %run_id, "worker pool closed before run started");
                    return;
                }
            };
            orchestrator.run(&run_id, epoch).await;
            // Deregister, unless a force re-schedule already replaced the
            // entry with a newer run.
            let mut inflight = registry.lock().await;
            if inflight.get(&run_id).is_some_and(|run| run.epoch == epoch) {
                inflight.remove(&run_id);
            }
        });
        inflight.insert(video_id.clone(), InflightRun { epoch, handle });
        drop(inflight);

        info!(video_id, epoch, force, "pipeline run scheduled");
        Ok(EnqueueOutcome {
            queued: true,
            skipped: false,
            reason: None,
            video_id,
            commit_id: commit_id.to_string(),
            status: JobStatus::Queued,
            languages_requested,
        })
    }

    /// Number of registered executions; finished runs deregister themselves.
    pub async fn inflight_len(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Wait for the in-flight execution of `video_id`, if any, to finish.
    pub async fn wait_for(&self, video_id: &str) {
        let run = self.inflight.lock().await.remove(video_id);
        if let Some(run) = run {
            let _ = run.handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{happy_deps, seed_commit_and_repo};
    use dcast_models::Stage;
    use dcast_store::JobStore;

    #[tokio::test]
    async fn test_double_enqueue_skips_second() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let first = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        assert!(first.queued);
        let second = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        assert!(second.skipped);
        assert!(!second.queued);
        // Which reason fires depends on whether the first run has already
        // finished and persisted; both mean "no second execution".
        let reason = second.reason.unwrap();
        assert!(reason == REASON_QUEUED || reason == REASON_RUNNING_OR_COMPLETED);

        scheduler.wait_for(&first.video_id).await;
        let job = deps.jobs.get(&first.video_id).await.unwrap().unwrap();
        assert_eq!(job.epoch, 0);
    }

    #[tokio::test]
    async fn test_job_id_ignores_languages() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let en = scheduler
            .enqueue(&commit.id, Some(&["en".to_string()]), false)
            .await
            .unwrap();
        scheduler.wait_for(&en.video_id).await;
        let es = scheduler
            .enqueue(&commit.id, Some(&["es".to_string()]), true)
            .await
            .unwrap();
        assert_eq!(en.video_id, es.video_id);
        scheduler.wait_for(&es.video_id).await;
    }

    #[tokio::test]
    async fn test_completed_job_blocks_reenqueue_without_force() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let first = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        scheduler.wait_for(&first.video_id).await;
        let job = deps.jobs.get(&first.video_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let second = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(
            second.reason.as_deref(),
            Some(REASON_RUNNING_OR_COMPLETED)
        );
        assert_eq!(second.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_force_bumps_epoch_and_reschedules() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let first = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        scheduler.wait_for(&first.video_id).await;

        let forced = scheduler.enqueue(&commit.id, None, true).await.unwrap();
        assert!(forced.queued);
        scheduler.wait_for(&forced.video_id).await;

        let job = deps.jobs.get(&forced.video_id).await.unwrap().unwrap();
        assert_eq!(job.epoch, 1);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage, Stage::Done);
    }

    #[tokio::test]
    async fn test_concurrent_forced_enqueues_stamp_distinct_epochs() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let first = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        scheduler.wait_for(&first.video_id).await;

        // Both forces race on the registry lock; each must read the epoch
        // it supersedes, never the same stale snapshot.
        let (a, b) = tokio::join!(
            scheduler.enqueue(&commit.id, None, true),
            scheduler.enqueue(&commit.id, None, true),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        assert!(a.queued);
        assert!(b.queued);
        scheduler.wait_for(&a.video_id).await;

        let job = deps.jobs.get(&a.video_id).await.unwrap().unwrap();
        assert_eq!(job.epoch, 2);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage, Stage::Done);
    }

    #[tokio::test]
    async fn test_finished_run_deregisters_itself() {
        let deps = happy_deps();
        let (commit, _) = seed_commit_and_repo(&deps, true).await;
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);

        let outcome = scheduler.enqueue(&commit.id, None, false).await.unwrap();
        assert_eq!(scheduler.inflight_len().await, 1);

        // No wait_for: the spawned task must remove its own entry.
        for _ in 0..200 {
            if scheduler.inflight_len().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.inflight_len().await, 0);
        let job = deps.jobs.get(&outcome.video_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_commit_is_not_found() {
        let deps = happy_deps();
        let scheduler = Scheduler::new(Arc::new(deps.orchestrator()), 2);
        let result = scheduler.enqueue("missing_commit", None, false).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
