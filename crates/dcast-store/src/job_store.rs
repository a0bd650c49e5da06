//! Video job persistence.
//!
//! Every stage write goes through [`JobStore::update_if_epoch`]: a stale
//! writer (superseded by a force re-schedule) sees `false` and must discard
//! its result instead of clobbering the newer run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use dcast_models::{JobStatus, VideoJob};

use crate::error::StoreResult;

/// Persistence seam for [`VideoJob`] documents.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, video_id: &str) -> StoreResult<Option<VideoJob>>;

    /// Unconditional write; creates or replaces the document.
    async fn upsert(&self, job: &VideoJob) -> StoreResult<()>;

    /// Write `job` only while the stored document's epoch still equals
    /// `expected_epoch`. Returns whether the write was applied. A missing
    /// document never matches.
    async fn update_if_epoch(
        &self,
        video_id: &str,
        expected_epoch: u64,
        job: &VideoJob,
    ) -> StoreResult<bool>;

    /// Jobs for one repository, newest first, optionally filtered by status.
    async fn list_for_repo(
        &self,
        repo_full_name: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> StoreResult<Vec<VideoJob>>;
}

/// In-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, VideoJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, video_id: &str) -> StoreResult<Option<VideoJob>> {
        Ok(self.jobs.read().await.get(video_id).cloned())
    }

    async fn upsert(&self, job: &VideoJob) -> StoreResult<()> {
        self.jobs
            .write()
            .await
            .insert(job.video_id.clone(), job.clone());
        Ok(())
    }

    async fn update_if_epoch(
        &self,
        video_id: &str,
        expected_epoch: u64,
        job: &VideoJob,
    ) -> StoreResult<bool> {
        let mut jobs = self.jobs.write().await;
        match jobs.get(video_id) {
            Some(current) if current.epoch == expected_epoch => {
                jobs.insert(video_id.to_string(), job.clone());
                Ok(true)
            }
            Some(current) => {
                debug!(
                    video_id,
                    expected_epoch,
                    current_epoch = current.epoch,
                    "stale epoch write discarded"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn list_for_repo(
        &self,
        repo_full_name: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> StoreResult<Vec<VideoJob>> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<VideoJob> = jobs
            .values()
            .filter(|j| j.repo_full_name == repo_full_name)
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(video_id: &str, repo: &str) -> VideoJob {
        let mut job = VideoJob::queued(
            format!("{video_id}-commit"),
            repo,
            "abc1234def0",
            vec!["en".to_string()],
        );
        job.video_id = video_id.to_string();
        job
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = MemoryJobStore::new();
        let j = job("v1", "octocat/hello-world");
        store.upsert(&j).await.unwrap();
        let loaded = store.get("v1").await.unwrap().unwrap();
        assert_eq!(loaded.repo_full_name, "octocat/hello-world");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_if_epoch_guards_stale_writers() {
        let store = MemoryJobStore::new();
        let mut j = job("v1", "octocat/hello-world");
        store.upsert(&j).await.unwrap();

        // Writer holding epoch 0 applies.
        j.goal = Some("show search".to_string());
        assert!(store.update_if_epoch("v1", 0, &j).await.unwrap());

        // Re-schedule bumps the epoch; the old writer is now stale.
        let mut bumped = j.clone();
        bumped.epoch = 1;
        store.upsert(&bumped).await.unwrap();

        j.goal = Some("stale result".to_string());
        assert!(!store.update_if_epoch("v1", 0, &j).await.unwrap());
        let current = store.get("v1").await.unwrap().unwrap();
        assert_eq!(current.goal.as_deref(), Some("show search"));
    }

    #[tokio::test]
    async fn test_update_if_epoch_on_missing_document() {
        let store = MemoryJobStore::new();
        let j = job("v1", "octocat/hello-world");
        assert!(!store.update_if_epoch("v1", 0, &j).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_for_repo_filters_and_orders() {
        let store = MemoryJobStore::new();
        let mut first = job("v1", "octocat/hello-world");
        first.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        let mut second = job("v2", "octocat/hello-world");
        second.status = JobStatus::Completed;
        let other = job("v3", "octocat/other");
        store.upsert(&first).await.unwrap();
        store.upsert(&second).await.unwrap();
        store.upsert(&other).await.unwrap();

        let all = store
            .list_for_repo("octocat/hello-world", None, 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].video_id, "v2");

        let completed = store
            .list_for_repo("octocat/hello-world", Some(JobStatus::Completed), 10)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].video_id, "v2");
    }
}
