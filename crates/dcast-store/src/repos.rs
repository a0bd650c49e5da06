//! Commit and repository document stores.
//!
//! The API accepts only commits already present in the [`CommitStore`];
//! webhook ingestion that populates it lives outside this workspace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dcast_models::{CommitDoc, RepoDoc};

use crate::error::StoreResult;

/// Persistence seam for commit documents.
#[async_trait]
pub trait CommitStore: Send + Sync {
    async fn get(&self, commit_id: &str) -> StoreResult<Option<CommitDoc>>;
    async fn upsert(&self, commit: &CommitDoc) -> StoreResult<()>;
}

/// Persistence seam for watched-repository documents.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn get(&self, full_name: &str) -> StoreResult<Option<RepoDoc>>;
    async fn upsert(&self, repo: &RepoDoc) -> StoreResult<()>;
}

/// In-memory commit store.
#[derive(Default)]
pub struct MemoryCommitStore {
    commits: Arc<RwLock<HashMap<String, CommitDoc>>>,
}

impl MemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommitStore for MemoryCommitStore {
    async fn get(&self, commit_id: &str) -> StoreResult<Option<CommitDoc>> {
        Ok(self.commits.read().await.get(commit_id).cloned())
    }

    async fn upsert(&self, commit: &CommitDoc) -> StoreResult<()> {
        self.commits
            .write()
            .await
            .insert(commit.id.clone(), commit.clone());
        Ok(())
    }
}

/// In-memory repo store.
#[derive(Default)]
pub struct MemoryRepoStore {
    repos: Arc<RwLock<HashMap<String, RepoDoc>>>,
}

impl MemoryRepoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepoStore for MemoryRepoStore {
    async fn get(&self, full_name: &str) -> StoreResult<Option<RepoDoc>> {
        Ok(self.repos.read().await.get(full_name).cloned())
    }

    async fn upsert(&self, repo: &RepoDoc) -> StoreResult<()> {
        self.repos
            .write()
            .await
            .insert(repo.full_name.clone(), repo.clone());
        Ok(())
    }
}
