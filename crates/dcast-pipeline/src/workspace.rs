//! Per-run scratch directory.
//!
//! Every job-run owns one workspace; dropping it removes the directory, so
//! cleanup happens on every exit path including panics unwinding through
//! the orchestrator.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::PipelineResult;

pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    pub fn create(video_id: &str) -> PipelineResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("dcast_{video_id}_"))
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.dir.path().join("capture")
    }

    pub fn demo_video(&self) -> PathBuf {
        self.dir.path().join("demo.mp4")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.dir.path().join("snapshots")
    }

    pub fn opener_clip(&self) -> PathBuf {
        self.dir.path().join("opener.mp4")
    }

    pub fn closer_clip(&self) -> PathBuf {
        self.dir.path().join("closer.mp4")
    }

    pub fn enhanced_video(&self) -> PathBuf {
        self.dir.path().join("enhanced.mp4")
    }

    /// Per-language scratch directory, created on first use.
    pub async fn track_dir(&self, language: &str) -> PipelineResult<PathBuf> {
        let dir = self.dir.path().join("tracks").join(language);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn ensure_dir(&self, path: &Path) -> PipelineResult<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let workspace = JobWorkspace::create("octocat_hello-world_abc1234").unwrap();
        let root = workspace.root().to_path_buf();
        let track = workspace.track_dir("en").await.unwrap();
        assert!(track.exists());
        drop(workspace);
        assert!(!root.exists());
    }
}
